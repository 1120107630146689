//! REST client for the storefront backend.
//!
//! # Architecture
//!
//! - Plain JSON over HTTP via `reqwest`; the backend is the source of truth
//!   for product prices and stock, so catalog responses are never cached
//! - One [`ApiClient`] implements the catalog, order-creation and
//!   payment-intent collaborators
//! - Every backend response is wrapped as `{ "success": bool, "message"?: string, ... }`
//!
//! # Endpoints
//!
//! - `GET  /api/v1/product/{slug}/{id}` - product lookup
//! - `POST /api/v1/order/new` - order creation (bearer token)
//! - `POST /api/v1/payment/process` - payment intent creation (bearer token)

mod catalog;
mod orders;
mod payment;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::ApiConfig;

/// Errors that can occur when talking to a remote collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service could not be reached (used by non-HTTP collaborators).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Unavailable(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::Parse(_) | Self::Config(_) => false,
        }
    }
}

/// Error envelope returned by the backend error middleware.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Client for the storefront backend REST API.
///
/// Cheaply cloneable; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new backend API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ApiError::Config(format!("Invalid API token format: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::Config(format!("Invalid endpoint {path}: {e}")))
    }

    /// Send a request and decode a successful JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::warn!(
                status = %status,
                message = %message,
                "Backend returned non-success status"
            );
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound(message));
            }
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e.to_string())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found");

        let err = ApiError::Api {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 502 - Bad gateway");
    }

    #[test]
    fn test_retriable_classification() {
        assert!(ApiError::Unavailable("down".to_string()).is_retriable());
        assert!(ApiError::RateLimited(3).is_retriable());
        assert!(
            ApiError::Api {
                status: 503,
                message: String::new()
            }
            .is_retriable()
        );
        assert!(
            !ApiError::Api {
                status: 400,
                message: String::new()
            }
            .is_retriable()
        );
        assert!(!ApiError::NotFound("x".to_string()).is_retriable());
    }

    #[test]
    fn test_endpoint_join() {
        let config = ApiConfig {
            base_url: Url::parse("https://shop.example.in/").unwrap(),
            token: None,
            timeout: std::time::Duration::from_secs(5),
        };
        let client = ApiClient::new(&config).unwrap();
        let url = client.endpoint("api/v1/product/Chair/42").unwrap();
        assert_eq!(url.as_str(), "https://shop.example.in/api/v1/product/Chair/42");
    }
}
