//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `HEKTO_API_URL` - Base URL of the storefront backend
//!
//! ## Optional
//! - `HEKTO_API_TOKEN` - Bearer token for order and payment endpoints
//! - `HEKTO_API_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `HEKTO_PAYMENT_MODE` - `test` or `live` (default: test)
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key (required in live mode)
//! - `STRIPE_API_URL` - Stripe API base URL (default: <https://api.stripe.com/>)
//! - `HEKTO_SHIPPING_FLAT_RATE` - Shipping charge below the threshold (default: 100)
//! - `HEKTO_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 3000)
//! - `HEKTO_TAX_RATE_PERCENT` - Tax rate in percent (default: 18)
//! - `HEKTO_STORAGE_DIR` - Directory for cart and session files (default: .hekto)
//! - `HEKTO_CUSTOMER_ID`, `HEKTO_CUSTOMER_NAME`, `HEKTO_CUSTOMER_EMAIL` -
//!   signed-in shopper; all three or none
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hekto_core::{Customer, Email, UserId};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::payment::STRIPE_API_URL;
use crate::pricing::PricingConfig;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Checkout application configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Storefront backend
    pub api: ApiConfig,
    /// How payments are confirmed
    pub payment: PaymentMode,
    /// Shipping and tax rules
    pub pricing: PricingConfig,
    /// Root directory for the durable and session stores
    pub storage_dir: PathBuf,
    /// Signed-in shopper, if any
    pub customer: Option<Customer>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Storefront backend configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL; always ends with `/` so relative endpoints join beneath it
    pub base_url: Url,
    /// Bearer token for authenticated endpoints
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiConfig {
    /// Build a config for `base_url` with no token and the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("HEKTO_API_URL", base_url)?,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }
}

/// Payment confirmation mode.
#[derive(Clone)]
pub enum PaymentMode {
    /// Simulated payments; no money moves.
    Test,
    /// Real payments through Stripe.
    Live {
        publishable_key: SecretString,
        stripe_url: Url,
    },
}

impl std::fmt::Debug for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Test => f.write_str("Test"),
            Self::Live { stripe_url, .. } => f
                .debug_struct("Live")
                .field("publishable_key", &"[REDACTED]")
                .field("stripe_url", &stripe_url.as_str())
                .finish(),
        }
    }
}

impl PaymentMode {
    /// Whether payments are simulated.
    #[must_use]
    pub const fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: ApiConfig::from_env()?,
            payment: PaymentMode::from_env()?,
            pricing: pricing_from_env()?,
            storage_dir: PathBuf::from(get_env_or_default("HEKTO_STORAGE_DIR", ".hekto")),
            customer: customer_from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Directory of the store that survives restarts.
    #[must_use]
    pub fn durable_dir(&self) -> PathBuf {
        self.storage_dir.join("local")
    }

    /// Directory of the store scoped to one checkout session.
    #[must_use]
    pub fn session_dir(&self) -> PathBuf {
        self.storage_dir.join("session")
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("HEKTO_API_URL", &get_required_env("HEKTO_API_URL")?)?;
        let token = get_optional_env("HEKTO_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "HEKTO_API_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;
        let timeout = Duration::from_secs(parse(
            "HEKTO_API_TIMEOUT_SECS",
            &get_env_or_default("HEKTO_API_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string()),
        )?);

        Ok(Self {
            base_url,
            token,
            timeout,
        })
    }
}

impl PaymentMode {
    fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("HEKTO_PAYMENT_MODE", "test").as_str() {
            "test" => Ok(Self::Test),
            "live" => {
                let key = get_required_env("STRIPE_PUBLISHABLE_KEY")?;
                if !key.starts_with("pk_") {
                    return Err(ConfigError::InvalidEnvVar(
                        "STRIPE_PUBLISHABLE_KEY".to_string(),
                        "must be a publishable key (pk_...)".to_string(),
                    ));
                }
                let stripe_url = parse_base_url(
                    "STRIPE_API_URL",
                    &get_env_or_default("STRIPE_API_URL", STRIPE_API_URL),
                )?;
                Ok(Self::Live {
                    publishable_key: SecretString::from(key),
                    stripe_url,
                })
            }
            other => Err(ConfigError::InvalidEnvVar(
                "HEKTO_PAYMENT_MODE".to_string(),
                format!("expected 'test' or 'live', got '{other}'"),
            )),
        }
    }
}

fn pricing_from_env() -> Result<PricingConfig, ConfigError> {
    let defaults = PricingConfig::default();
    let price = |key: &str, default: hekto_core::Price| -> Result<hekto_core::Price, ConfigError> {
        get_optional_env(key).map_or(Ok(default), |raw| {
            let amount: Decimal = parse(key, &raw)?;
            hekto_core::Price::new(amount)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    };

    let tax_rate_percent = match get_optional_env("HEKTO_TAX_RATE_PERCENT") {
        Some(raw) => {
            let rate: Decimal = parse("HEKTO_TAX_RATE_PERCENT", &raw)?;
            if rate.is_sign_negative() || rate > Decimal::ONE_HUNDRED {
                return Err(ConfigError::InvalidEnvVar(
                    "HEKTO_TAX_RATE_PERCENT".to_string(),
                    "must be between 0 and 100".to_string(),
                ));
            }
            rate
        }
        None => defaults.tax_rate_percent,
    };

    Ok(PricingConfig {
        flat_rate: price("HEKTO_SHIPPING_FLAT_RATE", defaults.flat_rate)?,
        free_shipping_threshold: price("HEKTO_FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold)?,
        tax_rate_percent,
    })
}

fn customer_from_env() -> Result<Option<Customer>, ConfigError> {
    let id = get_optional_env("HEKTO_CUSTOMER_ID");
    let name = get_optional_env("HEKTO_CUSTOMER_NAME");
    let email = get_optional_env("HEKTO_CUSTOMER_EMAIL");

    match (id, name, email) {
        (None, None, None) => Ok(None),
        (Some(id), Some(name), Some(email)) => {
            let email = Email::parse(&email).map_err(|e| {
                ConfigError::InvalidEnvVar("HEKTO_CUSTOMER_EMAIL".to_string(), e.to_string())
            })?;
            Ok(Some(Customer {
                id: UserId::new(id),
                name,
                email,
            }))
        }
        (id, name, _) => {
            let missing = if id.is_none() {
                "HEKTO_CUSTOMER_ID"
            } else if name.is_none() {
                "HEKTO_CUSTOMER_NAME"
            } else {
                "HEKTO_CUSTOMER_EMAIL"
            };
            Err(ConfigError::MissingEnvVar(missing.to_string()))
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a value, attributing failures to `key`.
fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an absolute http(s) URL and make sure its path ends with `/`.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by the backend."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-token-here", "HEKTO_API_TOKEN").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "HEKTO_API_TOKEN").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("eyJhbGciOiJIUzI1NiJ9.k3Yq8vPz", "HEKTO_API_TOKEN").is_ok());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("K", "http://localhost:4000").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/");

        let url = parse_base_url("K", "https://shop.example.in/backend").unwrap();
        assert_eq!(url.as_str(), "https://shop.example.in/backend/");
        assert_eq!(
            url.join("api/v1/order/new").unwrap().as_str(),
            "https://shop.example.in/backend/api/v1/order/new"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_non_http() {
        assert!(matches!(
            parse_base_url("K", "ftp://example.in"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_base_url("K", "not a url").is_err());
    }

    #[test]
    fn test_parse_decimal() {
        let rate: Decimal = parse("HEKTO_TAX_RATE_PERCENT", " 12.5 ").unwrap();
        assert_eq!(rate, Decimal::new(125, 1));
        assert!(parse::<Decimal>("HEKTO_TAX_RATE_PERCENT", "twelve").is_err());
    }

    #[test]
    fn test_api_config_debug_redacts_token() {
        let mut config = ApiConfig::new("http://localhost:4000").unwrap();
        config.token = Some(SecretString::from("super_secret_token_value"));

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("localhost:4000"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token_value"));
    }

    #[test]
    fn test_payment_mode_debug_redacts_key() {
        let mode = PaymentMode::Live {
            publishable_key: SecretString::from("pk_test_51Hsecretish"),
            stripe_url: Url::parse(STRIPE_API_URL).unwrap(),
        };
        let debug_output = format!("{mode:?}");
        assert!(!debug_output.contains("pk_test_51Hsecretish"));
        assert!(!mode.is_test());
        assert!(PaymentMode::Test.is_test());
    }
}
