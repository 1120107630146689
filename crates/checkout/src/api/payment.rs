//! Payment intent creation against the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::{ApiClient, ApiError};
use crate::payment::{IntentService, PaymentIntent};

#[derive(Debug, Serialize)]
struct ProcessPaymentRequest {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct ProcessPaymentResponse {
    client_secret: String,
}

#[async_trait]
impl IntentService for ApiClient {
    #[instrument(skip(self))]
    async fn create_intent(&self, amount: i64, idempotency_key: Uuid) -> Result<PaymentIntent, ApiError> {
        let url = self.endpoint("api/v1/payment/process")?;
        let request = self
            .inner
            .client
            .post(url)
            .header("Idempotency-Key", idempotency_key.to_string())
            .json(&ProcessPaymentRequest { amount });

        let response: ProcessPaymentResponse = self.send(request).await?;
        let intent = PaymentIntent::from_client_secret(response.client_secret, amount)?;
        tracing::debug!(intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let json = serde_json::to_value(ProcessPaymentRequest { amount: 269_600 }).unwrap();
        assert_eq!(json, serde_json::json!({ "amount": 269_600 }));
    }

    #[test]
    fn test_parse_response() {
        let response: ProcessPaymentResponse =
            serde_json::from_str(r#"{ "success": true, "client_secret": "pi_9_secret_z" }"#).unwrap();
        let intent = PaymentIntent::from_client_secret(response.client_secret, 5).unwrap();
        assert_eq!(intent.id, "pi_9");
    }
}
