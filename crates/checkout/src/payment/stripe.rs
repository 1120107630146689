//! Stripe payment-intent confirmation.
//!
//! Confirms an intent created by the backend using the publishable key and
//! the intent's client secret, the same pair the browser SDK uses.

use async_trait::async_trait;
use hekto_core::{PaymentInfo, PaymentStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::{BillingDetails, PaymentIntent, PaymentOutcome, PaymentProvider, ValidCard};
use crate::api::ApiError;

/// Stripe API base URL.
pub const STRIPE_API_URL: &str = "https://api.stripe.com/";

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: PaymentStatus,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    kind: String,
    message: Option<String>,
    decline_code: Option<String>,
    code: Option<String>,
}

/// Stripe client for confirming card payments.
#[derive(Clone)]
pub struct StripeProvider {
    client: reqwest::Client,
    base_url: Url,
    publishable_key: SecretString,
}

impl StripeProvider {
    /// Create a provider against `base_url` (normally [`STRIPE_API_URL`]).
    #[must_use]
    pub fn new(base_url: Url, publishable_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            publishable_key,
        }
    }

    fn form(intent: &PaymentIntent, card: &ValidCard, billing: &BillingDetails) -> Vec<(&'static str, String)> {
        vec![
            ("client_secret", intent.client_secret.expose_secret().to_string()),
            ("payment_method_data[type]", "card".to_string()),
            ("payment_method_data[card][number]", card.number.clone()),
            ("payment_method_data[card][exp_month]", card.exp_month.to_string()),
            ("payment_method_data[card][exp_year]", card.exp_year.to_string()),
            ("payment_method_data[card][cvc]", card.cvc.clone()),
            ("payment_method_data[billing_details][name]", billing.name.clone()),
            ("payment_method_data[billing_details][email]", billing.email.clone()),
            ("payment_method_data[billing_details][address][line1]", billing.line1.clone()),
            ("payment_method_data[billing_details][address][city]", billing.city.clone()),
            ("payment_method_data[billing_details][address][state]", billing.state.clone()),
            ("payment_method_data[billing_details][address][postal_code]", billing.postal_code.clone()),
            ("payment_method_data[billing_details][address][country]", billing.country.to_string()),
        ]
    }
}

/// Map a confirmed intent to an outcome.
///
/// Anything short of `succeeded` is a decline from the shopper's point of
/// view: 3-D Secure and other redirects cannot be completed here.
fn intent_outcome(response: IntentResponse) -> PaymentOutcome {
    match response.status {
        PaymentStatus::Succeeded => PaymentOutcome::Succeeded {
            payment: PaymentInfo {
                id: response.id,
                status: response.status,
            },
            amount: response.amount,
        },
        PaymentStatus::RequiresAction => PaymentOutcome::Declined {
            message: "Your bank requires additional authentication for this card.".to_string(),
            decline_code: Some("authentication_required".to_string()),
        },
        other => PaymentOutcome::Declined {
            message: format!("Payment was not completed (status: {other})."),
            decline_code: None,
        },
    }
}

/// Map an error body to an outcome, or to an error when it is not a decline.
fn error_outcome(status: u16, body: &str) -> Result<PaymentOutcome, ApiError> {
    let parsed: ErrorResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))?;
    let error = parsed.error;
    if error.kind == "card_error" {
        return Ok(PaymentOutcome::Declined {
            message: error
                .message
                .unwrap_or_else(|| "Your card was declined.".to_string()),
            decline_code: error.decline_code.or(error.code),
        });
    }
    Err(ApiError::Api {
        status,
        message: error.message.unwrap_or(error.kind),
    })
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[instrument(skip(self, intent, card, billing), fields(intent_id = %intent.id, amount = intent.amount, last4 = card.last4()))]
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        card: &ValidCard,
        billing: &BillingDetails,
    ) -> Result<PaymentOutcome, ApiError> {
        let url = self
            .base_url
            .join(&format!("v1/payment_intents/{}/confirm", intent.id))
            .map_err(|e| ApiError::Config(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(self.publishable_key.expose_secret())
            .form(&Self::form(intent, card, billing))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let parsed: IntentResponse =
                serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
            let outcome = intent_outcome(parsed);
            tracing::info!(succeeded = matches!(outcome, PaymentOutcome::Succeeded { .. }), "Stripe confirmation finished");
            return Ok(outcome);
        }

        tracing::warn!(status = %status, "Stripe confirmation returned an error");
        error_outcome(status.as_u16(), &body)
    }
}
