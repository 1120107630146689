//! Simulated payments for development and demos.
//!
//! No money moves. Intents are minted locally, and confirmation succeeds for
//! every card except the well-known decline test numbers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hekto_core::{CurrencyCode, PaymentInfo, PaymentStatus};
use parking_lot::Mutex;
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::SecretString;
use uuid::Uuid;

use super::{BillingDetails, IntentService, PaymentIntent, PaymentOutcome, PaymentProvider, ValidCard};
use crate::api::ApiError;

/// Always declined with `generic_decline`.
pub const DECLINE_CARD: &str = "4000000000000002";
/// Always declined with `insufficient_funds`.
pub const INSUFFICIENT_FUNDS_CARD: &str = "4000000000009995";

fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Mints payment intents locally, one per idempotency key.
#[derive(Debug, Default)]
pub struct TestModeIntents {
    issued: Mutex<HashMap<Uuid, PaymentIntent>>,
}

impl TestModeIntents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentService for TestModeIntents {
    async fn create_intent(&self, amount: i64, idempotency_key: Uuid) -> Result<PaymentIntent, ApiError> {
        let mut issued = self.issued.lock();
        let intent = issued.entry(idempotency_key).or_insert_with(|| {
            let id = format!("pi_test{}", random_suffix(14));
            PaymentIntent {
                client_secret: SecretString::from(format!("{id}_secret_{}", random_suffix(20))),
                id,
                amount,
                currency: CurrencyCode::default(),
            }
        });
        Ok(intent.clone())
    }
}

/// Simulated payment provider.
#[derive(Debug, Clone, Default)]
pub struct TestModeProvider {
    latency: Duration,
}

impl TestModeProvider {
    /// Create a provider that answers after `latency`, mimicking a round trip.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl PaymentProvider for TestModeProvider {
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        card: &ValidCard,
        billing: &BillingDetails,
    ) -> Result<PaymentOutcome, ApiError> {
        tracing::info!(
            intent_id = %intent.id,
            amount = intent.amount,
            last4 = card.last4(),
            email = %billing.email,
            "Simulating payment (test mode)"
        );
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = match card.number.as_str() {
            DECLINE_CARD => PaymentOutcome::Declined {
                message: "Your card was declined.".to_string(),
                decline_code: Some("generic_decline".to_string()),
            },
            INSUFFICIENT_FUNDS_CARD => PaymentOutcome::Declined {
                message: "Your card has insufficient funds.".to_string(),
                decline_code: Some("insufficient_funds".to_string()),
            },
            _ => PaymentOutcome::Succeeded {
                payment: PaymentInfo {
                    id: format!("test_pi_{}", random_suffix(10)),
                    status: PaymentStatus::Succeeded,
                },
                amount: intent.amount,
            },
        };
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hekto_core::{Customer, Email, ShippingForm, UserId};

    use super::*;

    fn card(number: &str) -> ValidCard {
        ValidCard {
            number: number.to_string(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".to_string(),
        }
    }

    fn billing() -> BillingDetails {
        let customer = Customer {
            id: UserId::new("u1"),
            name: "Test Shopper".to_string(),
            email: Email::parse("test@example.in").unwrap(),
        };
        let shipping = ShippingForm {
            address: "1 Test Lane".to_string(),
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pin_code: "411001".to_string(),
            phone_number: "9000000000".to_string(),
            landmark: None,
        }
        .validate()
        .unwrap();
        BillingDetails::new(&customer, &shipping)
    }

    #[tokio::test]
    async fn test_intents_are_idempotent_per_key() {
        let intents = TestModeIntents::new();
        let key = Uuid::new_v4();
        let first = intents.create_intent(269_600, key).await.unwrap();
        let second = intents.create_intent(269_600, key).await.unwrap();
        let other = intents.create_intent(269_600, Uuid::new_v4()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert!(first.id.starts_with("pi_test"));
        // The minted secret must round-trip through the parser.
        let reparsed = PaymentIntent::from_client_secret(
            secrecy::ExposeSecret::expose_secret(&first.client_secret).to_string(),
            first.amount,
        )
        .unwrap();
        assert_eq!(reparsed.id, first.id);
    }

    #[tokio::test]
    async fn test_success_charges_intent_amount() {
        let intent = TestModeIntents::new()
            .create_intent(1_000, Uuid::new_v4())
            .await
            .unwrap();
        let outcome = TestModeProvider::default()
            .confirm(&intent, &card("4242424242424242"), &billing())
            .await
            .unwrap();

        match outcome {
            PaymentOutcome::Succeeded { payment, amount } => {
                assert_eq!(amount, 1_000);
                assert!(payment.id.starts_with("test_pi_"));
                assert_eq!(payment.id.len(), "test_pi_".len() + 10);
                assert_eq!(payment.status, PaymentStatus::Succeeded);
            }
            PaymentOutcome::Declined { .. } => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn test_decline_cards() {
        let intent = TestModeIntents::new()
            .create_intent(1_000, Uuid::new_v4())
            .await
            .unwrap();
        let provider = TestModeProvider::default();

        let outcome = provider
            .confirm(&intent, &card(DECLINE_CARD), &billing())
            .await
            .unwrap();
        assert!(matches!(outcome, PaymentOutcome::Declined { decline_code: Some(ref c), .. } if c == "generic_decline"));

        let outcome = provider
            .confirm(&intent, &card(INSUFFICIENT_FUNDS_CARD), &billing())
            .await
            .unwrap();
        assert!(matches!(outcome, PaymentOutcome::Declined { .. }));
    }
}
