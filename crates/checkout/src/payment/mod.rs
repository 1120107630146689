//! Payment collaborators.
//!
//! Paying is a two-step handshake:
//! 1. The backend creates a payment intent for the draft total in paise and
//!    hands back its client secret ([`IntentService`])
//! 2. The payment provider confirms that intent with the shopper's card
//!    ([`PaymentProvider`]) and reports success or a decline
//!
//! Two providers are available: [`StripeProvider`] for live payments and
//! [`TestModeProvider`], which simulates the provider without moving money.

mod card;
mod stripe;
mod test_mode;

pub use card::{CardFieldErrors, CardInput, ValidCard};
pub use stripe::{STRIPE_API_URL, StripeProvider};
pub use test_mode::{DECLINE_CARD, INSUFFICIENT_FUNDS_CARD, TestModeIntents, TestModeProvider};

use async_trait::async_trait;
use hekto_core::{CurrencyCode, Customer, PaymentInfo, ShippingInfo};
use secrecy::SecretString;
use uuid::Uuid;

use crate::api::ApiError;

/// A pending charge tracked by the payment provider.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Provider intent ID (`pi_...`).
    pub id: String,
    /// Secret that authorises confirming this intent from the client.
    pub client_secret: SecretString,
    /// Amount in the currency's smallest unit.
    pub amount: i64,
    pub currency: CurrencyCode,
}

impl PaymentIntent {
    /// Build an intent from a client secret of the form `pi_XXX_secret_YYY`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Parse`] if the secret does not embed an intent ID.
    pub fn from_client_secret(client_secret: String, amount: i64) -> Result<Self, ApiError> {
        let id = client_secret
            .split_once("_secret_")
            .map(|(id, _)| id.to_owned())
            .filter(|id| id.starts_with("pi_"))
            .ok_or_else(|| ApiError::Parse("malformed payment intent client secret".to_string()))?;
        Ok(Self {
            id,
            client_secret: SecretString::from(client_secret),
            amount,
            currency: CurrencyCode::default(),
        })
    }
}

/// Billing details sent with the card, derived from the shopper and the
/// shipping address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: &'static str,
}

impl BillingDetails {
    /// Storefront ships only within India.
    pub const COUNTRY: &'static str = "IN";

    #[must_use]
    pub fn new(customer: &Customer, shipping: &ShippingInfo) -> Self {
        Self {
            name: customer.name.clone(),
            email: customer.email.to_string(),
            line1: shipping.address.clone(),
            city: shipping.city.clone(),
            state: shipping.state.clone(),
            postal_code: shipping.pin_code.to_string(),
            country: Self::COUNTRY,
        }
    }
}

/// Result of confirming a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Money has been captured.
    Succeeded {
        payment: PaymentInfo,
        /// Amount the provider reports as charged, in the smallest unit.
        amount: i64,
    },
    /// The provider refused the charge; nothing was captured.
    Declined {
        message: String,
        decline_code: Option<String>,
    },
}

/// Creates payment intents on the backend.
#[async_trait]
pub trait IntentService: Send + Sync {
    /// Create an intent for `amount` smallest-unit currency.
    ///
    /// `idempotency_key` is stable for one order draft; repeated calls with
    /// the same key must not create a second charge.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the intent could not be created.
    async fn create_intent(&self, amount: i64, idempotency_key: Uuid) -> Result<PaymentIntent, ApiError>;
}

/// Confirms payment intents with the shopper's card.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Confirm `intent` using `card`.
    ///
    /// A decline is an `Ok(PaymentOutcome::Declined)`; `Err` is reserved for
    /// failures to reach the provider or to understand its answer.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the provider could not be reached.
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        card: &ValidCard,
        billing: &BillingDetails,
    ) -> Result<PaymentOutcome, ApiError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hekto_core::{Email, ShippingForm, UserId};
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_intent_from_client_secret() {
        let intent =
            PaymentIntent::from_client_secret("pi_3Nxyz_secret_abc123".to_string(), 269_600).unwrap();
        assert_eq!(intent.id, "pi_3Nxyz");
        assert_eq!(intent.client_secret.expose_secret(), "pi_3Nxyz_secret_abc123");
        assert_eq!(intent.currency, CurrencyCode::INR);
    }

    #[test]
    fn test_intent_rejects_malformed_secret() {
        assert!(PaymentIntent::from_client_secret("garbage".to_string(), 1).is_err());
        assert!(PaymentIntent::from_client_secret("seti_1_secret_2".to_string(), 1).is_err());
    }

    #[test]
    fn test_billing_details() {
        let customer = Customer {
            id: UserId::new("u1"),
            name: "Asha Rao".to_string(),
            email: Email::parse("asha@example.in").unwrap(),
        };
        let shipping = ShippingForm {
            address: "5 Residency Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pin_code: "560025".to_string(),
            phone_number: "9845098450".to_string(),
            landmark: None,
        }
        .validate()
        .unwrap();

        let billing = BillingDetails::new(&customer, &shipping);
        assert_eq!(billing.name, "Asha Rao");
        assert_eq!(billing.postal_code, "560025");
        assert_eq!(billing.country, "IN");
    }
}
