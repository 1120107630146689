//! Price totals and the order draft handed to order creation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CartLineItem, PaymentStatus, Price, ShippingInfo};

/// Derived cart totals.
///
/// Invariant: `total_price == items_price + shipping_price + tax_price`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub items_price: Price,
    pub shipping_price: Price,
    pub tax_price: Price,
    pub total_price: Price,
}

impl Totals {
    /// All-zero totals for an empty cart.
    pub const ZERO: Self = Self {
        items_price: Price::ZERO,
        shipping_price: Price::ZERO,
        tax_price: Price::ZERO,
        total_price: Price::ZERO,
    };
}

/// Provider reference for a captured payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    /// Provider transaction (payment intent) ID.
    pub id: String,
    /// Provider status at the time of capture.
    pub status: PaymentStatus,
}

/// Pricing snapshot agreed at the end of shipping entry.
///
/// Lives in session storage for the duration of the payment step, so a
/// reload does not change the amount the shopper agreed to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    /// Stable per draft; used as the payment-intent idempotency key.
    pub draft_id: Uuid,
    pub shipping_info: ShippingInfo,
    pub order_items: Vec<CartLineItem>,
    #[serde(flatten)]
    pub totals: Totals,
    /// Set once the provider has captured payment for this draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_info: Option<PaymentInfo>,
    /// Payment intent being confirmed for this draft. Written before the
    /// provider is asked to charge and cleared when the charge is refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_attempt: Option<String>,
}

impl OrderDraft {
    /// Create a draft with a fresh ID and no payment.
    #[must_use]
    pub fn new(shipping_info: ShippingInfo, order_items: Vec<CartLineItem>, totals: Totals) -> Self {
        Self {
            draft_id: Uuid::new_v4(),
            shipping_info,
            order_items,
            totals,
            payment_info: None,
            payment_attempt: None,
        }
    }

    /// Whether payment has already been captured for this draft.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        self.payment_info.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ShippingForm;

    fn draft() -> OrderDraft {
        let shipping = ShippingForm {
            address: "1 Park Street".to_string(),
            city: "Kolkata".to_string(),
            state: "West Bengal".to_string(),
            pin_code: "700016".to_string(),
            phone_number: "9830012345".to_string(),
            landmark: None,
        }
        .validate()
        .unwrap();
        OrderDraft::new(
            shipping,
            Vec::new(),
            Totals {
                items_price: Price::from_major(2200),
                shipping_price: Price::from_major(100),
                tax_price: Price::from_major(396),
                total_price: Price::from_major(2696),
            },
        )
    }

    #[test]
    fn test_draft_json_flattens_totals() {
        let json = serde_json::to_value(draft()).unwrap();
        assert_eq!(json["itemsPrice"], "2200");
        assert_eq!(json["totalPrice"], "2696");
        assert!(json.get("totals").is_none());
        assert!(json.get("paymentInfo").is_none());
        assert!(json.get("paymentAttempt").is_none());
    }

    #[test]
    fn test_draft_survives_storage() {
        let mut original = draft();
        original.payment_attempt = Some("pi_123".to_string());
        original.payment_info = Some(PaymentInfo {
            id: "pi_123".to_string(),
            status: PaymentStatus::Succeeded,
        });
        let json = serde_json::to_string(&original).unwrap();
        let restored: OrderDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
        assert!(restored.is_paid());
    }
}
