//! Checkout stages.

use std::fmt;

use hekto_core::OrderId;
use serde::Serialize;

use crate::error::{CheckoutError, Operation};

/// Why a checkout attempt ended in [`CheckoutStage::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// A collaborator could not be reached. Nothing was charged.
    Network {
        #[serde(serialize_with = "serialize_operation")]
        operation: Operation,
    },
    /// The provider refused the card. Nothing was charged.
    PaymentDeclined { decline_code: Option<String> },
    /// Money was taken but no order exists. Needs manual follow-up.
    Reconciliation { payment_id: String },
    /// Local failure (storage, amount conversion).
    Internal,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_operation<S: serde::Serializer>(operation: &Operation, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(operation.as_str())
}

/// A terminal checkout failure as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    #[serde(flatten)]
    pub kind: FailureKind,
    pub message: String,
    pub retriable: bool,
}

impl From<&CheckoutError> for Failure {
    fn from(err: &CheckoutError) -> Self {
        let kind = match err {
            CheckoutError::Network { operation, .. } => FailureKind::Network {
                operation: *operation,
            },
            CheckoutError::PaymentDeclined { decline_code, .. } => FailureKind::PaymentDeclined {
                decline_code: decline_code.clone(),
            },
            CheckoutError::OrderReconciliation { payment_id, .. }
            | CheckoutError::ResubmissionBlocked { payment_id }
            | CheckoutError::PaymentUnresolved {
                intent_id: payment_id,
            } => FailureKind::Reconciliation {
                payment_id: payment_id.clone(),
            },
            _ => FailureKind::Internal,
        };
        Self {
            kind,
            message: err.user_message(),
            retriable: err.is_retriable(),
        }
    }
}

/// Where the shopper is in the checkout flow.
///
/// ```text
/// CartReview -> ShippingEntry -> PaymentEntry -> PaymentConfirmation -> OrderSubmission -> Success
///                                     ^                  |                    |
///                                     +---- Failed <-----+--------------------+
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CheckoutStage {
    #[default]
    CartReview,
    ShippingEntry,
    PaymentEntry,
    /// Waiting on the payment provider.
    PaymentConfirmation,
    /// Payment captured; waiting on order creation.
    OrderSubmission,
    Success {
        order_id: OrderId,
    },
    Failed(Failure),
}

impl CheckoutStage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CartReview => "cart review",
            Self::ShippingEntry => "shipping entry",
            Self::PaymentEntry => "payment entry",
            Self::PaymentConfirmation => "payment confirmation",
            Self::OrderSubmission => "order submission",
            Self::Success { .. } => "success",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether a network call for this checkout is outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::PaymentConfirmation | Self::OrderSubmission)
    }

    /// Payment ID awaiting reconciliation, if the checkout is stuck there.
    #[must_use]
    pub fn reconciliation_payment(&self) -> Option<&str> {
        match self {
            Self::Failed(Failure {
                kind: FailureKind::Reconciliation { payment_id },
                ..
            }) => Some(payment_id),
            _ => None,
        }
    }

    /// Whether paying from this stage is allowed.
    #[must_use]
    pub fn accepts_payment(&self) -> bool {
        match self {
            Self::PaymentEntry => true,
            Self::Failed(failure) => !matches!(failure.kind, FailureKind::Reconciliation { .. }),
            _ => false,
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { order_id } => write!(f, "success (order {order_id})"),
            Self::Failed(failure) => write!(f, "failed: {}", failure.message),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ApiError;

    #[test]
    fn test_failure_from_decline_is_retriable() {
        let failure = Failure::from(&CheckoutError::PaymentDeclined {
            message: "Your card was declined.".to_string(),
            decline_code: Some("generic_decline".to_string()),
        });
        assert!(failure.retriable);
        assert_eq!(failure.message, "Your card was declined.");
        assert!(CheckoutStage::Failed(failure).accepts_payment());
    }

    #[test]
    fn test_reconciliation_blocks_payment() {
        let stage = CheckoutStage::Failed(Failure::from(&CheckoutError::OrderReconciliation {
            payment_id: "pi_7".to_string(),
            reason: "timeout".to_string(),
        }));
        assert!(!stage.accepts_payment());
        assert_eq!(stage.reconciliation_payment(), Some("pi_7"));
    }

    #[test]
    fn test_stage_json() {
        let stage = CheckoutStage::Failed(Failure::from(&CheckoutError::network(
            Operation::PaymentIntent,
            ApiError::Unavailable("down".to_string()),
        )));
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["stage"], "failed");
        assert_eq!(json["kind"], "network");
        assert_eq!(json["operation"], "payment intent creation");
        assert_eq!(json["retriable"], true);

        let json = serde_json::to_value(CheckoutStage::PaymentEntry).unwrap();
        assert_eq!(json, serde_json::json!({ "stage": "payment_entry" }));
    }
}
