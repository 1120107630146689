//! Unified error handling with Sentry integration.
//!
//! Every cart and checkout operation returns `Result<T, CheckoutError>`. The
//! caller shows [`CheckoutError::user_message`] either next to the offending
//! form fields or in a banner (see [`CheckoutError::surface`]), and calls
//! [`CheckoutError::report`] once so failures reach logs and Sentry.

use std::fmt;

use hekto_core::{PriceError, ProductId, ShippingError};
use thiserror::Error;

use crate::api::ApiError;
use crate::payment::CardFieldErrors;
use crate::storage::StorageError;

/// The remote step that was in progress when something failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CatalogLookup,
    CartUpdate,
    PaymentIntent,
    PaymentConfirmation,
    OrderCreation,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CatalogLookup => "catalog lookup",
            Self::CartUpdate => "cart update",
            Self::PaymentIntent => "payment intent creation",
            Self::PaymentConfirmation => "payment confirmation",
            Self::OrderCreation => "order creation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input that was rejected before any side effect.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Shipping(#[from] ShippingError),

    #[error("{0}")]
    Card(#[from] CardFieldErrors),

    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),

    #[error("Product {0} is not in the cart")]
    UnknownLineItem(ProductId),
}

/// Where a UI should show an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Next to the form fields named in the error.
    Fields,
    /// In a banner above the form.
    Banner,
}

/// Error type for cart and checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Input failed validation; nothing was changed.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A collaborator could not be reached or answered with an error.
    #[error("Network error during {operation}: {source}")]
    Network {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    /// The payment provider refused the charge. Nothing was captured.
    #[error("Payment declined: {message}")]
    PaymentDeclined {
        message: String,
        decline_code: Option<String>,
    },

    /// Payment was captured but the order could not be recorded.
    #[error("Payment {payment_id} captured but order not recorded: {reason}")]
    OrderReconciliation { payment_id: String, reason: String },

    /// A paid draft is awaiting reconciliation; paying again could double charge.
    #[error("Payment {payment_id} already captured for this order")]
    ResubmissionBlocked { payment_id: String },

    /// A payment attempt was started for this draft and its outcome was never
    /// recorded. The charge may have gone through.
    #[error("Payment attempt {intent_id} has no recorded outcome")]
    PaymentUnresolved { intent_id: String },

    /// The cart no longer matches the priced draft; shipping must be
    /// submitted again to re-price it.
    #[error("Cart changed since the order was priced")]
    CartChanged,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Sign in to check out")]
    Unauthenticated,

    /// No order draft in session storage; shipping must be entered again.
    #[error("No order in progress")]
    NoDraft,

    #[error("Cannot {action} during {stage}")]
    InvalidStage {
        action: &'static str,
        stage: &'static str,
    },

    /// The same operation is already running.
    #[error("{0} already in progress")]
    Busy(Operation),

    /// The cart was reset while the operation was waiting on the network.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Amount error: {0}")]
    Amount(#[from] PriceError),
}

impl CheckoutError {
    pub(crate) fn network(operation: Operation, source: ApiError) -> Self {
        Self::Network { operation, source }
    }

    /// Whether retrying the same action may succeed.
    ///
    /// Reconciliation failures are never retriable from the client.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Network { source, .. } => source.is_retriable(),
            Self::PaymentDeclined { .. } | Self::Busy(_) | Self::Cancelled => true,
            Self::Validation(_)
            | Self::OrderReconciliation { .. }
            | Self::ResubmissionBlocked { .. }
            | Self::PaymentUnresolved { .. }
            | Self::CartChanged
            | Self::EmptyCart
            | Self::Unauthenticated
            | Self::NoDraft
            | Self::InvalidStage { .. }
            | Self::Storage(_)
            | Self::Amount(_) => false,
        }
    }

    /// Whether this is a reconciliation failure (money taken or possibly
    /// taken, no order).
    #[must_use]
    pub const fn is_reconciliation(&self) -> bool {
        matches!(
            self,
            Self::OrderReconciliation { .. }
                | Self::ResubmissionBlocked { .. }
                | Self::PaymentUnresolved { .. }
        )
    }

    #[must_use]
    pub const fn surface(&self) -> ErrorSurface {
        match self {
            Self::Validation(
                ValidationError::Shipping(_) | ValidationError::Card(_),
            ) => ErrorSurface::Fields,
            _ => ErrorSurface::Banner,
        }
    }

    /// Message safe to show the shopper.
    ///
    /// Internal details (URLs, status codes, file paths) are not exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Network { operation, source } => {
                if matches!(source, ApiError::NotFound(_)) && *operation == Operation::CatalogLookup {
                    "This product is no longer available.".to_string()
                } else {
                    format!("We couldn't complete the {operation}. Please try again.")
                }
            }
            Self::PaymentDeclined { message, .. } => message.clone(),
            Self::OrderReconciliation { payment_id, .. } | Self::ResubmissionBlocked { payment_id } => {
                format!(
                    "Your payment was received but we could not confirm your order. \
                     Please contact support with payment reference {payment_id}. Do not pay again."
                )
            }
            Self::PaymentUnresolved { intent_id } => format!(
                "We couldn't confirm whether your payment went through. \
                 Please contact support with payment reference {intent_id}. Do not pay again."
            ),
            Self::CartChanged => {
                "Your cart changed since your order was priced. Please review your order again.".to_string()
            }
            Self::EmptyCart => "Your cart is empty.".to_string(),
            Self::Unauthenticated => "Please sign in to check out.".to_string(),
            Self::NoDraft => "Your checkout session expired. Please enter your shipping details again.".to_string(),
            Self::InvalidStage { .. } => "That step isn't available right now.".to_string(),
            Self::Busy(_) => "Please wait for the current request to finish.".to_string(),
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::Storage(_) | Self::Amount(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Log the error, and capture it to Sentry when it needs attention.
    ///
    /// Reconciliation failures mean money was taken without an order, so they
    /// are always captured.
    pub fn report(&self) {
        if self.is_reconciliation() || matches!(self, Self::Storage(_) | Self::Amount(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Checkout error"
            );
        } else if matches!(self, Self::Network { .. }) {
            tracing::warn!(error = %self, retriable = self.is_retriable(), "Checkout error");
        } else {
            tracing::info!(error = %self, "Checkout rejected");
        }
    }
}

/// Result type alias for `CheckoutError`.
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Set the Sentry user context for the signed-in shopper.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a cart or checkout action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
