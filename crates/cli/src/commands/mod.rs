//! Command implementations.

pub mod cart;
pub mod checkout;
pub mod shipping;

use hekto_checkout::config::ConfigError;
use hekto_checkout::state::StateError;
use hekto_checkout::{CheckoutError, ErrorSurface, ValidationError};
use hekto_core::{CartLineItem, Totals};
use thiserror::Error;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Startup error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Arguments were well-formed but not usable.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Log the error and capture it to Sentry where warranted.
    pub fn report(&self) {
        match self {
            Self::Checkout(err) => err.report(),
            Self::Usage(_) => {}
            other => tracing::error!("Command failed: {other}"),
        }
    }

    /// Print a shopper-facing message on stderr.
    #[allow(clippy::print_stderr)]
    pub fn print(&self) {
        match self {
            Self::Checkout(err) if err.surface() == ErrorSurface::Fields => {
                eprintln!("Please fix the following:");
                for line in field_messages(err) {
                    eprintln!("  {line}");
                }
            }
            Self::Checkout(err) => eprintln!("error: {}", err.user_message()),
            other => eprintln!("error: {other}"),
        }
    }
}

fn field_messages(err: &CheckoutError) -> Vec<String> {
    match err {
        CheckoutError::Validation(ValidationError::Shipping(shipping)) => shipping
            .field_errors()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect(),
        CheckoutError::Validation(ValidationError::Card(card)) => [
            ("card", &card.card),
            ("expiry", &card.expiry),
            ("cvc", &card.cvc),
        ]
        .into_iter()
        .filter_map(|(field, message)| message.as_ref().map(|m| format!("{field}: {m}")))
        .collect(),
        other => vec![other.user_message()],
    }
}

/// Line total for display; an amount too large to compute prints as such.
fn line_total_text(line: &CartLineItem) -> String {
    line.line_total()
        .map_or_else(|e| e.to_string(), |total| total.to_string())
}

#[allow(clippy::print_stdout)]
fn print_totals(totals: &Totals) {
    println!("  Subtotal:  {:>12}", totals.items_price);
    println!("  Shipping:  {:>12}", totals.shipping_price);
    println!("  GST:       {:>12}", totals.tax_price);
    println!("  Total:     {:>12}", totals.total_price);
}
