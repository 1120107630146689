//! Hekto checkout library.
//!
//! Cart store, pricing calculator and checkout orchestrator for the Hekto
//! storefront, with the backend API, payment provider and browser storage
//! behind traits so the flow can be driven from a CLI or from tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod inflight;
pub mod orders;
pub mod payment;
pub mod pricing;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use cart::{AddItemRequest, CartStore};
pub use checkout::{Checkout, CheckoutDeps, CheckoutStage, Failure, FailureKind};
pub use error::{CheckoutError, ErrorSurface, Operation, ValidationError};
pub use pricing::{PricingCalculator, PricingConfig};
