//! Core types for Hekto.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod contact;
pub mod customer;
pub mod id;
pub mod order;
pub mod price;
pub mod shipping;
pub mod status;

pub use cart::{Cart, CartLineItem, MAX_QUANTITY_PER_LINE, clamp_quantity, max_quantity, slugify};
pub use contact::{ContactError, Email, PhoneNumber, PinCode};
pub use customer::Customer;
pub use id::*;
pub use order::{OrderDraft, PaymentInfo, Totals};
pub use price::{CurrencyCode, Price, PriceError};
pub use shipping::{ShippingError, ShippingField, ShippingForm, ShippingInfo};
pub use status::*;
