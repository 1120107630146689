//! Hekto Core - Shared types library.
//!
//! This crate provides the domain types used by the Hekto checkout stack:
//! - `checkout` - Cart store, pricing calculator and checkout orchestrator
//! - `cli` - Command-line driver for the cart and checkout flow
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no storage,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices and contact details, plus the
//!   cart, shipping and order aggregates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
