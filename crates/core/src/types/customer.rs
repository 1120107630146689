//! The signed-in shopper.

use serde::{Deserialize, Serialize};

use crate::{Email, UserId};

/// Identity of the authenticated user placing an order.
///
/// Name and email double as the billing details sent to the payment
/// provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// User's database ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// User's email address.
    pub email: Email,
}
