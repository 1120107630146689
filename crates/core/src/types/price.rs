//! Type-safe price representation using decimal arithmetic.
//!
//! All storefront amounts are in Indian rupees. A [`Price`] is always
//! non-negative and is converted to the payment provider's smallest unit
//! (paise) with [`Price::to_minor_units`], which rounds instead of truncating.
//!
//! Arithmetic is checked: an amount that overflows the decimal range is a
//! [`PriceError::OutOfRange`], never a panic.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places in the smallest currency subunit.
const SUBUNIT_DP: u32 = 2;

/// Errors that can occur when constructing or converting a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Prices cannot be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount does not fit in the provider's integer representation.
    #[error("amount {0} is out of range for minor-unit conversion")]
    OutOfRange(Decimal),
}

/// A non-negative monetary amount in the store currency.
///
/// Serialized as a decimal string (e.g. `"2696.00"`); deserializes from either
/// a string or a JSON number, rejecting negative values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of rupees.
    #[must_use]
    pub fn from_major(rupees: u32) -> Self {
        Self(Decimal::from(rupees))
    }

    /// Create a price from an amount in paise.
    #[must_use]
    pub fn from_minor_units(paise: u64) -> Self {
        Self(Decimal::from(paise) / Decimal::ONE_HUNDRED)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this is the zero amount.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Round to the smallest currency subunit, half away from zero.
    #[must_use]
    pub fn round_to_subunit(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(SUBUNIT_DP, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Multiply by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] on overflow.
    pub fn times(self, quantity: u32) -> Result<Self, PriceError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or(PriceError::OutOfRange(self.0))
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] on overflow.
    pub fn checked_add(self, rhs: Self) -> Result<Self, PriceError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(PriceError::OutOfRange(self.0))
    }

    /// Sum amounts, stopping at the first overflow.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] on overflow.
    pub fn try_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self, PriceError> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }

    /// Multiply by a percentage (e.g. `18` for 18%), rounded to the subunit.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] on overflow.
    pub fn percent(self, rate_percent: Decimal) -> Result<Self, PriceError> {
        let share = self
            .0
            .checked_mul(rate_percent)
            .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(PriceError::OutOfRange(self.0))?;
        Ok(Self(share.max(Decimal::ZERO)).round_to_subunit())
    }

    /// Convert to an integer number of paise for the payment provider.
    ///
    /// Rounds half away from zero so a fractional paisa is never silently
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] if the result does not fit in `i64`.
    pub fn to_minor_units(self) -> Result<i64, PriceError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|paise| paise.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|paise| paise.to_i64())
            .ok_or(PriceError::OutOfRange(self.0))
    }

    /// Format for display (e.g. `₹2696.00`).
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", CurrencyCode::default().symbol(), self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.display())
    }
}

/// ISO 4217 currency codes the storefront can charge in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
        }
    }

    /// Lowercase code as payment providers expect it.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "inr",
            Self::USD => "usd",
        }
    }
}
