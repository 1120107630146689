//! Cart pricing.
//!
//! [`PricingCalculator::compute`] is the single source of totals: the cart
//! summary, the order draft and the payment amount all call it, so what the
//! shopper sees is what they are charged.

use hekto_core::{Cart, CartLineItem, Price, PriceError, Totals};
use rust_decimal::Decimal;

/// Shipping and tax rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    /// Charged when the subtotal is below `free_shipping_threshold`.
    pub flat_rate: Price,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Price,
    /// Tax on the subtotal, in percent.
    pub tax_rate_percent: Decimal,
}

impl Default for PricingConfig {
    /// ₹100 shipping below ₹3000, 18% GST.
    fn default() -> Self {
        Self {
            flat_rate: Price::from_major(100),
            free_shipping_threshold: Price::from_major(3000),
            tax_rate_percent: Decimal::from(18),
        }
    }
}

/// Pure, deterministic price derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingCalculator {
    config: PricingConfig,
}

impl PricingCalculator {
    #[must_use]
    pub const fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Derive totals for a set of line items.
    ///
    /// Every component is rounded to the paisa, half away from zero, and the
    /// total is the exact sum of the rounded components. An empty list prices
    /// to zero everywhere, shipping included.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] if any amount overflows.
    pub fn compute(&self, line_items: &[CartLineItem]) -> Result<Totals, PriceError> {
        if line_items.is_empty() {
            return Ok(Totals::ZERO);
        }

        let line_totals = line_items
            .iter()
            .map(CartLineItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        let items_price = Price::try_sum(line_totals)?.round_to_subunit();
        let shipping_price = if items_price < self.config.free_shipping_threshold {
            self.config.flat_rate.round_to_subunit()
        } else {
            Price::ZERO
        };
        let tax_price = items_price.percent(self.config.tax_rate_percent)?;
        let total_price = Price::try_sum([items_price, shipping_price, tax_price])?.round_to_subunit();

        Ok(Totals {
            items_price,
            shipping_price,
            tax_price,
            total_price,
        })
    }

    /// Totals for a cart. Shipping info does not affect the price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] if any amount overflows.
    pub fn totals(&self, cart: &Cart) -> Result<Totals, PriceError> {
        self.compute(&cart.line_items)
    }
}
