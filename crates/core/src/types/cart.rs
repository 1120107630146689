//! Cart aggregate and line items.
//!
//! A [`Cart`] holds at most one [`CartLineItem`] per product. The helpers
//! here are pure; persistence and catalog lookups live in the checkout crate.

use serde::{Deserialize, Serialize};

use crate::{Price, PriceError, ProductId, ShippingInfo};

/// Upper bound on the quantity of a single line, regardless of stock.
pub const MAX_QUANTITY_PER_LINE: u32 = 10;

/// Build the catalog slug for a product name.
///
/// Trims the name and replaces each run of whitespace with a single `-`, the
/// same form the product URLs use.
///
/// ```
/// assert_eq!(hekto_core::slugify("  Comfy   Handy Craft "), "Comfy-Handy-Craft");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("-")
}

/// One product entry in a cart, with a price snapshot from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub image_url: String,
    pub available_stock: u32,
}

impl CartLineItem {
    /// Catalog slug used when re-fetching this product.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// `unit_price × quantity`, unrounded.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] if the product overflows.
    pub fn line_total(&self) -> Result<Price, PriceError> {
        self.unit_price.times(self.quantity)
    }

    /// Largest quantity the picker may offer for this line.
    #[must_use]
    pub fn max_quantity(&self) -> u32 {
        max_quantity(self.available_stock)
    }

    /// Quantities offered by the quantity picker: `1..=min(stock, 10)`.
    pub fn quantity_options(&self) -> impl Iterator<Item = u32> {
        1..=self.max_quantity()
    }
}

/// Largest orderable quantity for a product with `available_stock` units.
#[must_use]
pub fn max_quantity(available_stock: u32) -> u32 {
    available_stock.min(MAX_QUANTITY_PER_LINE)
}

/// Clamp a requested quantity into `[1, min(available_stock, 10)]`.
///
/// Returns `None` when the product is out of stock and no quantity is valid.
#[must_use]
pub fn clamp_quantity(requested: u32, available_stock: u32) -> Option<u32> {
    let max = max_quantity(available_stock);
    (max >= 1).then(|| requested.clamp(1, max))
}

/// The client-side cart aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub line_items: Vec<CartLineItem>,
    pub shipping_info: Option<ShippingInfo>,
}

impl Cart {
    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.line_items.iter().map(|line| line.quantity).sum()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLineItem> {
        self.line_items
            .iter()
            .find(|line| &line.product_id == product_id)
    }

    /// Insert a line, or replace the existing line for the same product in
    /// place so display order is preserved.
    pub fn upsert(&mut self, line: CartLineItem) {
        match self
            .line_items
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => *existing = line,
            None => self.line_items.push(line),
        }
    }

    /// Remove the line for a product. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.line_items.len();
        self.line_items.retain(|line| &line.product_id != product_id);
        self.line_items.len() != before
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, quantity: u32) -> CartLineItem {
        CartLineItem {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Price::from_major(100),
            quantity,
            image_url: String::new(),
            available_stock: 20,
        }
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(0, 5), Some(1));
        assert_eq!(clamp_quantity(3, 5), Some(3));
        assert_eq!(clamp_quantity(8, 5), Some(5));
        assert_eq!(clamp_quantity(15, 50), Some(10));
        assert_eq!(clamp_quantity(1, 0), None);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut cart = Cart::default();
        cart.upsert(line("a", 1));
        cart.upsert(line("b", 2));
        cart.upsert(line("a", 4));

        assert_eq!(cart.line_items.len(), 2);
        assert_eq!(cart.line_items[0].product_id.as_str(), "a");
        assert_eq!(cart.line_items[0].quantity, 4);
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cart = Cart::default();
        cart.upsert(line("a", 1));
        assert!(!cart.remove(&ProductId::new("zzz")));
        assert_eq!(cart.line_items.len(), 1);
        assert!(cart.remove(&ProductId::new("a")));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quantity_options() {
        let mut item = line("a", 1);
        item.available_stock = 3;
        assert_eq!(item.quantity_options().collect::<Vec<_>>(), vec![1, 2, 3]);
        item.available_stock = 40;
        assert_eq!(item.quantity_options().count(), 10);
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line("a", 3).line_total().unwrap(), Price::from_major(300));

        let mut item = line("a", 2);
        item.unit_price = Price::new(rust_decimal::Decimal::MAX).unwrap();
        assert!(matches!(item.line_total(), Err(PriceError::OutOfRange(_))));
    }

    #[test]
    fn test_slug() {
        let mut item = line("a", 1);
        item.name = "Vel elit euismod".to_string();
        assert_eq!(item.slug(), "Vel-elit-euismod");
    }
}
