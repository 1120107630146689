//! The cart store.
//!
//! Holds the shopper's line items and shipping address, persists every
//! change to durable storage, and re-reads product data from the catalog on
//! each add so stored prices are always the catalog's.
//!
//! Mutations are applied atomically under one lock, and the full list is
//! written to storage before the in-memory cart is replaced, so a failed
//! write never leaves memory and storage disagreeing.

use std::sync::Arc;

use hekto_core::{
    Cart, CartLineItem, Price, ProductId, ShippingForm, ShippingInfo, clamp_quantity, slugify,
};
use parking_lot::Mutex;
use tracing::instrument;

use crate::catalog::Catalog;
use crate::error::{CheckoutError, Operation, Result, ValidationError, add_breadcrumb};
use crate::inflight::{Epoch, InFlight};
use crate::storage::{KeyValueStore, keys, load_json, save_json};

/// An add-to-cart request as issued from a product page.
///
/// `unit_price` and `available_stock` are what the page displayed; they are
/// only compared against the catalog, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub image_url: String,
    pub available_stock: u32,
}

impl From<&CartLineItem> for AddItemRequest {
    fn from(line: &CartLineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            image_url: line.image_url.clone(),
            available_stock: line.available_stock,
        }
    }
}

/// Persistent cart state container.
pub struct CartStore {
    cart: Mutex<Cart>,
    storage: Arc<dyn KeyValueStore>,
    catalog: Arc<dyn Catalog>,
    epoch: Epoch,
    in_flight: InFlight,
}

impl CartStore {
    /// Create an empty store. Call [`CartStore::load`] to restore a saved cart.
    pub fn new(storage: Arc<dyn KeyValueStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            cart: Mutex::new(Cart::default()),
            storage,
            catalog,
            epoch: Epoch::default(),
            in_flight: InFlight::new(),
        }
    }

    /// Restore line items and shipping info from durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if the store cannot be read.
    pub fn load(&self) -> Result<()> {
        let line_items: Vec<CartLineItem> =
            load_json(self.storage.as_ref(), keys::CART_ITEMS)?.unwrap_or_default();
        let shipping_info: Option<ShippingInfo> =
            load_json(self.storage.as_ref(), keys::SHIPPING_INFO)?;

        let mut cart = self.cart.lock();
        tracing::debug!(lines = line_items.len(), has_shipping = shipping_info.is_some(), "Cart loaded");
        *cart = Cart {
            line_items,
            shipping_info,
        };
        Ok(())
    }

    /// Add a product, or replace the quantity of a product already in the
    /// cart.
    ///
    /// The catalog is queried first; its name, price, stock and image are
    /// what gets stored. The quantity is clamped to `[1, min(stock, 10)]`.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Busy`] if another add or update is running
    /// - [`CheckoutError::Network`] if the catalog lookup fails
    /// - [`ValidationError::OutOfStock`] if the product has no stock
    /// - [`CheckoutError::Cancelled`] if the cart was cleared meanwhile
    /// - [`CheckoutError::Storage`] if the cart cannot be persisted
    ///
    /// The cart is unchanged on every error.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add_item(&self, request: AddItemRequest) -> Result<CartLineItem> {
        let _guard = self
            .in_flight
            .try_begin()
            .ok_or(CheckoutError::Busy(Operation::CartUpdate))?;
        let snapshot = self.epoch.current();

        let slug = slugify(&request.name);
        let product = self
            .catalog
            .product(&slug, &request.product_id)
            .await
            .map_err(|e| CheckoutError::network(Operation::CatalogLookup, e))?;

        if product.price != request.unit_price {
            tracing::warn!(
                displayed = %request.unit_price,
                catalog = %product.price,
                "Displayed price differs from catalog; using catalog price"
            );
        }

        let quantity = clamp_quantity(request.quantity, product.stock)
            .ok_or_else(|| ValidationError::OutOfStock(request.product_id.clone()))?;
        if quantity != request.quantity {
            tracing::debug!(requested = request.quantity, quantity, stock = product.stock, "Quantity clamped");
        }

        let line = CartLineItem {
            product_id: request.product_id,
            image_url: product.primary_image().to_string(),
            name: product.name,
            unit_price: product.price,
            quantity,
            available_stock: product.stock,
        };

        let mut cart = self.cart.lock();
        if !self.epoch.is_current(snapshot) {
            tracing::info!("Cart reset while fetching product; discarding result");
            return Err(CheckoutError::Cancelled);
        }
        let mut next = cart.clone();
        next.upsert(line.clone());
        save_json(self.storage.as_ref(), keys::CART_ITEMS, &next.line_items)?;
        *cart = next;
        drop(cart);

        add_breadcrumb(
            "cart",
            "Item added",
            Some(&[("product_id", line.product_id.as_str())]),
        );
        Ok(line)
    }

    /// Change the quantity of a line, re-reading the product from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownLineItem`] if the product is not in
    /// the cart, otherwise the same errors as [`CartStore::add_item`].
    pub async fn update_quantity(&self, product_id: &ProductId, quantity: u32) -> Result<CartLineItem> {
        let request = {
            let cart = self.cart.lock();
            let line = cart
                .line(product_id)
                .ok_or_else(|| ValidationError::UnknownLineItem(product_id.clone()))?;
            AddItemRequest {
                quantity,
                ..AddItemRequest::from(line)
            }
        };
        self.add_item(request).await
    }

    /// Remove a product. Returns whether a line was removed; removing a
    /// product that is not in the cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if the cart cannot be persisted.
    pub fn remove_item(&self, product_id: &ProductId) -> Result<bool> {
        let mut cart = self.cart.lock();
        let mut next = cart.clone();
        if !next.remove(product_id) {
            return Ok(false);
        }
        save_json(self.storage.as_ref(), keys::CART_ITEMS, &next.line_items)?;
        *cart = next;
        drop(cart);

        add_breadcrumb("cart", "Item removed", Some(&[("product_id", product_id.as_str())]));
        Ok(true)
    }

    /// Empty the cart and delete its storage key.
    ///
    /// Shipping info is kept. Any add or update still waiting on the catalog
    /// is discarded when it returns.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if the key cannot be deleted; the
    /// in-memory cart is left unchanged in that case.
    pub fn clear_cart(&self) -> Result<()> {
        let mut cart = self.cart.lock();
        self.epoch.advance();
        self.storage.remove(keys::CART_ITEMS)?;
        cart.line_items.clear();
        drop(cart);

        add_breadcrumb("cart", "Cart cleared", None);
        Ok(())
    }

    /// Remove the lines an order was placed for.
    ///
    /// Only lines still exactly as ordered are removed; anything added or
    /// changed after the order was priced stays. Returns the lines kept.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if the cart cannot be persisted;
    /// the in-memory cart is left unchanged in that case.
    pub fn remove_ordered(&self, ordered: &[CartLineItem]) -> Result<Vec<CartLineItem>> {
        let mut cart = self.cart.lock();
        let mut next = cart.clone();
        next.line_items.retain(|line| !ordered.contains(line));
        if next.is_empty() {
            self.storage.remove(keys::CART_ITEMS)?;
        } else {
            save_json(self.storage.as_ref(), keys::CART_ITEMS, &next.line_items)?;
        }
        let kept = next.line_items.clone();
        *cart = next;
        drop(cart);

        add_breadcrumb("cart", "Ordered items removed", None);
        Ok(kept)
    }

    /// Validate and store the shipping address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Shipping`] naming every missing or
    /// malformed field, or [`CheckoutError::Storage`].
    pub fn set_shipping_info(&self, form: &ShippingForm) -> Result<ShippingInfo> {
        let info = form.validate().map_err(ValidationError::from)?;

        let mut cart = self.cart.lock();
        save_json(self.storage.as_ref(), keys::SHIPPING_INFO, &info)?;
        cart.shipping_info = Some(info.clone());
        Ok(info)
    }

    /// Discard the result of any add or update currently waiting on the
    /// catalog.
    pub fn cancel_pending(&self) {
        self.epoch.advance();
    }

    /// Copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.cart.lock().clone()
    }

    #[must_use]
    pub fn line_items(&self) -> Vec<CartLineItem> {
        self.cart.lock().line_items.clone()
    }

    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<CartLineItem> {
        self.cart.lock().line(product_id).cloned()
    }

    #[must_use]
    pub fn shipping_info(&self) -> Option<ShippingInfo> {
        self.cart.lock().shipping_info.clone()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.lock().item_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart.lock().is_empty()
    }

    /// Whether an add or update is waiting on the catalog.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_busy()
    }
}
