//! End-to-end tests for the Hekto cart and checkout flow.
//!
//! The flow runs against in-process collaborators: a scripted catalog, an
//! order service that records what it was sent, and the simulated payment
//! provider with an optional gate for holding a payment in flight.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p hekto-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use hekto_checkout::api::ApiError;
use hekto_checkout::catalog::{Catalog, CatalogProduct};
use hekto_checkout::orders::{OrderReceipt, OrderService};
use hekto_checkout::payment::{
    BillingDetails, CardInput, PaymentIntent, PaymentOutcome, PaymentProvider, TestModeIntents, TestModeProvider,
    ValidCard,
};
use hekto_checkout::storage::{KeyValueStore, MemoryStore, StorageError};
use hekto_checkout::{AddItemRequest, CartStore, Checkout, CheckoutDeps, PricingCalculator};
use hekto_core::{Customer, Email, OrderDraft, OrderId, OrderStatus, Price, ProductId, ShippingForm, UserId};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Card number the simulated provider accepts.
pub const GOOD_CARD: &str = "4242424242424242";

/// Catalog backed by a map, with an optional gate that holds lookups until
/// released.
#[derive(Default)]
pub struct FakeCatalog {
    products: Mutex<HashMap<ProductId, CatalogProduct>>,
    lookups: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    down: AtomicBool,
}

impl FakeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub fn stock(&self, id: &str, name: &str, price: u32, stock: u32) {
        self.products.lock().insert(
            ProductId::new(id),
            CatalogProduct {
                id: ProductId::new(id),
                name: name.to_string(),
                price: Price::from_major(price),
                stock,
                images: Vec::new(),
            },
        );
    }

    /// Hold every subsequent lookup until the returned handle is notified.
    #[must_use]
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Make lookups fail as if the catalog were unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Slugs passed to the catalog so far.
    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn product(&self, slug: &str, id: &ProductId) -> Result<CatalogProduct, ApiError> {
        self.lookups.lock().push(slug.to_string());
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("catalog offline".to_string()));
        }
        self.products
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("product {id}")))
    }
}

/// Order service that records every submission.
#[derive(Default)]
pub struct FakeOrders {
    fail: AtomicBool,
    submitted: Mutex<Vec<OrderDraft>>,
}

impl FakeOrders {
    /// Make order creation fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn submitted(&self) -> Vec<OrderDraft> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl OrderService for FakeOrders {
    async fn create_order(&self, order: &OrderDraft) -> Result<OrderReceipt, ApiError> {
        self.submitted.lock().push(order.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 500,
                message: "order service error".to_string(),
            });
        }
        let n = self.submitted.lock().len();
        Ok(OrderReceipt {
            order_id: OrderId::new(format!("ord_{n}")),
            status: OrderStatus::Processing,
        })
    }
}

/// Simulated provider that counts confirmations and can be held mid-flight.
#[derive(Default)]
pub struct GatedProvider {
    inner: TestModeProvider,
    confirmations: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl GatedProvider {
    /// Hold every subsequent confirmation until the returned handle is
    /// notified.
    #[must_use]
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Number of confirmations attempted.
    #[must_use]
    pub fn confirmations(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for GatedProvider {
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        card: &ValidCard,
        billing: &BillingDetails,
    ) -> Result<PaymentOutcome, ApiError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.confirm(intent, card, billing).await
    }
}

/// In-memory store that can be told to refuse writes.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    writes_left: Mutex<Option<usize>>,
}

impl FlakyStore {
    /// Accept `count` more writes and refuse the rest; `None` accepts all.
    pub fn allow_writes(&self, count: Option<usize>) {
        *self.writes_left.lock() = count;
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut writes_left = self.writes_left.lock();
            match writes_left.as_mut() {
                Some(0) => {
                    return Err(StorageError::Io {
                        key: key.to_string(),
                        source: std::io::Error::other("storage quota exceeded"),
                    });
                }
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

/// One shopper's cart and checkout wired to fakes.
pub struct TestShop {
    pub durable: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub catalog: Arc<FakeCatalog>,
    pub orders: Arc<FakeOrders>,
    pub provider: Arc<GatedProvider>,
    pub cart: Arc<CartStore>,
    pub checkout: Checkout,
}

impl TestShop {
    /// Shop with in-memory storage and a catalog holding two products.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stores(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Shop over the given stores. Call [`CartStore::load`] to pick up a
    /// saved cart.
    #[must_use]
    pub fn with_stores(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        let catalog = Arc::new(FakeCatalog::new());
        catalog.stock("p-chair", "Mini LCW Chair", 500, 12);
        catalog.stock("p-sofa", "Comfort Handy Craft", 1200, 3);

        let orders = Arc::new(FakeOrders::default());
        let provider = Arc::new(GatedProvider::default());
        let cart = Arc::new(CartStore::new(durable.clone(), catalog.clone()));
        let checkout = Checkout::new(CheckoutDeps {
            cart: cart.clone(),
            pricing: PricingCalculator::default(),
            session: session.clone(),
            intents: Arc::new(TestModeIntents::new()),
            provider: provider.clone(),
            orders: orders.clone(),
        });

        Self {
            durable,
            session,
            catalog,
            orders,
            provider,
            cart,
            checkout,
        }
    }

    /// Add `quantity` of a stocked product as the product page would.
    ///
    /// # Errors
    ///
    /// Propagates the cart error.
    pub async fn add(&self, id: &str, quantity: u32) -> hekto_checkout::error::Result<()> {
        let (name, price, stock) = {
            let products = self.catalog.products.lock();
            let product = products.get(&ProductId::new(id));
            product.map_or_else(
                || (id.to_string(), Price::ZERO, 0),
                |p| (p.name.clone(), p.price, p.stock),
            )
        };
        self.cart
            .add_item(AddItemRequest {
                product_id: ProductId::new(id),
                name,
                unit_price: price,
                quantity,
                image_url: String::new(),
                available_stock: stock,
            })
            .await?;
        Ok(())
    }
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed-in shopper.
///
/// # Panics
///
/// Never; the email is a valid literal.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn customer() -> Customer {
    Customer {
        id: UserId::new("64f0c0ffee0000000000abcd"),
        name: "Asha Rao".to_string(),
        email: Email::parse("asha@example.in").unwrap(),
    }
}

/// A valid shipping form.
#[must_use]
pub fn shipping() -> ShippingForm {
    ShippingForm {
        address: "221 Residency Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pin_code: "560025".to_string(),
        phone_number: "9876543210".to_string(),
        landmark: Some("Near Richmond Circle".to_string()),
    }
}

/// Card input with a far-future expiry.
#[must_use]
pub fn card(number: &str) -> CardInput {
    CardInput {
        number: number.to_string(),
        expiry: "12/40".to_string(),
        cvc: "123".to_string(),
    }
}
