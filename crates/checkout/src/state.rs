//! Application state wiring configuration to collaborators.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;
use crate::checkout::{Checkout, CheckoutDeps};
use crate::config::{CheckoutConfig, PaymentMode};
use crate::error::CheckoutError;
use crate::payment::{IntentService, PaymentProvider, StripeProvider, TestModeIntents, TestModeProvider};
use crate::pricing::PricingCalculator;
use crate::storage::{FileStore, KeyValueStore, StorageError};

/// Simulated round trip for test-mode payments.
const TEST_MODE_LATENCY: Duration = Duration::from_millis(1500);

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("API client error: {0}")]
    Api(#[from] ApiError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to load cart: {0}")]
    Cart(#[from] CheckoutError),
}

/// Application state shared by every command.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CheckoutConfig,
    cart: Arc<CartStore>,
    checkout: Checkout,
}

impl AppState {
    /// Build state from configuration, using file-backed stores under
    /// `config.storage_dir` and the backend API for catalog and orders.
    ///
    /// The saved cart is loaded before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built or the stores
    /// cannot be opened or read.
    pub fn new(config: CheckoutConfig) -> Result<Self, StateError> {
        let api = ApiClient::new(&config.api)?;
        let durable: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.durable_dir())?);
        let session: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.session_dir())?);

        let (intents, provider): (Arc<dyn IntentService>, Arc<dyn PaymentProvider>) = match &config.payment {
            PaymentMode::Test => {
                tracing::warn!("Payments are simulated (test mode); no money will move");
                (
                    Arc::new(TestModeIntents::new()),
                    Arc::new(TestModeProvider::new(TEST_MODE_LATENCY)),
                )
            }
            PaymentMode::Live {
                publishable_key,
                stripe_url,
            } => (
                Arc::new(api.clone()),
                Arc::new(StripeProvider::new(stripe_url.clone(), publishable_key.clone())),
            ),
        };

        let cart = Arc::new(CartStore::new(durable, Arc::new(api.clone())));
        cart.load()?;

        let checkout = Checkout::new(CheckoutDeps {
            cart: cart.clone(),
            pricing: PricingCalculator::new(config.pricing),
            session,
            intents,
            provider,
            orders: Arc::new(api),
        });

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                cart,
                checkout,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }
}
