//! Checkout orchestrator.
//!
//! Drives one checkout attempt through its stages:
//!
//! 1. [`Checkout::begin`] leaves cart review once the cart has items and the
//!    shopper is signed in
//! 2. [`Checkout::submit_shipping`] validates the address, prices the cart
//!    and saves the resulting [`OrderDraft`] to session storage
//! 3. [`Checkout::pay`] validates the card, creates a payment intent for the
//!    draft total, confirms it with the provider and records the order
//!
//! The cart and the draft survive every failure. The draft is re-saved with
//! the payment intent before the provider is asked to charge, and with the
//! payment reference once money has been taken. A reload that finds either
//! marker resumes as needing reconciliation, and paying again is refused.
//! Paying also refuses a draft whose items no longer match the cart.

mod stage;

pub use stage::{CheckoutStage, Failure, FailureKind};

use std::sync::Arc;

use hekto_core::{Customer, OrderDraft, ShippingForm};
use parking_lot::Mutex;
use tracing::instrument;

use crate::cart::CartStore;
use crate::error::{CheckoutError, Operation, Result, ValidationError, add_breadcrumb};
use crate::inflight::InFlight;
use crate::orders::{OrderReceipt, OrderService};
use crate::payment::{BillingDetails, CardInput, IntentService, PaymentOutcome, PaymentProvider, ValidCard};
use crate::pricing::PricingCalculator;
use crate::storage::{KeyValueStore, keys, load_json, save_json};

/// Collaborators a [`Checkout`] is built from.
pub struct CheckoutDeps {
    pub cart: Arc<CartStore>,
    pub pricing: PricingCalculator,
    /// Session-scoped store holding the order draft.
    pub session: Arc<dyn KeyValueStore>,
    pub intents: Arc<dyn IntentService>,
    pub provider: Arc<dyn PaymentProvider>,
    pub orders: Arc<dyn OrderService>,
}

/// Checkout state machine for one shopper.
pub struct Checkout {
    cart: Arc<CartStore>,
    pricing: PricingCalculator,
    session: Arc<dyn KeyValueStore>,
    intents: Arc<dyn IntentService>,
    provider: Arc<dyn PaymentProvider>,
    orders: Arc<dyn OrderService>,
    stage: Mutex<CheckoutStage>,
    submitting: InFlight,
}

impl Checkout {
    #[must_use]
    pub fn new(deps: CheckoutDeps) -> Self {
        Self {
            cart: deps.cart,
            pricing: deps.pricing,
            session: deps.session,
            intents: deps.intents,
            provider: deps.provider,
            orders: deps.orders,
            stage: Mutex::new(CheckoutStage::CartReview),
            submitting: InFlight::new(),
        }
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> CheckoutStage {
        self.stage.lock().clone()
    }

    #[must_use]
    pub fn cart(&self) -> &Arc<CartStore> {
        &self.cart
    }

    #[must_use]
    pub const fn pricing(&self) -> &PricingCalculator {
        &self.pricing
    }

    /// Whether the "checkout" action should be offered.
    #[must_use]
    pub fn checkout_enabled(&self) -> bool {
        !self.cart.is_empty() && !self.stage.lock().is_in_flight()
    }

    /// Whether the "pay" action should be offered: the checkout is at a stage
    /// that accepts payment and no payment is in flight.
    #[must_use]
    pub fn submit_enabled(&self) -> bool {
        !self.submitting.is_busy() && self.stage.lock().accepts_payment()
    }

    /// The order draft saved for the payment step, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if session storage cannot be read.
    pub fn draft(&self) -> Result<Option<OrderDraft>> {
        Ok(load_json(self.session.as_ref(), keys::ORDER_INFO)?)
    }

    /// Leave cart review for shipping entry.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`] if there is nothing to buy
    /// - [`CheckoutError::Unauthenticated`] if no shopper is signed in
    /// - [`CheckoutError::ResubmissionBlocked`] if an earlier payment is
    ///   still awaiting reconciliation
    /// - [`CheckoutError::InvalidStage`] while a payment is in flight
    ///
    /// The stage is unchanged on error.
    pub fn begin(&self, customer: Option<&Customer>) -> Result<()> {
        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if customer.is_none() {
            return Err(CheckoutError::Unauthenticated);
        }
        if let Some(err) = self.draft()?.as_ref().and_then(charge_in_doubt) {
            return Err(err);
        }

        let mut stage = self.stage.lock();
        if stage.is_in_flight() {
            return Err(CheckoutError::InvalidStage {
                action: "start checkout",
                stage: stage.name(),
            });
        }
        *stage = CheckoutStage::ShippingEntry;
        drop(stage);

        add_breadcrumb("checkout", "Checkout started", None);
        Ok(())
    }

    /// Store the shipping address and price the order.
    ///
    /// The returned draft is also saved to session storage, replacing any
    /// earlier unpaid draft. Cart adds still waiting on the catalog are
    /// cancelled first, so the priced items are final.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InvalidStage`] outside shipping or payment entry
    /// - [`CheckoutError::ResubmissionBlocked`] or
    ///   [`CheckoutError::PaymentUnresolved`] if the saved draft has a charge
    ///   against it
    /// - [`ValidationError::Shipping`] naming the fields to fix
    /// - [`CheckoutError::EmptyCart`] if the cart was emptied meanwhile
    /// - [`CheckoutError::Amount`] if the cart total overflows
    /// - [`CheckoutError::Storage`] if the draft cannot be saved
    pub fn submit_shipping(&self, form: &ShippingForm) -> Result<OrderDraft> {
        self.expect_stage("submit shipping", |stage| {
            matches!(stage, CheckoutStage::ShippingEntry | CheckoutStage::PaymentEntry)
        })?;
        if let Some(err) = self.draft()?.as_ref().and_then(charge_in_doubt) {
            return Err(err);
        }

        let shipping_info = self.cart.set_shipping_info(form)?;
        self.cart.cancel_pending();
        let order_items = self.cart.line_items();
        if order_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let totals = self.pricing.compute(&order_items)?;
        let draft = OrderDraft::new(shipping_info, order_items, totals);
        save_json(self.session.as_ref(), keys::ORDER_INFO, &draft)?;
        *self.stage.lock() = CheckoutStage::PaymentEntry;

        tracing::info!(
            draft_id = %draft.draft_id,
            total = %draft.totals.total_price,
            lines = draft.order_items.len(),
            "Order draft saved"
        );
        let total = draft.totals.total_price.to_string();
        add_breadcrumb("checkout", "Shipping submitted", Some(&[("total", total.as_str())]));
        Ok(draft)
    }

    /// Restore the stage from session storage after a reload.
    ///
    /// An unpaid draft resumes at payment entry. A draft that was paid, or
    /// whose payment attempt never recorded an outcome, resumes as a
    /// reconciliation failure. Without a draft the stage is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if session storage cannot be read.
    pub fn resume(&self) -> Result<CheckoutStage> {
        let Some(draft) = self.draft()? else {
            return Ok(self.stage());
        };

        let mut stage = self.stage.lock();
        if stage.is_in_flight() {
            return Ok(stage.clone());
        }
        *stage = match charge_in_doubt(&draft) {
            Some(err) => CheckoutStage::Failed(Failure::from(&err)),
            None => CheckoutStage::PaymentEntry,
        };
        Ok(stage.clone())
    }

    /// Return to cart review without touching the cart or the draft.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Busy`] while a payment is in flight.
    pub fn cancel(&self) -> Result<()> {
        if self.submitting.is_busy() {
            return Err(CheckoutError::Busy(Operation::PaymentConfirmation));
        }
        *self.stage.lock() = CheckoutStage::CartReview;
        Ok(())
    }

    /// Discard an unpaid draft and return to cart review.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Busy`] while a payment is in flight
    /// - [`CheckoutError::ResubmissionBlocked`] or
    ///   [`CheckoutError::PaymentUnresolved`] if the draft has a charge
    ///   against it; it is kept as the record for reconciliation
    /// - [`CheckoutError::Storage`] if session storage fails
    pub fn abandon(&self) -> Result<()> {
        if self.submitting.is_busy() {
            return Err(CheckoutError::Busy(Operation::PaymentConfirmation));
        }
        if let Some(err) = self.draft()?.as_ref().and_then(charge_in_doubt) {
            return Err(err);
        }
        self.session.remove(keys::ORDER_INFO)?;
        *self.stage.lock() = CheckoutStage::CartReview;
        Ok(())
    }

    /// Pay for the saved draft and record the order.
    ///
    /// The charge is for exactly `draft.totalPrice` in paise. On success the
    /// draft is cleared and the ordered lines are removed from the cart.
    ///
    /// # Errors
    ///
    /// Errors before the provider is contacted leave the stage unchanged:
    /// - [`CheckoutError::Unauthenticated`] if no shopper is signed in
    /// - [`ValidationError::Card`] with a message per invalid card field
    /// - [`CheckoutError::Busy`] if a payment is already in flight
    /// - [`CheckoutError::InvalidStage`] / [`CheckoutError::NoDraft`] if
    ///   shipping has not been submitted
    /// - [`CheckoutError::ResubmissionBlocked`] if the draft was already paid
    ///
    /// [`CheckoutError::CartChanged`] means the cart differs from the priced
    /// draft; the stage goes back to shipping entry so the order is priced
    /// again, and nothing is charged.
    ///
    /// Later errors move the stage to [`CheckoutStage::Failed`]:
    /// - [`CheckoutError::Storage`] if the payment attempt cannot be recorded;
    ///   the provider is not contacted
    /// - [`CheckoutError::Network`] or [`CheckoutError::PaymentDeclined`]
    ///   before money is taken; paying again is allowed
    /// - [`CheckoutError::OrderReconciliation`] after money is taken; paying
    ///   again is refused
    #[instrument(skip_all)]
    pub async fn pay(&self, customer: Option<&Customer>, card: &CardInput) -> Result<OrderReceipt> {
        let customer = customer.ok_or(CheckoutError::Unauthenticated)?;
        let card = card.validate_now().map_err(ValidationError::from)?;

        let _guard = self
            .submitting
            .try_begin()
            .ok_or(CheckoutError::Busy(Operation::PaymentConfirmation))?;

        let blocked_on = self.stage.lock().reconciliation_payment().map(str::to_string);
        if let Some(reference) = blocked_on {
            let unresolved = self.draft()?.is_some_and(|draft| {
                !draft.is_paid() && draft.payment_attempt.as_deref() == Some(reference.as_str())
            });
            return Err(if unresolved {
                CheckoutError::PaymentUnresolved { intent_id: reference }
            } else {
                CheckoutError::ResubmissionBlocked { payment_id: reference }
            });
        }
        self.expect_stage("pay", CheckoutStage::accepts_payment)?;

        let Some(draft) = self.draft()? else {
            *self.stage.lock() = CheckoutStage::CartReview;
            return Err(CheckoutError::NoDraft);
        };
        if let Some(payment) = &draft.payment_info {
            let err = CheckoutError::ResubmissionBlocked {
                payment_id: payment.id.clone(),
            };
            return Err(self.fail(err));
        }
        // A draft with an attempt on record is completed as priced, under the
        // same intent.
        if draft.payment_attempt.is_none() && draft.order_items != self.cart.line_items() {
            *self.stage.lock() = CheckoutStage::ShippingEntry;
            tracing::info!(draft_id = %draft.draft_id, "Cart changed since the order was priced");
            return Err(CheckoutError::CartChanged);
        }

        let amount = draft
            .totals
            .total_price
            .to_minor_units()
            .map_err(|e| self.fail(e.into()))?;
        *self.stage.lock() = CheckoutStage::PaymentConfirmation;
        tracing::info!(draft_id = %draft.draft_id, amount, "Starting payment");

        let receipt = self.charge_and_submit(customer, &card, draft, amount).await;
        match receipt {
            Ok(receipt) => Ok(receipt),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn charge_and_submit(
        &self,
        customer: &Customer,
        card: &ValidCard,
        mut draft: OrderDraft,
        amount: i64,
    ) -> Result<OrderReceipt> {
        let intent = self
            .intents
            .create_intent(amount, draft.draft_id)
            .await
            .map_err(|e| CheckoutError::network(Operation::PaymentIntent, e))?;
        if intent.amount != amount {
            return Err(CheckoutError::network(
                Operation::PaymentIntent,
                crate::api::ApiError::Parse(format!(
                    "intent amount {} does not match order amount {amount}",
                    intent.amount
                )),
            ));
        }

        match &draft.payment_attempt {
            Some(attempt) if *attempt != intent.id => {
                return Err(CheckoutError::PaymentUnresolved {
                    intent_id: attempt.clone(),
                });
            }
            Some(_) => tracing::info!(intent_id = %intent.id, "Confirming recorded payment intent again"),
            None => {
                draft.payment_attempt = Some(intent.id.clone());
                save_json(self.session.as_ref(), keys::ORDER_INFO, &draft)?;
            }
        }

        let billing = BillingDetails::new(customer, &draft.shipping_info);
        let outcome = self
            .provider
            .confirm(&intent, card, &billing)
            .await
            .map_err(|e| CheckoutError::network(Operation::PaymentConfirmation, e))?;

        let (payment, charged) = match outcome {
            PaymentOutcome::Succeeded { payment, amount } => (payment, amount),
            PaymentOutcome::Declined {
                message,
                decline_code,
            } => {
                draft.payment_attempt = None;
                if let Err(e) = save_json(self.session.as_ref(), keys::ORDER_INFO, &draft) {
                    tracing::warn!(intent_id = %intent.id, error = %e, "Failed to clear declined payment attempt");
                }
                add_breadcrumb("checkout", "Payment declined", None);
                return Err(CheckoutError::PaymentDeclined {
                    message,
                    decline_code,
                });
            }
        };
        tracing::info!(payment_id = %payment.id, charged, "Payment captured");

        let payment_id = payment.id.clone();
        draft.payment_info = Some(payment);
        if let Err(e) = save_json(self.session.as_ref(), keys::ORDER_INFO, &draft) {
            tracing::error!(payment_id = %payment_id, error = %e, "Failed to record captured payment on draft");
        }

        if charged != amount {
            return Err(CheckoutError::OrderReconciliation {
                payment_id,
                reason: format!("charged {charged} but order total is {amount}"),
            });
        }

        *self.stage.lock() = CheckoutStage::OrderSubmission;
        let receipt = self.orders.create_order(&draft).await.map_err(|e| {
            CheckoutError::OrderReconciliation {
                payment_id: payment_id.clone(),
                reason: e.to_string(),
            }
        })?;

        self.finish(&draft, &receipt);
        Ok(receipt)
    }

    /// Remove the ordered lines from the cart and clear the draft after the
    /// order is recorded.
    ///
    /// The order exists at this point, so cleanup failures are logged and
    /// do not fail the checkout.
    fn finish(&self, draft: &OrderDraft, receipt: &OrderReceipt) {
        match self.cart.remove_ordered(&draft.order_items) {
            Ok(kept) if !kept.is_empty() => tracing::warn!(
                order_id = %receipt.order_id,
                kept = kept.len(),
                "Cart changed during payment; unordered lines kept"
            ),
            Ok(_) => {}
            Err(e) => {
                tracing::error!(order_id = %receipt.order_id, error = %e, "Failed to clear cart after order");
            }
        }
        if let Err(e) = self.session.remove(keys::ORDER_INFO) {
            tracing::error!(order_id = %receipt.order_id, error = %e, "Failed to clear order draft");
        }
        *self.stage.lock() = CheckoutStage::Success {
            order_id: receipt.order_id.clone(),
        };

        tracing::info!(order_id = %receipt.order_id, "Order placed");
        add_breadcrumb(
            "checkout",
            "Order placed",
            Some(&[("order_id", receipt.order_id.as_str())]),
        );
    }

    /// Move to `Failed` and hand the error back.
    fn fail(&self, err: CheckoutError) -> CheckoutError {
        *self.stage.lock() = CheckoutStage::Failed(Failure::from(&err));
        err
    }

    fn expect_stage(&self, action: &'static str, allowed: impl Fn(&CheckoutStage) -> bool) -> Result<()> {
        let stage = self.stage.lock();
        if allowed(&stage) {
            Ok(())
        } else {
            Err(CheckoutError::InvalidStage {
                action,
                stage: stage.name(),
            })
        }
    }
}

/// The error for a draft that has been charged, or may have been.
fn charge_in_doubt(draft: &OrderDraft) -> Option<CheckoutError> {
    if let Some(payment) = &draft.payment_info {
        return Some(CheckoutError::ResubmissionBlocked {
            payment_id: payment.id.clone(),
        });
    }
    draft
        .payment_attempt
        .as_ref()
        .map(|intent_id| CheckoutError::PaymentUnresolved {
            intent_id: intent_id.clone(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use hekto_core::{Email, OrderId, OrderStatus, Price, ProductId, UserId};

    use super::*;
    use crate::api::ApiError;
    use crate::cart::AddItemRequest;
    use crate::catalog::{Catalog, CatalogProduct};
    use crate::payment::{TestModeIntents, TestModeProvider};
    use crate::storage::{MemoryStore, StorageError};

    /// Session store that can be told to refuse writes after a number of
    /// successful ones.
    #[derive(Default)]
    struct SessionStore {
        inner: MemoryStore,
        writes_left: Mutex<Option<usize>>,
    }

    impl SessionStore {
        fn allow_writes(&self, count: Option<usize>) {
            *self.writes_left.lock() = count;
        }
    }

    impl KeyValueStore for SessionStore {
        fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
            let mut writes_left = self.writes_left.lock();
            match writes_left.as_mut() {
                Some(0) => {
                    return Err(StorageError::Io {
                        key: key.to_string(),
                        source: std::io::Error::other("quota exceeded"),
                    });
                }
                Some(n) => *n -= 1,
                None => {}
            }
            drop(writes_left);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> std::result::Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    struct OneProduct;

    #[async_trait]
    impl Catalog for OneProduct {
        async fn product(&self, _slug: &str, id: &ProductId) -> std::result::Result<CatalogProduct, ApiError> {
            Ok(CatalogProduct {
                id: id.clone(),
                name: "Cantilever Chair".to_string(),
                price: Price::from_major(1200),
                stock: 5,
                images: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingOrders {
        fail: bool,
        submitted: Mutex<Vec<OrderDraft>>,
    }

    #[async_trait]
    impl OrderService for RecordingOrders {
        async fn create_order(&self, order: &OrderDraft) -> std::result::Result<OrderReceipt, ApiError> {
            self.submitted.lock().push(order.clone());
            if self.fail {
                return Err(ApiError::Unavailable("orders down".to_string()));
            }
            Ok(OrderReceipt {
                order_id: OrderId::new("ord_1"),
                status: OrderStatus::Processing,
            })
        }
    }

    struct Harness {
        checkout: Checkout,
        session: Arc<SessionStore>,
        orders: Arc<RecordingOrders>,
    }

    async fn harness(orders: RecordingOrders) -> Harness {
        let cart = Arc::new(CartStore::new(Arc::new(MemoryStore::new()), Arc::new(OneProduct)));
        cart.add_item(chair("p1")).await.unwrap();

        let session = Arc::new(SessionStore::default());
        let orders = Arc::new(orders);
        let checkout = Checkout::new(CheckoutDeps {
            cart,
            pricing: PricingCalculator::default(),
            session: session.clone(),
            intents: Arc::new(TestModeIntents::new()),
            provider: Arc::new(TestModeProvider::new(Duration::ZERO)),
            orders: orders.clone(),
        });
        Harness {
            checkout,
            session,
            orders,
        }
    }

    fn customer() -> Customer {
        Customer {
            id: UserId::new("u1"),
            name: "Meera Iyer".to_string(),
            email: Email::parse("meera@example.in").unwrap(),
        }
    }

    fn shipping() -> ShippingForm {
        ShippingForm {
            address: "4 Anna Salai".to_string(),
            city: "Chennai".to_string(),
            state: "Tamil Nadu".to_string(),
            pin_code: "600002".to_string(),
            phone_number: "9444012345".to_string(),
            landmark: None,
        }
    }

    fn card(number: &str) -> CardInput {
        CardInput {
            number: number.to_string(),
            expiry: "12/40".to_string(),
            cvc: "123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_begin_requires_customer() {
        let h = harness(RecordingOrders::default()).await;
        assert!(matches!(
            h.checkout.begin(None),
            Err(CheckoutError::Unauthenticated)
        ));
        assert_eq!(h.checkout.stage(), CheckoutStage::CartReview);
    }

    #[tokio::test]
    async fn test_submit_shipping_saves_priced_draft() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        let draft = h.checkout.submit_shipping(&shipping()).unwrap();

        assert_eq!(draft.totals.items_price, Price::from_major(1200));
        assert_eq!(draft.totals.shipping_price, Price::from_major(100));
        assert_eq!(draft.totals.tax_price, Price::from_major(216));
        assert_eq!(draft.totals.total_price, Price::from_major(1516));
        assert_eq!(h.checkout.stage(), CheckoutStage::PaymentEntry);
        assert_eq!(h.checkout.draft().unwrap(), Some(draft));
        assert!(h.checkout.submit_enabled());
    }

    #[tokio::test]
    async fn test_invalid_shipping_stays_in_shipping_entry() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        let err = h
            .checkout
            .submit_shipping(&ShippingForm {
                city: String::new(),
                ..shipping()
            })
            .unwrap_err();

        assert_eq!(err.surface(), crate::error::ErrorSurface::Fields);
        assert_eq!(h.checkout.stage(), CheckoutStage::ShippingEntry);
        assert!(!h.session.contains(keys::ORDER_INFO).unwrap());
    }

    #[tokio::test]
    async fn test_pay_before_shipping_is_refused() {
        let h = harness(RecordingOrders::default()).await;
        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidStage { .. }));
    }

    #[tokio::test]
    async fn test_invalid_card_does_not_change_stage() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424241"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::Card(ref fields)) if fields.card.is_some()
        ));
        assert_eq!(h.checkout.stage(), CheckoutStage::PaymentEntry);
    }

    #[tokio::test]
    async fn test_successful_payment_places_order() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        let draft = h.checkout.submit_shipping(&shipping()).unwrap();

        let receipt = h
            .checkout
            .pay(Some(&customer()), &card("4242 4242 4242 4242"))
            .await
            .unwrap();

        assert_eq!(receipt.order_id.as_str(), "ord_1");
        let submitted = h.orders.submitted.lock();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].totals, draft.totals);
        assert!(submitted[0].payment_info.as_ref().unwrap().id.starts_with("test_pi_"));
        drop(submitted);

        assert!(h.checkout.cart().is_empty());
        assert!(!h.session.contains(keys::ORDER_INFO).unwrap());
        assert!(matches!(h.checkout.stage(), CheckoutStage::Success { .. }));
    }

    #[tokio::test]
    async fn test_order_failure_requires_reconciliation() {
        let h = harness(RecordingOrders {
            fail: true,
            ..RecordingOrders::default()
        })
        .await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderReconciliation { .. }));
        assert!(!h.checkout.cart().is_empty());
        assert!(h.checkout.draft().unwrap().unwrap().is_paid());
        assert!(!h.checkout.submit_enabled());

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ResubmissionBlocked { .. }));
        assert_eq!(h.orders.submitted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_after_reload() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();

        // A fresh orchestrator over the same session store.
        let reloaded = Checkout::new(CheckoutDeps {
            cart: h.checkout.cart().clone(),
            pricing: PricingCalculator::default(),
            session: h.session.clone(),
            intents: Arc::new(TestModeIntents::new()),
            provider: Arc::new(TestModeProvider::default()),
            orders: h.orders.clone(),
        });
        assert_eq!(reloaded.resume().unwrap(), CheckoutStage::PaymentEntry);
    }

    fn reload(h: &Harness) -> Checkout {
        Checkout::new(CheckoutDeps {
            cart: h.checkout.cart().clone(),
            pricing: PricingCalculator::default(),
            session: h.session.clone(),
            intents: Arc::new(TestModeIntents::new()),
            provider: Arc::new(TestModeProvider::default()),
            orders: h.orders.clone(),
        })
    }

    #[tokio::test]
    async fn test_pay_refuses_draft_when_cart_changed() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        let priced = h.checkout.submit_shipping(&shipping()).unwrap();
        h.checkout.cart().add_item(chair("p2")).await.unwrap();

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::CartChanged));
        assert_eq!(h.checkout.stage(), CheckoutStage::ShippingEntry);
        assert!(h.orders.submitted.lock().is_empty());
        assert_eq!(h.checkout.draft().unwrap(), Some(priced));
        assert_eq!(h.checkout.cart().line_items().len(), 2);

        // Pricing again picks up both lines and the order goes through.
        let repriced = h.checkout.submit_shipping(&shipping()).unwrap();
        assert_eq!(repriced.order_items.len(), 2);
        assert_eq!(repriced.totals.total_price, Price::from_major(2932));
        h.checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap();
        assert_eq!(h.orders.submitted.lock()[0].order_items.len(), 2);
        assert!(h.checkout.cart().is_empty());
    }

    #[tokio::test]
    async fn test_attempt_not_recorded_means_no_charge() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();
        h.session.allow_writes(Some(0));

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Storage(_)));
        assert!(h.orders.submitted.lock().is_empty());
        let draft = h.checkout.draft().unwrap().unwrap();
        assert_eq!(draft.payment_attempt, None);
        assert!(!draft.is_paid());

        // Nothing was charged, so paying again is allowed once storage recovers.
        assert!(h.checkout.submit_enabled());
        h.session.allow_writes(None);
        h.checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap();
        assert_eq!(h.orders.submitted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unrecorded_capture_blocks_payment_after_reload() {
        let h = harness(RecordingOrders {
            fail: true,
            ..RecordingOrders::default()
        })
        .await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();
        // The attempt is recorded; recording the captured payment fails.
        h.session.allow_writes(Some(1));

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderReconciliation { .. }));
        let draft = h.checkout.draft().unwrap().unwrap();
        assert!(!draft.is_paid());
        let intent_id = draft.payment_attempt.clone().unwrap();

        let reloaded = reload(&h);
        let stage = reloaded.resume().unwrap();
        assert_eq!(stage.reconciliation_payment(), Some(intent_id.as_str()));
        assert!(!reloaded.submit_enabled());

        let err = reloaded
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentUnresolved { intent_id: ref id } if *id == intent_id));
        assert!(matches!(
            reloaded.begin(Some(&customer())),
            Err(CheckoutError::PaymentUnresolved { .. })
        ));
        assert!(matches!(
            reloaded.abandon(),
            Err(CheckoutError::PaymentUnresolved { .. })
        ));
        assert!(reloaded.draft().unwrap().is_some());
        assert_eq!(h.orders.submitted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_decline_clears_payment_attempt() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();

        let err = h
            .checkout
            .pay(Some(&customer()), &card("4000000000000002"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentDeclined { .. }));
        assert_eq!(h.checkout.draft().unwrap().unwrap().payment_attempt, None);
        assert_eq!(reload(&h).resume().unwrap(), CheckoutStage::PaymentEntry);
    }

    /// Holds each catalog lookup until released.
    struct HeldCatalog(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl Catalog for HeldCatalog {
        async fn product(&self, slug: &str, id: &ProductId) -> std::result::Result<CatalogProduct, ApiError> {
            self.0.notified().await;
            OneProduct.product(slug, id).await
        }
    }

    fn chair(id: &str) -> AddItemRequest {
        AddItemRequest {
            product_id: ProductId::new(id),
            name: "Cantilever Chair".to_string(),
            unit_price: Price::from_major(1200),
            quantity: 1,
            image_url: String::new(),
            available_stock: 5,
        }
    }

    #[tokio::test]
    async fn test_submit_shipping_cancels_pending_add() {
        let h = harness(RecordingOrders::default()).await;
        let gate = Arc::new(tokio::sync::Notify::new());
        let cart = Arc::new(CartStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HeldCatalog(gate.clone())),
        ));
        let checkout = Checkout::new(CheckoutDeps {
            cart: cart.clone(),
            pricing: PricingCalculator::default(),
            session: h.session.clone(),
            intents: Arc::new(TestModeIntents::new()),
            provider: Arc::new(TestModeProvider::new(Duration::ZERO)),
            orders: h.orders.clone(),
        });

        gate.notify_one();
        cart.add_item(chair("p1")).await.unwrap();
        checkout.begin(Some(&customer())).unwrap();

        let pending = tokio::spawn({
            let cart = cart.clone();
            async move { cart.add_item(chair("p2")).await }
        });
        while !cart.is_busy() {
            tokio::task::yield_now().await;
        }

        let draft = checkout.submit_shipping(&shipping()).unwrap();
        gate.notify_one();

        assert!(matches!(pending.await.unwrap(), Err(CheckoutError::Cancelled)));
        assert_eq!(draft.order_items, cart.line_items());
        checkout
            .pay(Some(&customer()), &card("4242424242424242"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_abandon_removes_unpaid_draft() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();

        h.checkout.abandon().unwrap();
        assert_eq!(h.checkout.stage(), CheckoutStage::CartReview);
        assert_eq!(h.checkout.draft().unwrap(), None);
        assert!(!h.checkout.cart().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_keeps_draft() {
        let h = harness(RecordingOrders::default()).await;
        h.checkout.begin(Some(&customer())).unwrap();
        h.checkout.submit_shipping(&shipping()).unwrap();

        h.checkout.cancel().unwrap();
        assert_eq!(h.checkout.stage(), CheckoutStage::CartReview);
        assert!(h.checkout.draft().unwrap().is_some());
    }
}
