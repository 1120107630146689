//! Order creation collaborator.

use async_trait::async_trait;
use hekto_core::{OrderDraft, OrderId, OrderStatus};

use crate::api::ApiError;

/// Confirmation that the backend recorded an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Persist paid orders.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Record an order for a draft that carries `payment_info`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the order could not be recorded. Callers must
    /// treat this as distinct from a payment failure: by the time an order
    /// is submitted the shopper has already been charged.
    async fn create_order(&self, order: &OrderDraft) -> Result<OrderReceipt, ApiError>;
}
