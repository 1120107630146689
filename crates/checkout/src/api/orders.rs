//! Order creation against the backend.

use async_trait::async_trait;
use hekto_core::{
    CartLineItem, OrderDraft, OrderId, OrderStatus, PaymentInfo, Price, ShippingInfo,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::orders::{OrderReceipt, OrderService};

/// Request body for `POST /api/v1/order/new`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewOrderRequest<'a> {
    shipping_info: &'a ShippingInfo,
    order_items: &'a [CartLineItem],
    items_price: Price,
    tax_price: Price,
    shipping_price: Price,
    total_price: Price,
    payment_info: &'a PaymentInfo,
}

#[derive(Debug, Deserialize)]
struct NewOrderResponse {
    order: CreatedOrder,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedOrder {
    #[serde(rename = "_id")]
    id: OrderId,
    #[serde(default)]
    order_status: OrderStatus,
}

impl<'a> NewOrderRequest<'a> {
    fn from_draft(draft: &'a OrderDraft) -> Result<Self, ApiError> {
        let payment_info = draft
            .payment_info
            .as_ref()
            .ok_or_else(|| ApiError::Config("order draft has no payment info".to_string()))?;
        Ok(Self {
            shipping_info: &draft.shipping_info,
            order_items: &draft.order_items,
            items_price: draft.totals.items_price,
            tax_price: draft.totals.tax_price,
            shipping_price: draft.totals.shipping_price,
            total_price: draft.totals.total_price,
            payment_info,
        })
    }
}

#[async_trait]
impl OrderService for ApiClient {
    #[instrument(skip(self, order), fields(draft_id = %order.draft_id, total = %order.totals.total_price))]
    async fn create_order(&self, order: &OrderDraft) -> Result<OrderReceipt, ApiError> {
        let body = NewOrderRequest::from_draft(order)?;
        let url = self.endpoint("api/v1/order/new")?;

        let response: NewOrderResponse = self
            .send(self.inner.client.post(url).json(&body))
            .await?;

        tracing::info!(order_id = %response.order.id, "Order recorded");
        Ok(OrderReceipt {
            order_id: response.order.id,
            status: response.order.order_status,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hekto_core::{PaymentStatus, ShippingForm, Totals};

    use super::*;

    fn draft() -> OrderDraft {
        let shipping = ShippingForm {
            address: "221B Linking Road".to_string(),
            city: "Mumbai".to_string(),
            state: "Maharashtra".to_string(),
            pin_code: "400050".to_string(),
            phone_number: "9820098200".to_string(),
            landmark: Some("Near the station".to_string()),
        }
        .validate()
        .unwrap();
        OrderDraft::new(
            shipping,
            vec![],
            Totals {
                items_price: Price::from_major(2200),
                shipping_price: Price::from_major(100),
                tax_price: Price::from_major(396),
                total_price: Price::from_major(2696),
            },
        )
    }

    #[test]
    fn test_request_requires_payment_info() {
        let draft = draft();
        assert!(matches!(
            NewOrderRequest::from_draft(&draft),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let mut draft = draft();
        draft.payment_info = Some(PaymentInfo {
            id: "pi_3Nabc".to_string(),
            status: PaymentStatus::Succeeded,
        });
        let json = serde_json::to_value(NewOrderRequest::from_draft(&draft).unwrap()).unwrap();

        assert_eq!(json["itemsPrice"], "2200");
        assert_eq!(json["totalPrice"], "2696");
        assert_eq!(json["paymentInfo"]["status"], "succeeded");
        assert_eq!(json["shippingInfo"]["landmark"], "Near the station");
        assert!(json.get("draftId").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{ "success": true, "order": { "_id": "650000000000000000000001", "orderStatus": "Processing" } }"#;
        let response: NewOrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.order.id.as_str(), "650000000000000000000001");
        assert_eq!(response.order.order_status, OrderStatus::Processing);
    }
}
