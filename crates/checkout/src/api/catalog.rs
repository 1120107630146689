//! Catalog lookups against the backend.

use async_trait::async_trait;
use hekto_core::ProductId;
use serde::Deserialize;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::catalog::{Catalog, CatalogProduct};

#[derive(Debug, Deserialize)]
struct ProductResponse {
    product: CatalogProduct,
}

#[async_trait]
impl Catalog for ApiClient {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, slug: &str, id: &ProductId) -> Result<CatalogProduct, ApiError> {
        let mut url = self.endpoint("api/v1/product/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Config("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(slug)
            .push(id.as_str());

        let response: ProductResponse = self.send(self.inner.client.get(url)).await?;
        tracing::debug!(price = %response.product.price, stock = response.product.stock, "Fetched product");
        Ok(response.product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_response() {
        let body = r#"{
            "success": true,
            "product": {
                "_id": "64f1a2b3c4d5e6f708091011",
                "name": "Comfy Handy Craft",
                "price": 1200,
                "stock": 7,
                "ratings": 4.5,
                "images": [{ "public_id": "products/a", "url": "https://cdn.example.in/a.png" }]
            }
        }"#;
        let response: ProductResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.product.id.as_str(), "64f1a2b3c4d5e6f708091011");
        assert_eq!(response.product.price, hekto_core::Price::from_major(1200));
        assert_eq!(response.product.stock, 7);
        assert_eq!(response.product.primary_image(), "https://cdn.example.in/a.png");
    }

    #[test]
    fn test_parse_rejects_negative_price() {
        let body = r#"{ "product": { "_id": "x", "name": "Bad", "price": -1, "stock": 1 } }"#;
        assert!(serde_json::from_str::<ProductResponse>(body).is_err());
    }
}
