//! Product catalog collaborator.
//!
//! The cart never trusts client-supplied prices: every add or quantity change
//! re-reads the product from the catalog and stores the catalog's name,
//! price, stock and primary image.

use async_trait::async_trait;
use hekto_core::{Price, ProductId};
use serde::Deserialize;

use crate::api::ApiError;

/// Product image reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogImage {
    pub url: String,
}

/// Authoritative product data as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogProduct {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<CatalogImage>,
}

impl CatalogProduct {
    /// URL of the first image, or an empty string when the product has none.
    #[must_use]
    pub fn primary_image(&self) -> &str {
        self.images.first().map_or("", |image| image.url.as_str())
    }
}

/// Look up products by `(slug, id)`.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch the current catalog record for a product.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the catalog cannot be reached or the product
    /// does not exist.
    async fn product(&self, slug: &str, id: &ProductId) -> Result<CatalogProduct, ApiError>;
}
