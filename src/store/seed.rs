use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::domain::aggregates::{DiscountCode, Product, ProductStatus, Seller};
use crate::domain::value_objects::{Money, Percentage, Quantity, Sku};
use crate::error::{EcommerceError, Result};

/// Catalog loaded from a JSON file (`CATALOG_SEED`) into the in-memory store.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub sellers: Vec<Seller>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
    #[serde(default)]
    pub discount_codes: Vec<DiscountCode>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub id: Option<Uuid>,
    pub seller_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub discount_percentage: Percentage,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_status")]
    pub status: ProductStatus,
}

fn default_currency() -> String { "USD".to_string() }
fn default_status() -> ProductStatus { ProductStatus::Active }

impl CatalogSeed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EcommerceError::Config(format!("cannot read {}: {}", path.as_ref().display(), e)))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl ProductSeed {
    pub fn into_product(self) -> Result<Product> {
        let sku = Sku::new(self.sku).map_err(|e| EcommerceError::Validation(e.to_string()))?;
        let now = Utc::now();
        Ok(Product::restore(
            self.id.unwrap_or_else(Uuid::now_v7), self.seller_id, sku, self.name,
            Money::new(self.price, &self.currency), self.discount_percentage, Quantity::new(self.stock),
            self.status, now, now,
        ))
    }
}
