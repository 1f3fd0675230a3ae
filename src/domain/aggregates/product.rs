//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Sku, Money, Percentage, Quantity};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    seller_id: Uuid,
    sku: Sku,
    name: String,
    price: Money,
    discount_percentage: Percentage,
    stock: Quantity,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "draft" => Ok(Self::Draft), "active" => Ok(Self::Active), "archived" => Ok(Self::Archived), other => Err(ProductError::UnknownStatus(other.to_string())) }
    }
}

impl Product {
    pub fn create(seller_id: Uuid, sku: Sku, name: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), seller_id, sku, name: name.into(), price,
            discount_percentage: Percentage::ZERO, stock: Quantity::default(),
            status: ProductStatus::Draft, created_at: now, updated_at: now,
        }
    }

    /// Rebuild a product loaded from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(id: Uuid, seller_id: Uuid, sku: Sku, name: String, price: Money, discount_percentage: Percentage, stock: Quantity, status: ProductStatus, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, seller_id, sku, name, price, discount_percentage, stock, status, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn seller_id(&self) -> Uuid { self.seller_id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> &Money { &self.price }
    pub fn discount_percentage(&self) -> Percentage { self.discount_percentage }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active }
    pub fn has_stock_for(&self, qty: u32) -> bool { self.stock.value() >= qty }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        Ok(())
    }

    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    /// Seller-configured discount on this product.
    pub fn set_discount(&mut self, pct: Percentage) { self.discount_percentage = pct; self.touch(); }

    pub fn add_stock(&mut self, qty: u32) { self.stock = self.stock.add(qty); self.touch(); }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientInventory)?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, InsufficientInventory, UnknownStatus(String) }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::InsufficientInventory => write!(f, "Insufficient inventory"),
            Self::UnknownStatus(s) => write!(f, "Unknown product status: {}", s),
        }
    }
}
