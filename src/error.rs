use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{CartError, OrderError};
use crate::domain::pricing::PricingError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Seller not found: {0}")]
    SellerNotFound(Uuid),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cart not found: {0}")]
    CartNotFound(Uuid),

    #[error("Cart {0} was already checked out")]
    CartAlreadyCheckedOut(Uuid),

    #[error("Cart has no items")]
    EmptyCart,

    #[error("Cart has no customer")]
    MissingCustomer,

    #[error("Product {0} is not available for sale")]
    ProductUnavailable(Uuid),

    #[error("Insufficient inventory for product {0}")]
    InsufficientInventory(Uuid),

    #[error("Discount code {code} rejected: {reason}")]
    InvalidDiscountCode { code: String, reason: String },

    #[error("Payment declined ({code}): {description}")]
    PaymentDeclined { code: String, description: String },

    #[error("Paid amount {received} does not match order total {expected}")]
    PaymentAmountMismatch { expected: Decimal, received: Decimal },

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(StoreError),
}

impl From<StoreError> for EcommerceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientStock(id) => Self::InsufficientInventory(id),
            StoreError::CartConsumed(id) => Self::CartAlreadyCheckedOut(id),
            StoreError::DiscountCodeExhausted(code) => Self::InvalidDiscountCode { code, reason: "usage limit reached".into() },
            other => Self::StorageError(other),
        }
    }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
