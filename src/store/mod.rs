//! Persistence ports and their adapters.
//!
//! Checkout only talks to the traits below; `MemoryStore` backs tests and
//! local runs, `PgStore` backs production.

mod memory;
mod postgres;
mod seed;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use seed::{CatalogSeed, ProductSeed};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, DiscountCode, Order, PaymentGateway, Product, Seller};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(Uuid),

    #[error("Payment {reference} already recorded for {gateway:?}")]
    DuplicatePayment { gateway: PaymentGateway, reference: String },

    #[error("Cart {0} was already checked out")]
    CartConsumed(Uuid),

    #[error("Discount code {0} can no longer be redeemed")]
    DiscountCodeExhausted(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>>;
    async fn discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn cart(&self, id: Uuid) -> StoreResult<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> StoreResult<()>;
    async fn delete_cart(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn next_order_number(&self) -> StoreResult<u64>;

    /// Persists the order with its items, consumes the cart it was paid
    /// from, takes the ordered quantities out of stock and counts the
    /// discount-code use. All or nothing: a cart yields at most one order.
    async fn commit_order(&self, cart_id: Uuid, order: &Order) -> StoreResult<()>;

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn order_by_payment(&self, gateway: PaymentGateway, reference: &str) -> StoreResult<Option<Order>>;

    /// Newest first, `page` starting at 1. Returns the page and the total count.
    async fn orders(&self, page: u32, per_page: u32) -> StoreResult<(Vec<Order>, u64)>;
}

pub trait Store: CatalogRepository + CartRepository + OrderRepository {}
impl<T: CatalogRepository + CartRepository + OrderRepository> Store for T {}
