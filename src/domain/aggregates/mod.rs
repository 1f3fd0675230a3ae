//! Aggregates module
pub mod product;
pub mod seller;
pub mod cart;
pub mod discount_code;
pub mod order;

pub use product::{Product, ProductError, ProductStatus};
pub use seller::Seller;
pub use cart::{Cart, CartError, CartItem, MAX_LINE_QUANTITY};
pub use discount_code::{DiscountCode, DiscountCodeError};
pub use order::{Order, OrderError, OrderItem, OrderStatus, PaymentGateway, PaymentStatus};
