//! Mercado checkout
//!
//! Pricing and checkout core of a multi-vendor marketplace in Ecuador.
//!
//! ## Features
//! - Seller and volume discounts per line
//! - Free-shipping threshold and flat-rate shipping
//! - IVA (15%) on the discounted subtotal plus shipping
//! - Datafast synchronous checkout and DeUna payment webhooks, priced by one calculator
//! - Order reconciliation between payment flows

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod error;
pub mod publisher;
pub mod store;

pub use checkout::{CheckoutService, DatafastCheckout, DeunaWebhookHandler, WebhookOutcome};
pub use config::AppConfig;
pub use domain::pricing::{PriceBreakdown, PricingCalculator, PricingConfig};
pub use error::{EcommerceError, Result};
