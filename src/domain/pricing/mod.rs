//! Order pricing: seller and volume discounts, free-shipping threshold, IVA.
//!
//! Both payment flows (Datafast checkout and the DeUna webhook) price orders
//! exclusively through [`PricingCalculator`], so the same cart always yields
//! the same [`PriceBreakdown`].

mod calculator;

pub use calculator::PricingCalculator;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{round_money, Money, Percentage};

/// Quantity tier configured by a seller: buying at least `min_quantity`
/// units of one product earns `discount`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTier {
    pub min_quantity: u32,
    pub discount: Percentage,
}

/// Discount of the highest tier whose threshold the quantity reaches. A
/// tier at `min_quantity == 0` therefore applies to every line of the seller.
pub fn volume_discount_for(tiers: &[VolumeTier], quantity: u32) -> Percentage {
    tiers
        .iter()
        .filter(|t| t.min_quantity <= quantity)
        .max_by_key(|t| t.min_quantity)
        .map(|t| t.discount)
        .unwrap_or(Percentage::ZERO)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingConfig {
    pub free_shipping_enabled: bool,
    pub free_shipping_threshold: Decimal,
    pub flat_rate: Decimal,
}

impl ShippingConfig {
    /// Shipping charged for an order whose discounted item subtotal is `subtotal`.
    pub fn cost_for(&self, subtotal: Decimal) -> Decimal {
        if self.qualifies_for_free_shipping(subtotal) { Decimal::ZERO } else { self.flat_rate }
    }

    pub fn qualifies_for_free_shipping(&self, subtotal: Decimal) -> bool {
        self.free_shipping_enabled && subtotal >= self.free_shipping_threshold
    }
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self { free_shipping_enabled: true, free_shipping_threshold: Decimal::new(5000, 2), flat_rate: Decimal::new(500, 2) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub iva_rate: Percentage,
    pub shipping: ShippingConfig,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { iva_rate: Percentage::new(Decimal::from(15)).unwrap_or_default(), shipping: ShippingConfig::default(), currency: "USD".to_string() }
    }
}

/// One cart line resolved against the catalog, ready to be priced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingLine {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub seller_discount: Percentage,
    pub volume_tiers: Vec<VolumeTier>,
}

/// Order-level discount code already checked for validity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub percentage: Percentage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBreakdown {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub gross: Decimal,
    pub seller_discount_pct: Percentage,
    pub seller_discount_amount: Decimal,
    pub volume_discount_pct: Percentage,
    pub volume_discount_amount: Decimal,
    pub discount_amount: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub currency: String,
    pub items: Vec<ItemBreakdown>,
    pub gross_subtotal: Decimal,
    pub items_discount: Decimal,
    pub subtotal: Decimal,
    pub coupon: Option<AppliedCoupon>,
    pub coupon_discount: Decimal,
    pub free_shipping: bool,
    pub shipping: Decimal,
    pub taxable_base: Decimal,
    pub iva_rate: Percentage,
    pub iva: Decimal,
    pub total: Decimal,
}

/// Amounts Datafast expects alongside the charge (`SHOPPER_VAL_BASE0`,
/// `SHOPPER_VAL_BASEIMP`, `SHOPPER_VAL_IVA`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatafastAmounts {
    pub base0: Decimal,
    pub base_imp: Decimal,
    pub iva: Decimal,
    pub amount: Decimal,
}

impl PriceBreakdown {
    /// Discounted line totals per seller, ordered by seller id.
    pub fn seller_subtotals(&self) -> BTreeMap<Uuid, Decimal> {
        let mut out = BTreeMap::new();
        for item in &self.items {
            *out.entry(item.seller_id).or_insert(Decimal::ZERO) += item.line_total;
        }
        out
    }

    /// Every priced item carries IVA, so the zero-rated base is always 0.00.
    pub fn datafast_amounts(&self) -> DatafastAmounts {
        DatafastAmounts {
            base0: round_money(Decimal::ZERO),
            base_imp: round_money(self.taxable_base),
            iva: round_money(self.iva),
            amount: round_money(self.total),
        }
    }

    pub fn total_discount(&self) -> Decimal { self.items_discount + self.coupon_discount }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("Cart has no items")]
    EmptyCart,

    #[error("Invalid quantity for product {0}")]
    InvalidQuantity(Uuid),

    #[error("Negative price for product {0}")]
    NegativePrice(Uuid),

    #[error("Currency mismatch for product {product_id}: expected {expected}, got {actual}")]
    CurrencyMismatch { product_id: Uuid, expected: String, actual: String },

    #[error("Invalid shipping configuration: {0}")]
    InvalidShipping(String),
}
