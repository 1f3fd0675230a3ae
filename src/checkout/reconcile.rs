//! Field-by-field comparison of two orders' stored pricing.
//!
//! Orders placed through different gateways for the same cart must carry the
//! same breakdown; any difference here is a pricing bug, not a payment one.

use serde::Serialize;
use std::fmt::Display;

use crate::domain::aggregates::Order;
use crate::domain::pricing::PriceBreakdown;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub field: String,
    pub left: String,
    pub right: String,
}

pub fn reconcile(a: &Order, b: &Order) -> Vec<Discrepancy> {
    reconcile_breakdowns(a.breakdown(), b.breakdown())
}

pub fn reconcile_breakdowns(a: &PriceBreakdown, b: &PriceBreakdown) -> Vec<Discrepancy> {
    let mut out = Vec::new();

    check(&mut out, "currency", &a.currency, &b.currency);
    check(&mut out, "gross_subtotal", a.gross_subtotal, b.gross_subtotal);
    check(&mut out, "items_discount", a.items_discount, b.items_discount);
    check(&mut out, "subtotal", a.subtotal, b.subtotal);
    check(&mut out, "coupon", coupon_label(a), coupon_label(b));
    check(&mut out, "coupon_discount", a.coupon_discount, b.coupon_discount);
    check(&mut out, "free_shipping", a.free_shipping, b.free_shipping);
    check(&mut out, "shipping", a.shipping, b.shipping);
    check(&mut out, "taxable_base", a.taxable_base, b.taxable_base);
    check(&mut out, "iva_rate", a.iva_rate, b.iva_rate);
    check(&mut out, "iva", a.iva, b.iva);
    check(&mut out, "total", a.total, b.total);

    check(&mut out, "items.len", a.items.len(), b.items.len());
    for (i, (l, r)) in a.items.iter().zip(&b.items).enumerate() {
        let field = |name: &str| format!("items[{}].{}", i, name);
        check(&mut out, &field("product_id"), l.product_id, r.product_id);
        check(&mut out, &field("seller_id"), l.seller_id, r.seller_id);
        check(&mut out, &field("sku"), &l.sku, &r.sku);
        check(&mut out, &field("quantity"), l.quantity, r.quantity);
        check(&mut out, &field("unit_price"), l.unit_price, r.unit_price);
        check(&mut out, &field("gross"), l.gross, r.gross);
        check(&mut out, &field("seller_discount_pct"), l.seller_discount_pct, r.seller_discount_pct);
        check(&mut out, &field("seller_discount_amount"), l.seller_discount_amount, r.seller_discount_amount);
        check(&mut out, &field("volume_discount_pct"), l.volume_discount_pct, r.volume_discount_pct);
        check(&mut out, &field("volume_discount_amount"), l.volume_discount_amount, r.volume_discount_amount);
        check(&mut out, &field("discount_amount"), l.discount_amount, r.discount_amount);
        check(&mut out, &field("line_total"), l.line_total, r.line_total);
    }
    out
}

fn check<T: PartialEq + Display>(out: &mut Vec<Discrepancy>, field: &str, left: T, right: T) {
    if left != right {
        out.push(Discrepancy { field: field.to_string(), left: left.to_string(), right: right.to_string() });
    }
}

fn coupon_label(b: &PriceBreakdown) -> String {
    b.coupon.as_ref().map(|c| format!("{} ({})", c.code, c.percentage)).unwrap_or_else(|| "none".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{AppliedCoupon, PricingCalculator, PricingLine};
    use crate::domain::value_objects::{Money, Percentage};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn breakdown(qty: u32) -> PriceBreakdown {
        let line = PricingLine {
            product_id: Uuid::from_u128(7), seller_id: Uuid::from_u128(1), name: "Chocolate".into(), sku: "CHO-1".into(),
            unit_price: Money::usd(dec!(4.20)), quantity: qty, seller_discount: Percentage::ZERO, volume_tiers: vec![],
        };
        PricingCalculator::default().calculate(&[line], None).unwrap()
    }

    #[test]
    fn test_identical_breakdowns_reconcile() {
        assert!(reconcile_breakdowns(&breakdown(3), &breakdown(3)).is_empty());
    }

    #[test]
    fn test_reports_each_differing_field() {
        let diffs = reconcile_breakdowns(&breakdown(3), &breakdown(4));
        let fields: Vec<_> = diffs.iter().map(|d| d.field.as_str()).collect();
        assert!(fields.contains(&"total"));
        assert!(fields.contains(&"items[0].quantity"));
        assert!(!fields.contains(&"shipping"));
        let total = diffs.iter().find(|d| d.field == "total").unwrap();
        assert_eq!(total.left, "20.24");
    }

    #[test]
    fn test_reports_coupon_currency_and_discount_split() {
        let plain = breakdown(3);

        let mut couponed = plain.clone();
        couponed.coupon = Some(AppliedCoupon { code: "FERIADO".into(), percentage: Percentage::new(dec!(10)).unwrap() });
        couponed.free_shipping = true;
        couponed.currency = "EUR".into();
        couponed.items[0].seller_discount_amount = dec!(1.26);
        couponed.items[0].volume_discount_amount = dec!(-1.26);

        let diffs = reconcile_breakdowns(&plain, &couponed);
        let fields: Vec<_> = diffs.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(
            fields,
            ["currency", "coupon", "free_shipping", "items[0].seller_discount_amount", "items[0].volume_discount_amount"]
        );
        let coupon = diffs.iter().find(|d| d.field == "coupon").unwrap();
        assert_eq!((coupon.left.as_str(), coupon.right.as_str()), ("none", "FERIADO (10%)"));
    }
}
