use rust_decimal::Decimal;

use super::{volume_discount_for, AppliedCoupon, ItemBreakdown, PriceBreakdown, PricingConfig, PricingError, PricingLine};
use crate::domain::value_objects::round_money;

/// Deterministic order pricing.
///
/// Per line: gross = price × qty, then the seller discount on gross, then the
/// volume discount on what remains. The discounted subtotal decides free
/// shipping; a coupon reduces the subtotal; IVA is charged on
/// `subtotal − coupon + shipping`. Every stored amount is rounded to cents
/// before it is summed, so totals are always the sum of their parts.
#[derive(Clone, Debug, Default)]
pub struct PricingCalculator {
    config: PricingConfig,
}

impl PricingCalculator {
    pub fn new(config: PricingConfig) -> Self { Self { config } }

    pub fn config(&self) -> &PricingConfig { &self.config }

    pub fn calculate(&self, lines: &[PricingLine], coupon: Option<&AppliedCoupon>) -> Result<PriceBreakdown, PricingError> {
        if lines.is_empty() { return Err(PricingError::EmptyCart); }
        let shipping_cfg = &self.config.shipping;
        if shipping_cfg.flat_rate < Decimal::ZERO || shipping_cfg.free_shipping_threshold < Decimal::ZERO {
            return Err(PricingError::InvalidShipping("amounts must be non-negative".into()));
        }

        let items = lines.iter().map(|l| self.price_line(l)).collect::<Result<Vec<_>, _>>()?;

        let gross_subtotal = round_money(items.iter().map(|i| i.gross).sum());
        let items_discount = round_money(items.iter().map(|i| i.discount_amount).sum());
        let subtotal = round_money(items.iter().map(|i| i.line_total).sum());

        let free_shipping = shipping_cfg.qualifies_for_free_shipping(subtotal);
        let shipping = round_money(shipping_cfg.cost_for(subtotal));

        let coupon_discount = round_money(coupon.map(|c| c.percentage.of(subtotal).min(subtotal)).unwrap_or_default());
        let taxable_base = subtotal - coupon_discount + shipping;
        let iva = self.config.iva_rate.of(taxable_base);
        let total = taxable_base + iva;

        tracing::debug!(%subtotal, %items_discount, %coupon_discount, %shipping, %iva, %total, "priced order");

        Ok(PriceBreakdown {
            currency: self.config.currency.clone(),
            items,
            gross_subtotal,
            items_discount,
            subtotal,
            coupon: coupon.cloned(),
            coupon_discount,
            free_shipping,
            shipping,
            taxable_base,
            iva_rate: self.config.iva_rate,
            iva,
            total,
        })
    }

    fn price_line(&self, line: &PricingLine) -> Result<ItemBreakdown, PricingError> {
        if line.quantity == 0 { return Err(PricingError::InvalidQuantity(line.product_id)); }
        if line.unit_price.is_negative() { return Err(PricingError::NegativePrice(line.product_id)); }
        if !line.unit_price.currency().eq_ignore_ascii_case(&self.config.currency) {
            return Err(PricingError::CurrencyMismatch {
                product_id: line.product_id,
                expected: self.config.currency.clone(),
                actual: line.unit_price.currency().to_string(),
            });
        }

        let gross = line.unit_price.multiply(line.quantity).amount();
        let seller_discount_amount = line.seller_discount.of(gross);
        let volume_discount_pct = volume_discount_for(&line.volume_tiers, line.quantity);
        let volume_discount_amount = volume_discount_pct.of(gross - seller_discount_amount);
        let discount_amount = seller_discount_amount + volume_discount_amount;

        Ok(ItemBreakdown {
            product_id: line.product_id,
            seller_id: line.seller_id,
            name: line.name.clone(),
            sku: line.sku.clone(),
            quantity: line.quantity,
            unit_price: round_money(line.unit_price.amount()),
            gross,
            seller_discount_pct: line.seller_discount,
            seller_discount_amount,
            volume_discount_pct,
            volume_discount_amount,
            discount_amount,
            line_total: gross - discount_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{ShippingConfig, VolumeTier};
    use crate::domain::value_objects::{Money, Percentage};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn pct(v: Decimal) -> Percentage { Percentage::new(v).unwrap() }

    fn line(price: Decimal, qty: u32, seller_pct: Decimal, tiers: Vec<VolumeTier>) -> PricingLine {
        PricingLine {
            product_id: Uuid::new_v4(), seller_id: Uuid::nil(), name: "Cafe de Loja".into(), sku: "CAF-001".into(),
            unit_price: Money::usd(price), quantity: qty, seller_discount: pct(seller_pct), volume_tiers: tiers,
        }
    }

    #[test]
    fn test_below_threshold_pays_shipping_and_iva() {
        let calc = PricingCalculator::default();
        let b = calc.calculate(&[line(dec!(10.00), 2, dec!(0), vec![])], None).unwrap();
        assert_eq!(b.subtotal, dec!(20.00));
        assert!(!b.free_shipping);
        assert_eq!(b.shipping, dec!(5.00));
        assert_eq!(b.taxable_base, dec!(25.00));
        assert_eq!(b.iva, dec!(3.75));
        assert_eq!(b.total, dec!(28.75));
    }

    #[test]
    fn test_threshold_reached_exactly_ships_free() {
        let calc = PricingCalculator::default();
        let b = calc.calculate(&[line(dec!(25.00), 2, dec!(0), vec![])], None).unwrap();
        assert!(b.free_shipping);
        assert_eq!(b.shipping, dec!(0));
        assert_eq!(b.iva, dec!(7.50));
        assert_eq!(b.total, dec!(57.50));
    }

    #[test]
    fn test_threshold_uses_discounted_subtotal() {
        // 60.00 gross, 20% seller discount -> 48.00, below the 50.00 threshold
        let calc = PricingCalculator::default();
        let b = calc.calculate(&[line(dec!(30.00), 2, dec!(20), vec![])], None).unwrap();
        assert_eq!(b.gross_subtotal, dec!(60.00));
        assert_eq!(b.items[0].seller_discount_amount, dec!(12.00));
        assert_eq!(b.subtotal, dec!(48.00));
        assert_eq!(b.shipping, dec!(5.00));
    }

    #[test]
    fn test_volume_discount_applies_after_seller_discount() {
        let tiers = vec![
            VolumeTier { min_quantity: 5, discount: pct(dec!(5)) },
            VolumeTier { min_quantity: 10, discount: pct(dec!(10)) },
        ];
        let calc = PricingCalculator::default();
        let b = calc.calculate(&[line(dec!(3.99), 12, dec!(10), tiers)], None).unwrap();
        let item = &b.items[0];
        assert_eq!(item.gross, dec!(47.88));
        assert_eq!(item.seller_discount_amount, dec!(4.79));
        assert_eq!(item.volume_discount_pct, pct(dec!(10)));
        assert_eq!(item.volume_discount_amount, dec!(4.31));
        assert_eq!(item.line_total, dec!(38.78));
        assert_eq!(b.gross_subtotal - b.items_discount, b.subtotal);
    }

    #[test]
    fn test_volume_tier_selection() {
        let tiers = vec![
            VolumeTier { min_quantity: 0, discount: pct(dec!(1)) },
            VolumeTier { min_quantity: 4, discount: pct(dec!(4)) },
            VolumeTier { min_quantity: 8, discount: pct(dec!(8)) },
        ];
        assert_eq!(volume_discount_for(&tiers, 1), pct(dec!(1)));
        assert_eq!(volume_discount_for(&tiers, 4), pct(dec!(4)));
        assert_eq!(volume_discount_for(&tiers, 7), pct(dec!(4)));
        assert_eq!(volume_discount_for(&tiers, 50), pct(dec!(8)));
        assert_eq!(volume_discount_for(&tiers[1..], 3), Percentage::ZERO);
        assert_eq!(volume_discount_for(&[], 3), Percentage::ZERO);
    }

    #[test]
    fn test_coupon_reduces_taxable_base_not_threshold() {
        let calc = PricingCalculator::default();
        let coupon = AppliedCoupon { code: "BIENVENIDA".into(), percentage: pct(dec!(10)) };
        let b = calc.calculate(&[line(dec!(50.00), 1, dec!(0), vec![])], Some(&coupon)).unwrap();
        assert!(b.free_shipping);
        assert_eq!(b.coupon_discount, dec!(5.00));
        assert_eq!(b.taxable_base, dec!(45.00));
        assert_eq!(b.iva, dec!(6.75));
        assert_eq!(b.total, dec!(51.75));
        assert_eq!(b.total_discount(), dec!(5.00));
    }

    #[test]
    fn test_disabled_free_shipping_always_charges() {
        let config = PricingConfig {
            shipping: ShippingConfig { free_shipping_enabled: false, ..ShippingConfig::default() },
            ..PricingConfig::default()
        };
        let b = PricingCalculator::new(config).calculate(&[line(dec!(500), 1, dec!(0), vec![])], None).unwrap();
        assert_eq!(b.shipping, dec!(5.00));
    }

    #[test]
    fn test_rejects_bad_input() {
        let calc = PricingCalculator::default();
        assert_eq!(calc.calculate(&[], None), Err(PricingError::EmptyCart));
        let zero = line(dec!(1), 0, dec!(0), vec![]);
        assert_eq!(calc.calculate(&[zero.clone()], None), Err(PricingError::InvalidQuantity(zero.product_id)));
        let mut eur = line(dec!(1), 1, dec!(0), vec![]);
        eur.unit_price = Money::new(dec!(1), "EUR");
        assert!(matches!(calc.calculate(&[eur], None), Err(PricingError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_rejects_negative_price_and_shipping() {
        let calc = PricingCalculator::default();
        let negative = line(dec!(-0.01), 1, dec!(0), vec![]);
        assert_eq!(calc.calculate(&[negative.clone()], None), Err(PricingError::NegativePrice(negative.product_id)));

        for shipping in [
            ShippingConfig { flat_rate: dec!(-1), ..ShippingConfig::default() },
            ShippingConfig { free_shipping_threshold: dec!(-50), ..ShippingConfig::default() },
        ] {
            let calc = PricingCalculator::new(PricingConfig { shipping, ..PricingConfig::default() });
            let res = calc.calculate(&[line(dec!(1), 1, dec!(0), vec![])], None);
            assert!(matches!(res, Err(PricingError::InvalidShipping(_))));
        }
    }

    #[test]
    fn test_full_coupon_never_exceeds_subtotal() {
        let calc = PricingCalculator::default();
        let coupon = AppliedCoupon { code: "GRATIS".into(), percentage: pct(dec!(100)) };
        let b = calc.calculate(&[line(dec!(12.35), 3, dec!(0), vec![])], Some(&coupon)).unwrap();
        assert_eq!(b.subtotal, dec!(37.05));
        assert_eq!(b.coupon_discount, b.subtotal);
        assert_eq!(b.taxable_base, dec!(5.00));
        assert_eq!(b.iva, dec!(0.75));
        assert_eq!(b.total, dec!(5.75));
    }

    #[test]
    fn test_amounts_serialize_with_two_decimals() {
        let b = PricingCalculator::default().calculate(&[line(dec!(25), 2, dec!(0), vec![])], None).unwrap();
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["shipping"], "0.00");
        assert_eq!(json["coupon_discount"], "0.00");
        assert_eq!(json["subtotal"], "50.00");
        assert_eq!(json["items"][0]["unit_price"], "25.00");
        assert_eq!(json["items"][0]["gross"], "50.00");
        assert_eq!(json["iva_rate"], "15");

        let df = serde_json::to_value(b.datafast_amounts()).unwrap();
        assert_eq!(df, serde_json::json!({"base0": "0.00", "base_imp": "50.00", "iva": "7.50", "amount": "57.50"}));
    }

    #[test]
    fn test_seller_subtotals_and_datafast_amounts() {
        let seller_a = Uuid::from_u128(1);
        let seller_b = Uuid::from_u128(2);
        let mut a = line(dec!(10), 1, dec!(0), vec![]);
        a.seller_id = seller_a;
        let mut b = line(dec!(7.5), 2, dec!(0), vec![]);
        b.seller_id = seller_b;
        let breakdown = PricingCalculator::default().calculate(&[a, b], None).unwrap();
        let per_seller = breakdown.seller_subtotals();
        assert_eq!(per_seller[&seller_a], dec!(10));
        assert_eq!(per_seller[&seller_b], dec!(15.00));
        let df = breakdown.datafast_amounts();
        assert_eq!(df.base0 + df.base_imp + df.iva, df.amount);
    }

    #[test]
    fn test_same_input_same_breakdown() {
        let calc = PricingCalculator::default();
        let lines = vec![line(dec!(12.34), 3, dec!(7.5), vec![VolumeTier { min_quantity: 3, discount: pct(dec!(2)) }])];
        let a = serde_json::to_string(&calc.calculate(&lines, None).unwrap()).unwrap();
        let b = serde_json::to_string(&calc.calculate(&lines, None).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
