//! Checkout orchestration shared by both payment gateways.
//!
//! `DatafastCheckout` (synchronous return from the payment widget) and
//! `DeunaWebhookHandler` (asynchronous provider callback) differ only in how
//! the payment confirmation arrives. Cart validation, pricing and order
//! persistence all go through [`CheckoutService`].

pub mod datafast;
pub mod deuna;
pub mod reconcile;

pub use datafast::{DatafastCheckout, DatafastPayment};
pub use deuna::{DeunaWebhook, DeunaWebhookHandler, WebhookOutcome};
pub use reconcile::{reconcile, Discrepancy};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Order, PaymentGateway, Seller};
use crate::domain::pricing::{AppliedCoupon, DatafastAmounts, PriceBreakdown, PricingCalculator, PricingLine};
use crate::error::{EcommerceError, Result};
use crate::publisher::EventPublisher;
use crate::store::{Store, StoreError};

/// Price preview for a cart, with the figures the Datafast widget needs.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub cart_id: Uuid,
    pub breakdown: PriceBreakdown,
    pub datafast: DatafastAmounts,
    pub seller_subtotals: BTreeMap<Uuid, Decimal>,
}

/// A confirmed payment as reported by either gateway.
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub gateway: PaymentGateway,
    pub reference: String,
    pub amount: Decimal,
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    calculator: PricingCalculator,
    publisher: EventPublisher,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, calculator: PricingCalculator, publisher: EventPublisher) -> Self {
        Self { store, calculator, publisher }
    }

    pub fn store(&self) -> &Arc<dyn Store> { &self.store }

    pub async fn load_cart(&self, cart_id: Uuid) -> Result<Cart> {
        self.store.cart(cart_id).await?.ok_or(EcommerceError::CartNotFound(cart_id))
    }

    pub async fn quote(&self, cart_id: Uuid) -> Result<Quote> {
        let cart = self.load_cart(cart_id).await?;
        let breakdown = self.price_cart(&cart).await?;
        Ok(Quote { cart_id, datafast: breakdown.datafast_amounts(), seller_subtotals: breakdown.seller_subtotals(), breakdown })
    }

    /// Validates the cart against the catalog and prices it.
    pub async fn price_cart(&self, cart: &Cart) -> Result<PriceBreakdown> {
        if cart.is_empty() { return Err(EcommerceError::EmptyCart); }

        let mut sellers: HashMap<Uuid, Seller> = HashMap::new();
        let mut lines = Vec::with_capacity(cart.item_count());
        for item in cart.items() {
            let product = self.store.product(item.product_id).await?.ok_or(EcommerceError::ProductNotFound(item.product_id))?;
            if !product.is_purchasable() { return Err(EcommerceError::ProductUnavailable(product.id())); }
            if !product.has_stock_for(item.quantity) { return Err(EcommerceError::InsufficientInventory(product.id())); }

            let seller_id = product.seller_id();
            if !sellers.contains_key(&seller_id) {
                let seller = self.store.seller(seller_id).await?.ok_or(EcommerceError::SellerNotFound(seller_id))?;
                sellers.insert(seller_id, seller);
            }
            let volume_tiers = sellers.get(&seller_id).map(|s| s.volume_tiers.clone()).unwrap_or_default();

            lines.push(PricingLine {
                product_id: product.id(),
                seller_id,
                name: product.name().to_string(),
                sku: product.sku().to_string(),
                unit_price: product.price().clone(),
                quantity: item.quantity,
                seller_discount: product.discount_percentage(),
                volume_tiers,
            });
        }

        let coupon = self.resolve_coupon(cart.discount_code()).await?;
        Ok(self.calculator.calculate(&lines, coupon.as_ref())?)
    }

    async fn resolve_coupon(&self, code: Option<&str>) -> Result<Option<AppliedCoupon>> {
        let Some(code) = code else { return Ok(None) };
        let discount = self.store.discount_code(code).await?
            .ok_or_else(|| EcommerceError::InvalidDiscountCode { code: code.to_string(), reason: "unknown code".into() })?;
        let applied = discount.redeem(Utc::now())
            .map_err(|e| EcommerceError::InvalidDiscountCode { code: code.to_string(), reason: e.to_string() })?;
        Ok(Some(applied))
    }

    /// Existing order for a gateway reference, if the payment was already processed.
    pub async fn existing_order(&self, gateway: PaymentGateway, reference: &str) -> Result<Option<Order>> {
        Ok(self.store.order_by_payment(gateway, reference).await?)
    }

    /// Turns a paid cart into an order. Returns the order and whether it was
    /// created by this call (`false` when a concurrent request won).
    pub async fn place_order(&self, cart_id: Uuid, payment: ConfirmedPayment) -> Result<(Order, bool)> {
        let cart = self.load_cart(cart_id).await?;
        let (customer_id, email) = match (cart.customer_id(), cart.email()) {
            (Some(id), Some(email)) => (id, email.to_string()),
            _ => return Err(EcommerceError::MissingCustomer),
        };

        let breakdown = self.price_cart(&cart).await?;
        if breakdown.total != payment.amount {
            tracing::warn!(%cart_id, expected = %breakdown.total, received = %payment.amount, gateway = payment.gateway.as_str(), "paid amount differs from cart total");
            return Err(EcommerceError::PaymentAmountMismatch { expected: breakdown.total, received: payment.amount });
        }

        let order_number = self.store.next_order_number().await?;
        let mut order = Order::place_paid(order_number, customer_id, email, payment.gateway, &payment.reference, breakdown)?;

        match self.store.commit_order(cart_id, &order).await {
            Ok(()) => {}
            Err(StoreError::DuplicatePayment { gateway, reference }) => {
                let existing = self.store.order_by_payment(gateway, &reference).await?.ok_or(EcommerceError::OrderNotFound)?;
                return Ok((existing, false));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(order_id = %order.id(), order_number, gateway = payment.gateway.as_str(), total = %order.total(), "order placed");
        self.publisher.publish_all(order.take_events()).await;
        Ok((order, true))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::aggregates::{DiscountCode, Product};
    use crate::domain::value_objects::Percentage;
    use crate::store::{CartRepository, CatalogRepository, MemoryStore, OrderRepository, StoreResult};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    /// Memory store that hands control back to the runtime before issuing an
    /// order number, so two checkouts of one cart interleave.
    struct InterleavingStore(Arc<MemoryStore>);

    #[async_trait]
    impl CatalogRepository for InterleavingStore {
        async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> { self.0.product(id).await }
        async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>> { self.0.seller(id).await }
        async fn discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>> { self.0.discount_code(code).await }
    }

    #[async_trait]
    impl CartRepository for InterleavingStore {
        async fn cart(&self, id: Uuid) -> StoreResult<Option<Cart>> { self.0.cart(id).await }
        async fn save_cart(&self, cart: &Cart) -> StoreResult<()> { self.0.save_cart(cart).await }
        async fn delete_cart(&self, id: Uuid) -> StoreResult<()> { self.0.delete_cart(id).await }
    }

    #[async_trait]
    impl OrderRepository for InterleavingStore {
        async fn next_order_number(&self) -> StoreResult<u64> {
            tokio::task::yield_now().await;
            self.0.next_order_number().await
        }
        async fn commit_order(&self, cart_id: Uuid, order: &Order) -> StoreResult<()> { self.0.commit_order(cart_id, order).await }
        async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> { self.0.order(id).await }
        async fn order_by_payment(&self, gateway: PaymentGateway, reference: &str) -> StoreResult<Option<Order>> {
            self.0.order_by_payment(gateway, reference).await
        }
        async fn orders(&self, page: u32, per_page: u32) -> StoreResult<(Vec<Order>, u64)> { self.0.orders(page, per_page).await }
    }

    #[tokio::test]
    async fn test_quote_prices_mixed_sellers() {
        let fx = fixture().await;
        let cart_id = cart_with(&fx, &[(&fx.coffee, 4), (&fx.hat, 1)]).await;
        let quote = fx.service.quote(cart_id).await.unwrap();
        let b = &quote.breakdown;
        // coffee: 50.00 gross, -5.00 seller, -2.25 volume (5% of 45.00) = 42.75
        assert_eq!(b.items[0].line_total, dec!(42.75));
        assert_eq!(b.subtotal, dec!(60.75));
        assert!(b.free_shipping);
        assert_eq!(b.iva, dec!(9.11));
        assert_eq!(b.total, dec!(69.86));
        assert_eq!(quote.datafast.amount, b.total);
        assert_eq!(quote.seller_subtotals[&fx.hat.seller_id()], dec!(18.00));
    }

    #[tokio::test]
    async fn test_price_cart_validation() {
        let fx = fixture().await;
        let empty = Cart::new(Uuid::new_v4());
        assert!(matches!(fx.service.price_cart(&empty).await, Err(EcommerceError::EmptyCart)));

        let cart_id = cart_with(&fx, &[(&fx.hat, 6)]).await;
        assert!(matches!(fx.service.quote(cart_id).await, Err(EcommerceError::InsufficientInventory(id)) if id == fx.hat.id()));

        let mut unknown = Cart::new(Uuid::new_v4());
        unknown.add_item(Uuid::new_v4(), 1).unwrap();
        assert!(matches!(fx.service.price_cart(&unknown).await, Err(EcommerceError::ProductNotFound(_))));

        let mut archived = fx.store.product(fx.hat.id()).await.unwrap().unwrap();
        archived.archive();
        fx.store.put_product(archived).await;
        let cart_id = cart_with(&fx, &[(&fx.hat, 1)]).await;
        assert!(matches!(fx.service.quote(cart_id).await, Err(EcommerceError::ProductUnavailable(_))));
    }

    #[tokio::test]
    async fn test_discount_code_applied_and_unknown_rejected() {
        let fx = fixture().await;
        let cart_id = cart_with(&fx, &[(&fx.hat, 1)]).await;
        let mut cart = fx.store.cart(cart_id).await.unwrap().unwrap();
        cart.apply_discount_code(Some("bienvenida".into()));
        let b = fx.service.price_cart(&cart).await.unwrap();
        assert_eq!(b.coupon_discount, dec!(1.80));
        assert_eq!(b.taxable_base, dec!(21.20));

        cart.apply_discount_code(Some("NOEXISTE".into()));
        assert!(matches!(fx.service.price_cart(&cart).await, Err(EcommerceError::InvalidDiscountCode { .. })));
    }

    #[tokio::test]
    async fn test_place_order_requires_customer_and_exact_amount() {
        let fx = fixture().await;
        let mut anonymous = Cart::new(Uuid::new_v4());
        anonymous.add_item(fx.hat.id(), 1).unwrap();
        fx.store.save_cart(&anonymous).await.unwrap();
        let payment = ConfirmedPayment { gateway: PaymentGateway::Datafast, reference: "r1".into(), amount: dec!(25.87) };
        assert!(matches!(fx.service.place_order(anonymous.id(), payment).await, Err(EcommerceError::MissingCustomer)));

        let cart_id = cart_with(&fx, &[(&fx.hat, 1)]).await;
        let short = ConfirmedPayment { gateway: PaymentGateway::Datafast, reference: "r2".into(), amount: dec!(20.00) };
        assert!(matches!(fx.service.place_order(cart_id, short).await, Err(EcommerceError::PaymentAmountMismatch { .. })));

        // 18.00 + 5.00 shipping = 23.00, IVA 3.45
        let exact = ConfirmedPayment { gateway: PaymentGateway::Datafast, reference: "r3".into(), amount: dec!(26.45) };
        let (order, created) = fx.service.place_order(cart_id, exact).await.unwrap();
        assert!(created);
        assert_eq!(order.breakdown().shipping, dec!(5.00));
        assert!(fx.store.cart(cart_id).await.unwrap().is_none());
        assert_eq!(fx.store.product(fx.hat.id()).await.unwrap().unwrap().stock().value(), 4);
    }

    #[tokio::test]
    async fn test_expired_or_inactive_code_rejected() {
        let fx = fixture().await;
        let mut expired = DiscountCode::new("VERANO", Percentage::new(dec!(20)).unwrap());
        expired.expires_at = Some(Utc::now() - chrono::Duration::days(1));
        fx.store.put_discount_code(expired).await;
        let mut inactive = DiscountCode::new("PAUSADO", Percentage::new(dec!(20)).unwrap());
        inactive.active = false;
        fx.store.put_discount_code(inactive).await;

        let cart_id = cart_with(&fx, &[(&fx.hat, 1)]).await;
        let mut cart = fx.store.cart(cart_id).await.unwrap().unwrap();
        for code in ["verano", "PAUSADO"] {
            cart.apply_discount_code(Some(code.into()));
            let res = fx.service.price_cart(&cart).await;
            assert!(matches!(res, Err(EcommerceError::InvalidDiscountCode { code: c, .. }) if c.eq_ignore_ascii_case(code)));
        }
    }

    #[tokio::test]
    async fn test_concurrent_gateways_pay_cart_once() {
        let fx = fixture().await;
        let service = CheckoutService::new(Arc::new(InterleavingStore(fx.store.clone())), PricingCalculator::default(), EventPublisher::disabled());
        let cart_id = cart_with(&fx, &[(&fx.hat, 1)]).await;

        let datafast = ConfirmedPayment { gateway: PaymentGateway::Datafast, reference: "df-77".into(), amount: dec!(26.45) };
        let deuna = ConfirmedPayment { gateway: PaymentGateway::Deuna, reference: "dn-77".into(), amount: dec!(26.45) };
        let (a, b) = tokio::join!(service.place_order(cart_id, datafast), service.place_order(cart_id, deuna));

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(EcommerceError::CartAlreadyCheckedOut(id)) if id == cart_id));
        assert_eq!(fx.store.orders(1, 10).await.unwrap().1, 1);
        assert_eq!(fx.store.product(fx.hat.id()).await.unwrap().unwrap().stock().value(), 4);
    }
}
