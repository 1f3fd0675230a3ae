use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartRepository, CatalogRepository, CatalogSeed, OrderRepository, StoreError, StoreResult};
use crate::domain::aggregates::{Cart, DiscountCode, Order, PaymentGateway, Product, Seller};
use crate::error::Result;

const FIRST_ORDER_NUMBER: u64 = 1001;

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    sellers: HashMap<Uuid, Seller>,
    discount_codes: HashMap<String, DiscountCode>,
    carts: HashMap<Uuid, Cart>,
    orders: Vec<Order>,
    last_order_number: u64,
}

/// Process-local store. One lock guards everything so `commit_order` is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn from_seed(seed: CatalogSeed) -> Result<Self> {
        let store = Self::new();
        for seller in seed.sellers { store.put_seller(seller).await; }
        for product in seed.products { store.put_product(product.into_product()?).await; }
        for code in seed.discount_codes { store.put_discount_code(code).await; }
        Ok(store)
    }

    pub async fn put_seller(&self, seller: Seller) { self.inner.write().await.sellers.insert(seller.id, seller); }
    pub async fn put_product(&self, product: Product) { self.inner.write().await.products.insert(product.id(), product); }
    pub async fn put_discount_code(&self, mut code: DiscountCode) {
        code.code = code.code.trim().to_uppercase();
        self.inner.write().await.discount_codes.insert(code.code.clone(), code);
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> { Ok(self.inner.read().await.products.get(&id).cloned()) }
    async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>> { Ok(self.inner.read().await.sellers.get(&id).cloned()) }
    async fn discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>> {
        Ok(self.inner.read().await.discount_codes.get(&code.to_uppercase()).cloned())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn cart(&self, id: Uuid) -> StoreResult<Option<Cart>> { Ok(self.inner.read().await.carts.get(&id).cloned()) }
    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> { self.inner.write().await.carts.insert(cart.id(), cart.clone()); Ok(()) }
    async fn delete_cart(&self, id: Uuid) -> StoreResult<()> { self.inner.write().await.carts.remove(&id); Ok(()) }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn next_order_number(&self) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        inner.last_order_number = inner.last_order_number.max(FIRST_ORDER_NUMBER - 1) + 1;
        Ok(inner.last_order_number)
    }

    async fn commit_order(&self, cart_id: Uuid, order: &Order) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.orders.iter().any(|o| o.gateway() == order.gateway() && o.payment_reference() == order.payment_reference()) {
            return Err(StoreError::DuplicatePayment { gateway: order.gateway(), reference: order.payment_reference().to_string() });
        }
        // Check everything before mutating anything.
        if !inner.carts.contains_key(&cart_id) { return Err(StoreError::CartConsumed(cart_id)); }
        for item in order.items() {
            let enough = inner.products.get(&item.product_id).is_some_and(|p| p.has_stock_for(item.quantity));
            if !enough { return Err(StoreError::InsufficientStock(item.product_id)); }
        }
        if let Some(coupon) = &order.breakdown().coupon {
            let redeemable = inner.discount_codes.get(&coupon.code).is_some_and(|c| c.max_uses.map_or(true, |max| c.uses < max));
            if !redeemable { return Err(StoreError::DiscountCodeExhausted(coupon.code.clone())); }
        }

        for item in order.items() {
            if let Some(product) = inner.products.get_mut(&item.product_id) {
                product.remove_stock(item.quantity).map_err(|_| StoreError::InsufficientStock(item.product_id))?;
            }
        }
        if let Some(coupon) = &order.breakdown().coupon {
            if let Some(code) = inner.discount_codes.get_mut(&coupon.code) { code.uses += 1; }
        }
        inner.carts.remove(&cart_id);
        let mut stored = order.clone();
        stored.take_events();
        inner.orders.push(stored);
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.inner.read().await.orders.iter().find(|o| o.id() == id).cloned())
    }

    async fn order_by_payment(&self, gateway: PaymentGateway, reference: &str) -> StoreResult<Option<Order>> {
        Ok(self.inner.read().await.orders.iter().find(|o| o.gateway() == gateway && o.payment_reference() == reference).cloned())
    }

    async fn orders(&self, page: u32, per_page: u32) -> StoreResult<(Vec<Order>, u64)> {
        let inner = self.inner.read().await;
        let skip = (page.max(1) as usize - 1) * per_page as usize;
        let data = inner.orders.iter().rev().skip(skip).take(per_page as usize).cloned().collect();
        Ok((data, inner.orders.len() as u64))
    }
}
