use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{CartRepository, CatalogRepository, OrderRepository, StoreError, StoreResult};
use crate::domain::aggregates::{Cart, CartItem, DiscountCode, Order, PaymentGateway, Product, Seller};
use crate::domain::pricing::{AppliedCoupon, ItemBreakdown, PriceBreakdown, VolumeTier};
use crate::domain::value_objects::{Money, Percentage, Quantity, Sku};

const UNIQUE_VIOLATION: &str = "23505";
const PAYMENT_REFERENCE_KEY: &str = "orders_gateway_payment_reference_key";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn corrupt(e: impl std::fmt::Display) -> StoreError { StoreError::Corrupt(e.to_string()) }

fn pct(v: Decimal) -> StoreResult<Percentage> { Percentage::new(v).map_err(corrupt) }

fn to_u32(v: i32) -> StoreResult<u32> { u32::try_from(v).map_err(corrupt) }

fn to_i32(v: u32) -> StoreResult<i32> { i32::try_from(v).map_err(corrupt) }

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, seller_id: Uuid, sku: String, name: String, price: Decimal, currency: String,
    discount_percentage: Decimal, stock: i32, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> StoreResult<Product> {
        Ok(Product::restore(
            self.id, self.seller_id, Sku::new(self.sku).map_err(corrupt)?, self.name,
            Money::new(self.price, &self.currency), pct(self.discount_percentage)?, Quantity::new(to_u32(self.stock)?),
            self.status.parse().map_err(corrupt)?, self.created_at, self.updated_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct DiscountCodeRow { code: String, percentage: Decimal, active: bool, expires_at: Option<DateTime<Utc>>, max_uses: Option<i32>, uses: i32 }

#[derive(sqlx::FromRow)]
struct CartRow { id: Uuid, customer_id: Option<Uuid>, email: Option<String>, discount_code: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: i64, customer_id: Uuid, email: String, gateway: String, payment_reference: String,
    status: String, payment_status: String, currency: String, gross_subtotal: Decimal, items_discount: Decimal,
    subtotal: Decimal, coupon_code: Option<String>, coupon_percentage: Option<Decimal>, coupon_discount: Decimal,
    free_shipping: bool, shipping: Decimal, taxable_base: Decimal, iva_rate: Decimal, iva: Decimal, total: Decimal,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    product_id: Uuid, seller_id: Uuid, name: String, sku: String, quantity: i32, unit_price: Decimal, gross: Decimal,
    seller_discount_pct: Decimal, seller_discount_amount: Decimal, volume_discount_pct: Decimal,
    volume_discount_amount: Decimal, discount_amount: Decimal, line_total: Decimal,
}

impl OrderItemRow {
    fn into_item(self) -> StoreResult<ItemBreakdown> {
        Ok(ItemBreakdown {
            product_id: self.product_id, seller_id: self.seller_id, name: self.name, sku: self.sku,
            quantity: to_u32(self.quantity)?, unit_price: self.unit_price, gross: self.gross,
            seller_discount_pct: pct(self.seller_discount_pct)?, seller_discount_amount: self.seller_discount_amount,
            volume_discount_pct: pct(self.volume_discount_pct)?, volume_discount_amount: self.volume_discount_amount,
            discount_amount: self.discount_amount, line_total: self.line_total,
        })
    }
}

impl PgStore {
    async fn hydrate(&self, row: OrderRow) -> StoreResult<Order> {
        let items = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY position")
            .bind(row.id).fetch_all(&self.pool).await?
            .into_iter().map(OrderItemRow::into_item).collect::<StoreResult<Vec<_>>>()?;
        let coupon = match (row.coupon_code, row.coupon_percentage) {
            (Some(code), Some(p)) => Some(AppliedCoupon { code, percentage: pct(p)? }),
            _ => None,
        };
        let breakdown = PriceBreakdown {
            currency: row.currency, items, gross_subtotal: row.gross_subtotal, items_discount: row.items_discount,
            subtotal: row.subtotal, coupon, coupon_discount: row.coupon_discount, free_shipping: row.free_shipping,
            shipping: row.shipping, taxable_base: row.taxable_base, iva_rate: pct(row.iva_rate)?, iva: row.iva, total: row.total,
        };
        let order_number = u64::try_from(row.order_number).map_err(corrupt)?;
        Ok(Order::restore(
            row.id, order_number, row.customer_id, row.email, row.gateway.parse().map_err(corrupt)?, row.payment_reference,
            row.status.parse().map_err(corrupt)?, row.payment_status.parse().map_err(corrupt)?, breakdown, row.created_at, row.updated_at,
        ))
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?
            .map(ProductRow::into_product).transpose()
    }

    async fn seller(&self, id: Uuid) -> StoreResult<Option<Seller>> {
        let Some((id, name)) = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM sellers WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await? else { return Ok(None) };
        let tiers = sqlx::query_as::<_, (i32, Decimal)>("SELECT min_quantity, discount_percentage FROM seller_volume_tiers WHERE seller_id = $1 ORDER BY min_quantity")
            .bind(id).fetch_all(&self.pool).await?
            .into_iter().map(|(min, d)| -> StoreResult<VolumeTier> { Ok(VolumeTier { min_quantity: to_u32(min)?, discount: pct(d)? }) })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(Seller { id, name, volume_tiers: tiers }))
    }

    async fn discount_code(&self, code: &str) -> StoreResult<Option<DiscountCode>> {
        let Some(row) = sqlx::query_as::<_, DiscountCodeRow>("SELECT * FROM discount_codes WHERE code = $1")
            .bind(code.to_uppercase()).fetch_optional(&self.pool).await? else { return Ok(None) };
        Ok(Some(DiscountCode {
            code: row.code, percentage: pct(row.percentage)?, active: row.active, expires_at: row.expires_at,
            max_uses: row.max_uses.map(to_u32).transpose()?, uses: to_u32(row.uses)?,
        }))
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn cart(&self, id: Uuid) -> StoreResult<Option<Cart>> {
        let Some(row) = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE id = $1").bind(id).fetch_optional(&self.pool).await?
        else { return Ok(None) };
        let items = sqlx::query_as::<_, (Uuid, i32)>("SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY position")
            .bind(id).fetch_all(&self.pool).await?
            .into_iter().map(|(product_id, q)| -> StoreResult<CartItem> { Ok(CartItem { product_id, quantity: to_u32(q)? }) })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(Cart::restore(row.id, row.customer_id, row.email, items, row.discount_code, row.created_at, row.updated_at)))
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO carts (id, customer_id, email, discount_code, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO UPDATE SET customer_id = $2, email = $3, discount_code = $4, updated_at = $6")
            .bind(cart.id()).bind(cart.customer_id()).bind(cart.email()).bind(cart.discount_code()).bind(cart.created_at()).bind(cart.updated_at())
            .execute(&mut *tx).await?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart.id()).execute(&mut *tx).await?;
        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (cart_id, product_id, quantity, position) VALUES ($1, $2, $3, $4)")
                .bind(cart.id()).bind(item.product_id).bind(to_i32(item.quantity)?).bind(position as i32)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM carts WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn next_order_number(&self) -> StoreResult<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT nextval('order_number_seq')").fetch_one(&self.pool).await?;
        u64::try_from(n).map_err(corrupt)
    }

    async fn commit_order(&self, cart_id: Uuid, order: &Order) -> StoreResult<()> {
        let b = order.breakdown();
        let order_number = i64::try_from(order.order_number()).map_err(corrupt)?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO orders (id, order_number, customer_id, email, gateway, payment_reference, status, payment_status, currency, \
             gross_subtotal, items_discount, subtotal, coupon_code, coupon_percentage, coupon_discount, free_shipping, shipping, \
             taxable_base, iva_rate, iva, total, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)")
            .bind(order.id()).bind(order_number).bind(order.customer_id()).bind(order.email())
            .bind(order.gateway().as_str()).bind(order.payment_reference()).bind(order.status().as_str()).bind(order.payment_status().as_str())
            .bind(&b.currency).bind(b.gross_subtotal).bind(b.items_discount).bind(b.subtotal)
            .bind(b.coupon.as_ref().map(|c| c.code.clone())).bind(b.coupon.as_ref().map(|c| c.percentage.value()))
            .bind(b.coupon_discount).bind(b.free_shipping).bind(b.shipping).bind(b.taxable_base)
            .bind(b.iva_rate.value()).bind(b.iva).bind(b.total).bind(order.created_at()).bind(order.updated_at())
            .execute(&mut *tx).await;
        if let Err(sqlx::Error::Database(db)) = &inserted {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) && db.constraint() == Some(PAYMENT_REFERENCE_KEY) {
                return Err(StoreError::DuplicatePayment { gateway: order.gateway(), reference: order.payment_reference().to_string() });
            }
        }
        inserted?;

        // Row lock: a concurrent checkout of the same cart waits here and then finds nothing.
        let consumed = sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(&mut *tx).await?;
        if consumed.rows_affected() != 1 { return Err(StoreError::CartConsumed(cart_id)); }

        for (position, item) in b.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, seller_id, name, sku, quantity, unit_price, gross, \
                 seller_discount_pct, seller_discount_amount, volume_discount_pct, volume_discount_amount, discount_amount, line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)")
                .bind(order.id()).bind(position as i32).bind(item.product_id).bind(item.seller_id).bind(&item.name).bind(&item.sku)
                .bind(to_i32(item.quantity)?).bind(item.unit_price).bind(item.gross)
                .bind(item.seller_discount_pct.value()).bind(item.seller_discount_amount)
                .bind(item.volume_discount_pct.value()).bind(item.volume_discount_amount)
                .bind(item.discount_amount).bind(item.line_total)
                .execute(&mut *tx).await?;

            let taken = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
                .bind(item.product_id).bind(to_i32(item.quantity)?)
                .execute(&mut *tx).await?;
            if taken.rows_affected() != 1 { return Err(StoreError::InsufficientStock(item.product_id)); }
        }

        if let Some(coupon) = &b.coupon {
            let used = sqlx::query("UPDATE discount_codes SET uses = uses + 1 WHERE code = $1 AND (max_uses IS NULL OR uses < max_uses)")
                .bind(&coupon.code).execute(&mut *tx).await?;
            if used.rows_affected() != 1 { return Err(StoreError::DiscountCodeExhausted(coupon.code.clone())); }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        match row { Some(row) => Ok(Some(self.hydrate(row).await?)), None => Ok(None) }
    }

    async fn order_by_payment(&self, gateway: PaymentGateway, reference: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE gateway = $1 AND payment_reference = $2")
            .bind(gateway.as_str()).bind(reference).fetch_optional(&self.pool).await?;
        match row { Some(row) => Ok(Some(self.hydrate(row).await?)), None => Ok(None) }
    }

    async fn orders(&self, page: u32, per_page: u32) -> StoreResult<(Vec<Order>, u64)> {
        let offset = i64::from(page.max(1) - 1) * i64::from(per_page);
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(i64::from(per_page)).bind(offset).fetch_all(&self.pool).await?;
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows { orders.push(self.hydrate(row).await?); }
        Ok((orders, u64::try_from(total).map_err(corrupt)?))
    }
}
