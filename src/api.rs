//! HTTP surface: carts, price quotes, both payment flows and order lookup.

use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::checkout::{reconcile, CheckoutService, DatafastCheckout, DatafastPayment, DeunaWebhook, DeunaWebhookHandler, Discrepancy, Quote, WebhookOutcome};
use crate::domain::aggregates::{Cart, Order};
use crate::error::EcommerceError;
use crate::store::Store;

pub type ApiError = (StatusCode, String);
pub type ApiResult<T> = Result<T, ApiError>;

impl From<EcommerceError> for (StatusCode, String) {
    fn from(e: EcommerceError) -> Self {
        use EcommerceError as E;
        let status = match &e {
            E::ProductNotFound(_) | E::SellerNotFound(_) | E::OrderNotFound | E::CartNotFound(_) => StatusCode::NOT_FOUND,
            E::InsufficientInventory(_) | E::CartAlreadyCheckedOut(_) => StatusCode::CONFLICT,
            E::EmptyCart | E::MissingCustomer | E::ProductUnavailable(_) | E::InvalidDiscountCode { .. } | E::PaymentDeclined { .. }
            | E::PaymentAmountMismatch { .. } | E::Pricing(_) | E::Cart(_) | E::Order(_) | E::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            E::Serialization(_) => StatusCode::BAD_REQUEST,
            E::Config(_) | E::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() { tracing::error!(error = %e, "request failed"); }
        (status, e.to_string())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub checkout: CheckoutService,
    pub datafast: DatafastCheckout,
    pub deuna: DeunaWebhookHandler,
}

impl AppState {
    pub fn new(checkout: CheckoutService) -> Self {
        Self {
            store: checkout.store().clone(),
            datafast: DatafastCheckout::new(checkout.clone()),
            deuna: DeunaWebhookHandler::new(checkout.clone()),
            checkout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "mercado-checkout"})) }))
        .route("/api/v1/cart/:id", get(get_cart).post(add_to_cart).put(update_cart).delete(clear_cart))
        .route("/api/v1/cart/:id/quote", get(quote_cart))
        .route("/api/v1/checkout/datafast", post(datafast_checkout))
        .route("/api/v1/webhooks/deuna", post(deuna_webhook))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/reconcile/:other", get(reconcile_orders))
        .with_state(state)
}

fn validated<T: Validate>(req: &T) -> ApiResult<()> {
    req.validate().map_err(|e| EcommerceError::from(e).into())
}

async fn get_cart(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.checkout.load_cart(id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 9999))]
    pub quantity: u32,
}

async fn add_to_cart(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<AddToCartRequest>) -> ApiResult<(StatusCode, Json<Cart>)> {
    validated(&r)?;
    let product = s.store.product(r.product_id).await.map_err(EcommerceError::from)?.ok_or(EcommerceError::ProductNotFound(r.product_id))?;
    if !product.is_purchasable() { return Err(EcommerceError::ProductUnavailable(product.id()).into()); }
    let mut cart = s.store.cart(id).await.map_err(EcommerceError::from)?.unwrap_or_else(|| Cart::new(id));
    cart.add_item(product.id(), r.quantity).map_err(EcommerceError::from)?;
    s.store.save_cart(&cart).await.map_err(EcommerceError::from)?;
    Ok((StatusCode::CREATED, Json(cart)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartRequest {
    pub customer_id: Option<Uuid>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 64))]
    pub discount_code: Option<String>,
    pub items: Option<Vec<QuantityUpdate>>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityUpdate { pub product_id: Uuid, pub quantity: u32 }

async fn update_cart(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<UpdateCartRequest>) -> ApiResult<Json<Cart>> {
    validated(&r)?;
    let mut cart = s.checkout.load_cart(id).await?;
    match (r.customer_id, r.email) {
        (Some(customer_id), Some(email)) => cart.assign_customer(customer_id, email),
        (None, None) => {}
        _ => return Err(EcommerceError::Validation("customer_id and email go together".into()).into()),
    }
    if let Some(code) = r.discount_code { cart.apply_discount_code(Some(code)); }
    for u in r.items.unwrap_or_default() {
        cart.update_quantity(u.product_id, u.quantity).map_err(EcommerceError::from)?;
    }
    s.store.save_cart(&cart).await.map_err(EcommerceError::from)?;
    Ok(Json(cart))
}

async fn clear_cart(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.store.delete_cart(id).await.map_err(EcommerceError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn quote_cart(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Quote>> {
    Ok(Json(s.checkout.quote(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct DatafastCheckoutRequest { pub cart_id: Uuid, pub payment: DatafastPayment }

async fn datafast_checkout(State(s): State<AppState>, Json(r): Json<DatafastCheckoutRequest>) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = s.datafast.complete(r.cart_id, r.payment).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn deuna_webhook(State(s): State<AppState>, Json(r): Json<DeunaWebhook>) -> ApiResult<Json<WebhookOutcome>> {
    Ok(Json(s.deuna.handle(r).await?))
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: u64, pub page: u32 }

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let (data, total) = s.store.orders(page, per_page).await.map_err(EcommerceError::from)?;
    Ok(Json(PaginatedResponse { data, total, page }))
}

async fn find_order(s: &AppState, id: Uuid) -> ApiResult<Order> {
    Ok(s.store.order(id).await.map_err(EcommerceError::from)?.ok_or(EcommerceError::OrderNotFound)?)
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(find_order(&s, id).await?))
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse { pub left: Uuid, pub right: Uuid, pub matches: bool, pub discrepancies: Vec<Discrepancy> }

async fn reconcile_orders(State(s): State<AppState>, Path((id, other)): Path<(Uuid, Uuid)>) -> ApiResult<Json<ReconcileResponse>> {
    let (a, b) = (find_order(&s, id).await?, find_order(&s, other).await?);
    let discrepancies = reconcile(&a, &b);
    Ok(Json(ReconcileResponse { left: id, right: other, matches: discrepancies.is_empty(), discrepancies }))
}
