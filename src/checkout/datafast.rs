//! Datafast: the customer pays in the Datafast widget and comes back with
//! the payment result; the order is created within that same request.

use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::OnceLock;
use uuid::Uuid;
use validator::Validate;

use super::{CheckoutService, ConfirmedPayment};
use crate::domain::aggregates::{Order, PaymentGateway};
use crate::error::{EcommerceError, Result};

/// Result of a Datafast payment, as resolved from the widget's `resourcePath`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatafastPayment {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 32))]
    pub result_code: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
}

/// Successful or successfully-pending-review transaction codes.
pub fn is_success_code(code: &str) -> bool {
    static SUCCESS: OnceLock<Regex> = OnceLock::new();
    SUCCESS
        .get_or_init(|| Regex::new(r"^(000\.000\.|000\.100\.1|000\.[36])").expect("static pattern"))
        .is_match(code)
}

#[derive(Clone)]
pub struct DatafastCheckout {
    service: CheckoutService,
}

impl DatafastCheckout {
    pub fn new(service: CheckoutService) -> Self { Self { service } }

    /// Completes checkout for `cart_id`. Repeating the call with the same
    /// payment id returns the order created the first time.
    #[tracing::instrument(skip(self, payment), fields(payment_id = %payment.id, result_code = %payment.result_code))]
    pub async fn complete(&self, cart_id: Uuid, payment: DatafastPayment) -> Result<Order> {
        payment.validate()?;
        if let Some(order) = self.service.existing_order(PaymentGateway::Datafast, &payment.id).await? {
            tracing::info!(order_id = %order.id(), "payment already processed");
            return Ok(order);
        }
        if !is_success_code(&payment.result_code) {
            tracing::info!(description = %payment.description, "payment declined");
            return Err(EcommerceError::PaymentDeclined { code: payment.result_code, description: payment.description });
        }

        let confirmed = ConfirmedPayment { gateway: PaymentGateway::Datafast, reference: payment.id, amount: payment.amount };
        let (order, _) = self.service.place_order(cart_id, confirmed).await?;
        Ok(order)
    }
}
