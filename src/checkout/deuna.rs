//! DeUna: payment happens out of band and the provider notifies us through
//! a webhook. The webhook may arrive more than once and in any status.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{CheckoutService, ConfirmedPayment};
use crate::domain::aggregates::{Order, PaymentGateway};
use crate::error::{EcommerceError, Result};

const APPROVED_STATUSES: [&str; 3] = ["SUCCESS", "APPROVED", "COMPLETED"];

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeunaWebhook {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    #[validate(length(min = 1, max = 64))]
    pub transaction_id: String,
    /// The cart id we handed to DeUna when the payment request was created.
    pub internal_transaction_reference: String,
    pub amount: Decimal,
}

impl DeunaWebhook {
    pub fn is_approved(&self) -> bool {
        APPROVED_STATUSES.iter().any(|s| s.eq_ignore_ascii_case(self.status.trim()))
    }

    pub fn cart_id(&self) -> Result<Uuid> {
        Uuid::parse_str(self.internal_transaction_reference.trim())
            .map_err(|_| EcommerceError::Validation(format!("internalTransactionReference {:?} is not a cart id", self.internal_transaction_reference)))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Created { order: Order },
    Duplicate { order: Order },
    Ignored { status: String },
}

impl WebhookOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self { Self::Created { order } | Self::Duplicate { order } => Some(order), Self::Ignored { .. } => None }
    }
}

#[derive(Clone)]
pub struct DeunaWebhookHandler {
    service: CheckoutService,
}

impl DeunaWebhookHandler {
    pub fn new(service: CheckoutService) -> Self { Self { service } }

    #[tracing::instrument(skip(self, webhook), fields(transaction_id = %webhook.transaction_id, status = %webhook.status))]
    pub async fn handle(&self, webhook: DeunaWebhook) -> Result<WebhookOutcome> {
        webhook.validate()?;
        if !webhook.is_approved() {
            tracing::info!("webhook acknowledged without order");
            return Ok(WebhookOutcome::Ignored { status: webhook.status });
        }
        if let Some(order) = self.service.existing_order(PaymentGateway::Deuna, &webhook.transaction_id).await? {
            tracing::info!(order_id = %order.id(), "duplicate webhook");
            return Ok(WebhookOutcome::Duplicate { order });
        }

        let cart_id = webhook.cart_id()?;
        let confirmed = ConfirmedPayment { gateway: PaymentGateway::Deuna, reference: webhook.transaction_id, amount: webhook.amount };
        let (order, created) = self.service.place_order(cart_id, confirmed).await?;
        Ok(if created { WebhookOutcome::Created { order } } else { WebhookOutcome::Duplicate { order } })
    }
}
