//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::PaymentGateway;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "orders.placed",
            Self::Order(OrderEvent::Paid { .. }) => "orders.paid",
            Self::Order(OrderEvent::Cancelled { .. }) => "orders.cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: u64, gateway: PaymentGateway, total: Decimal },
    Paid { order_id: Uuid, payment_reference: String },
    Cancelled { order_id: Uuid },
}
