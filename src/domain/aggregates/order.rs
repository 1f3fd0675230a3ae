//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::{ItemBreakdown, PriceBreakdown};

/// Order lines are stored exactly as priced.
pub type OrderItem = ItemBreakdown;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    order_number: u64,
    customer_id: Uuid,
    email: String,
    gateway: PaymentGateway,
    payment_reference: String,
    status: OrderStatus,
    payment: PaymentStatus,
    breakdown: PriceBreakdown,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentGateway { Datafast, Deuna }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Paid, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid, Refunded }

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $text),+ } }
        }
        impl std::str::FromStr for $ty {
            type Err = OrderError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s { $($text => Ok(Self::$variant),)+ other => Err(OrderError::UnknownValue(other.to_string())) }
            }
        }
    };
}

text_enum!(PaymentGateway { Datafast => "datafast", Deuna => "deuna" });
text_enum!(OrderStatus { Pending => "pending", Paid => "paid", Shipped => "shipped", Delivered => "delivered", Cancelled => "cancelled" });
text_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Refunded => "refunded" });

impl Order {
    /// Creates an order for a payment the gateway already confirmed.
    pub fn place_paid(order_number: u64, customer_id: Uuid, email: impl Into<String>, gateway: PaymentGateway, payment_reference: impl Into<String>, breakdown: PriceBreakdown) -> Result<Self, OrderError> {
        if breakdown.items.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), order_number, customer_id, email: email.into(), gateway,
            payment_reference: payment_reference.into(), status: OrderStatus::Pending, payment: PaymentStatus::Pending,
            breakdown, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number, gateway, total: order.breakdown.total,
        }));
        order.mark_paid()?;
        Ok(order)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(id: Uuid, order_number: u64, customer_id: Uuid, email: String, gateway: PaymentGateway, payment_reference: String, status: OrderStatus, payment: PaymentStatus, breakdown: PriceBreakdown, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, order_number, customer_id, email, gateway, payment_reference, status, payment, breakdown, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> u64 { self.order_number }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn email(&self) -> &str { &self.email }
    pub fn gateway(&self) -> PaymentGateway { self.gateway }
    pub fn payment_reference(&self) -> &str { &self.payment_reference }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment }
    pub fn breakdown(&self) -> &PriceBreakdown { &self.breakdown }
    pub fn items(&self) -> &[OrderItem] { &self.breakdown.items }
    pub fn total(&self) -> rust_decimal::Decimal { self.breakdown.total }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Paid }); }
        self.payment = PaymentStatus::Paid;
        self.status = OrderStatus::Paid;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, payment_reference: self.payment_reference.clone() }));
        Ok(())
    }

    pub fn ship(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Paid { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Shipped }); }
        self.status = OrderStatus::Shipped;
        self.touch();
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Shipped { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Delivered }); }
        self.status = OrderStatus::Delivered;
        self.touch();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if matches!(self.status, OrderStatus::Delivered | OrderStatus::Cancelled) { return Err(OrderError::CannotCancel); }
        if self.payment == PaymentStatus::Paid { self.payment = PaymentStatus::Refunded; }
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError { NoItems, CannotCancel, InvalidTransition { from: OrderStatus, to: OrderStatus }, UnknownValue(String) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::CannotCancel => write!(f, "Cannot cancel"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {} to {}", from.as_str(), to.as_str()),
            Self::UnknownValue(v) => write!(f, "Unknown value: {}", v),
        }
    }
}
