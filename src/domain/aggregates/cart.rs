//! Cart Aggregate
//!
//! A cart only records what the customer wants and how many. Prices are
//! read from the catalog when the cart is priced, never stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for a single line.
pub const MAX_LINE_QUANTITY: u32 = 9999;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: Uuid,
    customer_id: Option<Uuid>,
    email: Option<String>,
    items: Vec<CartItem>,
    discount_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

impl Cart {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self { id, customer_id: None, email: None, items: vec![], discount_code: None, created_at: now, updated_at: now }
    }

    pub fn for_customer(id: Uuid, customer_id: Uuid, email: impl Into<String>) -> Self {
        let mut cart = Self::new(id);
        cart.assign_customer(customer_id, email);
        cart
    }

    pub fn restore(id: Uuid, customer_id: Option<Uuid>, email: Option<String>, items: Vec<CartItem>, discount_code: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, customer_id, email, items, discount_code, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> Option<Uuid> { self.customer_id }
    pub fn email(&self) -> Option<&str> { self.email.as_deref() }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn discount_code(&self) -> Option<&str> { self.discount_code.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn assign_customer(&mut self, customer_id: Uuid, email: impl Into<String>) {
        self.customer_id = Some(customer_id);
        self.email = Some(email.into());
        self.touch();
    }

    /// Adds `quantity` units, merging with an existing line for the same product.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            let merged = existing.quantity.saturating_add(quantity);
            if merged > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
            existing.quantity = merged;
        } else {
            if quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
            self.items.push(CartItem { product_id, quantity });
        }
        self.touch();
        Ok(())
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.retain(|i| i.product_id != product_id); }
        else { item.quantity = quantity; }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn apply_discount_code(&mut self, code: Option<String>) {
        self.discount_code = code.map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty());
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound, InvalidQuantity }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::ItemNotFound => write!(f, "Item not found"), Self::InvalidQuantity => write!(f, "Invalid quantity") }
    }
}
