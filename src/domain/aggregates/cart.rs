//! Cart Aggregate
//!
//! The cart lives in the browser; what reaches the server is an untrusted list of
//! `(product, quantity)` pairs. This aggregate normalises it before pricing.

use serde::Deserialize;
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// A cart with at most one line per product, every quantity at least one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<(Uuid, u32)>,
}

impl Cart {
    pub fn from_lines<I: IntoIterator<Item = CartLine>>(lines: I) -> Result<Self, CartError> {
        let mut cart = Self::default();
        for line in lines { cart.add_item(line.product_id, line.quantity)?; }
        if cart.is_empty() { return Err(CartError::Empty); }
        Ok(cart)
    }

    pub fn items(&self) -> &[(Uuid, u32)] { &self.items }
    pub fn product_ids(&self) -> Vec<Uuid> { self.items.iter().map(|(id, _)| *id).collect() }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity(product_id)); }
        match self.items.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, existing)) => *existing = existing.checked_add(quantity).ok_or(CartError::InvalidQuantity(product_id))?,
            None => self.items.push((product_id, quantity)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { Empty, InvalidQuantity(Uuid) }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Order must contain at least one item"),
            Self::InvalidQuantity(id) => write!(f, "Quantity for product {} must be at least 1", id),
        }
    }
}
