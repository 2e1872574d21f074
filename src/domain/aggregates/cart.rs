//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// Shopping cart keyed by the visitor's session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub(crate) session_id: String,
    pub(crate) items: Vec<CartItem>,
    pub(crate) subtotal: Money,
    pub(crate) currency: String,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub book_id: Uuid,
    pub title: String,
    pub quantity: u32,
    /// Price when the item was added; checkout re-prices from the catalog.
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(session_id: impl Into<String>, currency: &str) -> Self {
        Self {
            session_id: session_id.into(), items: vec![], subtotal: Money::zero(currency),
            currency: currency.to_string(), updated_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.book_id == item.book_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            existing.unit_price = item.unit_price;
        } else {
            self.items.push(item);
        }
        self.recalculate();
        Ok(())
    }

    /// Sets the quantity of a line; zero removes it.
    pub fn update_quantity(&mut self, book_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let pos = self.items.iter().position(|i| i.book_id == book_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.remove(pos); }
        else { self.items[pos].quantity = quantity; }
        self.recalculate();
        Ok(())
    }

    pub fn remove_item(&mut self, book_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.book_id != book_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.recalculate();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.recalculate(); }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
        self.updated_at = Utc::now();
    }

    pub(crate) fn restore(session_id: String, currency: String, items: Vec<CartItem>, updated_at: DateTime<Utc>) -> Self {
        let mut cart = Self { session_id, subtotal: Money::zero(&currency), currency, items, updated_at };
        cart.subtotal = cart.items.iter().fold(Money::zero(&cart.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
        cart
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Item currency differs from cart currency")]
    CurrencyMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(book_id: Uuid, qty: u32) -> CartItem {
        CartItem { book_id, title: "Nhà Giả Kim".into(), quantity: qty, unit_price: Money::vnd(Decimal::new(79000, 0)) }
    }

    #[test]
    fn test_cart_operations() {
        let id = Uuid::now_v7();
        let mut cart = Cart::new("sess-1", "VND");
        cart.add_item(item(id, 2)).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(158000, 0));
        cart.add_item(item(id, 1)).unwrap();
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        cart.update_quantity(id, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_cart_errors() {
        let mut cart = Cart::new("sess-2", "VND");
        assert_eq!(cart.add_item(item(Uuid::now_v7(), 0)), Err(CartError::InvalidQuantity));
        assert_eq!(cart.remove_item(Uuid::now_v7()), Err(CartError::ItemNotFound));
        let mut usd = item(Uuid::now_v7(), 1);
        usd.unit_price = Money::new(Decimal::ONE, "USD");
        assert_eq!(cart.add_item(usd), Err(CartError::CurrencyMismatch));
    }
}
