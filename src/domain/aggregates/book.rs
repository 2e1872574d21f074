//! Book Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::catalog::slugify;
use crate::domain::events::{BookEvent, DomainEvent};
use crate::domain::pricing::{compute_final_price, PricedItem};
use crate::domain::value_objects::{Isbn, Quantity};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Book {
    pub(crate) id: Uuid,
    pub(crate) isbn: Isbn,
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) description: Option<String>,
    pub(crate) author_ids: Vec<Uuid>,
    pub(crate) category_id: Option<Uuid>,
    pub(crate) publisher: Option<String>,
    pub(crate) publication_year: Option<i32>,
    pub(crate) pricing: PricedItem,
    pub(crate) stock: Quantity,
    pub(crate) status: BookStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus { #[default] Draft, Active, Archived }

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "draft" => Some(Self::Draft), "active" => Some(Self::Active), "archived" => Some(Self::Archived), _ => None }
    }
}

/// Descriptive fields that may be edited after creation.
#[derive(Clone, Debug, Default)]
pub struct BookDetails {
    pub title: String,
    pub description: Option<String>,
    pub author_ids: Vec<Uuid>,
    pub category_id: Option<Uuid>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
}

impl Book {
    pub fn create(isbn: Isbn, details: BookDetails, pricing: PricedItem) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut book = Self {
            id, isbn: isbn.clone(), slug: slugify(&details.title), title: details.title,
            description: details.description, author_ids: details.author_ids, category_id: details.category_id,
            publisher: details.publisher, publication_year: details.publication_year,
            pricing, stock: Quantity::default(), status: BookStatus::Draft,
            created_at: now, updated_at: now, events: vec![],
        };
        book.raise_event(DomainEvent::Book(BookEvent::Created { book_id: id, isbn }));
        book
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn isbn(&self) -> &Isbn { &self.isbn }
    pub fn title(&self) -> &str { &self.title }
    pub fn slug(&self) -> &str { &self.slug }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn author_ids(&self) -> &[Uuid] { &self.author_ids }
    pub fn category_id(&self) -> Option<Uuid> { self.category_id }
    pub fn publisher(&self) -> Option<&str> { self.publisher.as_deref() }
    pub fn publication_year(&self) -> Option<i32> { self.publication_year }
    pub fn pricing(&self) -> &PricedItem { &self.pricing }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn status(&self) -> BookStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn is_purchasable(&self) -> bool { self.status == BookStatus::Active && self.is_in_stock() }

    /// Price a customer pays for one copy at `now`.
    pub fn current_price(&self, now: DateTime<Utc>) -> Decimal { compute_final_price(&self.pricing, now) }

    pub fn publish(&mut self) -> Result<(), BookError> {
        if self.title.trim().is_empty() { return Err(BookError::MissingTitle); }
        self.status = BookStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Book(BookEvent::Published { book_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) { self.status = BookStatus::Archived; self.touch(); }

    pub fn update_details(&mut self, details: BookDetails) -> Result<(), BookError> {
        if details.title.trim().is_empty() { return Err(BookError::MissingTitle); }
        self.slug = slugify(&details.title);
        self.title = details.title;
        self.description = details.description;
        self.author_ids = details.author_ids;
        self.category_id = details.category_id;
        self.publisher = details.publisher;
        self.publication_year = details.publication_year;
        self.touch();
        Ok(())
    }

    pub fn set_pricing(&mut self, pricing: PricedItem) -> Result<(), BookError> {
        if pricing.base_price < Decimal::ZERO { return Err(BookError::NegativePrice); }
        if let (Some(start), Some(end)) = (pricing.sale_start, pricing.sale_end) {
            if start > end { return Err(BookError::InvalidSaleWindow); }
        }
        let price_changed = pricing.base_price != self.pricing.base_price;
        self.pricing = pricing;
        self.touch();
        if price_changed {
            self.raise_event(DomainEvent::Book(BookEvent::PriceChanged { book_id: self.id, base_price: self.pricing.base_price }));
        }
        Ok(())
    }

    pub fn add_stock(&mut self, qty: u32) {
        self.stock = self.stock.add(qty);
        self.touch();
        self.raise_event(DomainEvent::Book(BookEvent::StockAdded { book_id: self.id, quantity: qty }));
    }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), BookError> {
        self.stock = self.stock.subtract(qty).ok_or(BookError::InsufficientStock)?;
        self.touch();
        self.raise_event(DomainEvent::Book(BookEvent::StockRemoved { book_id: self.id, quantity: qty }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("Book title is required")]
    MissingTitle,
    #[error("Price cannot be negative")]
    NegativePrice,
    #[error("Sale start must not be after sale end")]
    InvalidSaleWindow,
    #[error("Insufficient stock")]
    InsufficientStock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn book() -> Book {
        let details = BookDetails { title: "Dế Mèn Phiêu Lưu Ký".into(), ..Default::default() };
        Book::create(Isbn::new("9786042112345").unwrap(), details, PricedItem::new(dec!(68000)))
    }

    #[test]
    fn test_book_create() {
        let mut b = book();
        assert_eq!(b.slug(), "de-men-phieu-luu-ky");
        assert_eq!(b.status(), BookStatus::Draft);
        assert_eq!(b.take_events().len(), 1);
    }

    #[test]
    fn test_stock() {
        let mut b = book();
        b.add_stock(10);
        b.publish().unwrap();
        assert!(b.is_purchasable());
        b.remove_stock(4).unwrap();
        assert_eq!(b.stock().value(), 6);
        assert_eq!(b.remove_stock(7), Err(BookError::InsufficientStock));
    }

    #[test]
    fn test_current_price_follows_sale() {
        let mut b = book();
        let now = Utc::now();
        b.set_pricing(PricedItem::new(dec!(68000)).with_percentage(dec!(25)).on_sale(Some(now), Some(now + Duration::days(7)))).unwrap();
        assert_eq!(b.current_price(now + Duration::days(1)), dec!(51000));
        assert_eq!(b.current_price(now + Duration::days(8)), dec!(68000));
    }

    #[test]
    fn test_rejects_bad_pricing() {
        let mut b = book();
        let now = Utc::now();
        assert_eq!(b.set_pricing(PricedItem::new(dec!(-1))), Err(BookError::NegativePrice));
        let inverted = PricedItem::new(dec!(1)).on_sale(Some(now), Some(now - Duration::days(1)));
        assert_eq!(b.set_pricing(inverted), Err(BookError::InvalidSaleWindow));
    }
}
