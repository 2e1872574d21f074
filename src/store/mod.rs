//! Persistence ports and their implementations.
//!
//! `MemoryStore` backs tests and database-less runs; `PgStore` is the
//! Postgres implementation used in production.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Author, Book, Cart, Category, Order, Review, ReviewStatus};
use crate::domain::pricing::Voucher;
use crate::domain::value_objects::VoucherCode;
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    /// 1-based page, size clamped to `1..=MAX_PAGE_SIZE` (default 20).
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, MAX_PAGE_SIZE) }
    }
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Clone, Debug, Default)]
pub struct BookFilter {
    pub category_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    /// Case-insensitive title match.
    pub search: Option<String>,
    /// When false only active books are returned.
    pub include_inactive: bool,
    pub page: Page,
}

impl BookFilter {
    pub(crate) fn matches(&self, book: &Book) -> bool {
        use crate::domain::aggregates::BookStatus;
        (self.include_inactive || book.status() == BookStatus::Active)
            && self.category_id.map_or(true, |c| book.category_id() == Some(c))
            && self.author_id.map_or(true, |a| book.author_ids().contains(&a))
            && self.search.as_ref().map_or(true, |s| book.title().to_lowercase().contains(&s.to_lowercase()))
    }
}

/// Stock reservation and voucher redemption that must commit together with the order.
#[derive(Clone, Debug)]
pub struct OrderPlacement {
    pub order: Order,
    pub session_id: String,
    pub voucher: Option<Voucher>,
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn insert_book(&self, book: &Book) -> Result<()>;
    /// Persists everything but stock, which only moves through `adjust_stock`
    /// and order placement/cancellation.
    async fn save_book(&self, book: &Book) -> Result<()>;
    /// Adds `delta` (negative removes) to the stored stock and returns the new
    /// level. Fails with `InsufficientStock` instead of going below zero.
    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<u32>;
    async fn get_book(&self, id: Uuid) -> Result<Option<Book>>;
    async fn list_books(&self, filter: &BookFilter) -> Result<(Vec<Book>, u64)>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn insert_author(&self, author: &Author) -> Result<()>;
    async fn get_author(&self, id: Uuid) -> Result<Option<Author>>;
    async fn list_authors(&self) -> Result<Vec<Author>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Returns an empty cart for unknown sessions.
    async fn load_cart(&self, session_id: &str, currency: &str) -> Result<Cart>;
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
    async fn clear_cart(&self, session_id: &str) -> Result<()>;
}

#[async_trait]
pub trait VoucherRepository: Send + Sync {
    /// Fails with `VoucherExists` when the code is taken.
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<()>;
    async fn save_voucher(&self, voucher: &Voucher) -> Result<()>;
    async fn find_voucher(&self, code: &VoucherCode) -> Result<Option<Voucher>>;
    async fn list_vouchers(&self) -> Result<Vec<Voucher>>;
    /// How many times `user_id` has redeemed the voucher.
    async fn user_redemptions(&self, code: &VoucherCode, user_id: &str) -> Result<u32>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Atomically decrements stock, redeems the voucher (re-checking its usage
    /// limits), stores the order and clears the session cart.
    async fn place_order(&self, placement: &OrderPlacement) -> Result<()>;
    async fn save_order(&self, order: &Order) -> Result<()>;
    /// Stores an order already moved to `Cancelled` and puts its items back in
    /// stock, only if the stored order is still pending or confirmed.
    async fn cancel_order(&self, order: &Order) -> Result<()>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn list_orders(&self, user_id: Option<&str>, page: Page) -> Result<(Vec<Order>, u64)>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fails with `ReviewError::Duplicate` if the user already reviewed the book.
    async fn insert_review(&self, review: &Review) -> Result<()>;
    async fn save_review(&self, review: &Review) -> Result<()>;
    async fn get_review(&self, id: Uuid) -> Result<Option<Review>>;
    async fn list_reviews(&self, book_id: Option<Uuid>, status: Option<ReviewStatus>) -> Result<Vec<Review>>;
}

pub trait Store: BookRepository + CatalogRepository + CartRepository + VoucherRepository + OrderRepository + ReviewRepository {}

impl<T> Store for T where T: BookRepository + CatalogRepository + CartRepository + VoucherRepository + OrderRepository + ReviewRepository {}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, per_page: MAX_PAGE_SIZE });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
        assert_eq!(Page::default().per_page, 20);
    }

    #[test]
    fn test_offset_of_last_page_does_not_overflow() {
        let page = Page::new(Some(u32::MAX), Some(MAX_PAGE_SIZE));
        assert_eq!(page.offset(), (u64::from(u32::MAX) - 1) * 100);
    }
}
