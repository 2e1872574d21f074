//! In-process store

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookFilter, BookRepository, CartRepository, CatalogRepository, OrderPlacement, OrderRepository, Page, ReviewRepository, VoucherRepository};
use crate::domain::aggregates::{Author, Book, Cart, Category, Order, OrderError, OrderStatus, Review, ReviewError, ReviewStatus};
use crate::domain::pricing::{Voucher, VoucherRejection};
use crate::domain::value_objects::{Quantity, VoucherCode};
use crate::{BookstoreError, Result};

#[derive(Debug, Clone)]
struct Redemption {
    code: VoucherCode,
    user_id: String,
}

#[derive(Default)]
struct Inner {
    books: HashMap<Uuid, Book>,
    categories: Vec<Category>,
    authors: Vec<Author>,
    carts: HashMap<String, Cart>,
    vouchers: HashMap<VoucherCode, Voucher>,
    redemptions: Vec<Redemption>,
    orders: Vec<Order>,
    reviews: Vec<Review>,
}

impl Inner {
    fn redemptions_by(&self, code: &VoucherCode, user_id: &str) -> u32 {
        self.redemptions.iter().filter(|r| &r.code == code && r.user_id == user_id).count() as u32
    }
}

/// Single-lock store; every operation, including order placement, is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn paginate<T: Clone>(items: &[T], page: Page) -> Vec<T> {
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    items.iter().skip(skip).take(page.per_page as usize).cloned().collect()
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn insert_book(&self, book: &Book) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.books.values().any(|b| b.isbn() == book.isbn()) {
            return Err(BookstoreError::Validation(format!("ISBN {} already exists", book.isbn())));
        }
        let mut stored = book.clone();
        stored.events.clear();
        inner.books.insert(book.id(), stored);
        Ok(())
    }

    async fn save_book(&self, book: &Book) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner.books.get_mut(&book.id()).ok_or(BookstoreError::BookNotFound)?;
        let stock = slot.stock;
        *slot = book.clone();
        slot.stock = stock;
        slot.events.clear();
        Ok(())
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<u32> {
        let mut inner = self.inner.write().await;
        let book = inner.books.get_mut(&id).ok_or(BookstoreError::BookNotFound)?;
        let level = i64::from(book.stock.value()) + delta;
        if level < 0 { return Err(BookstoreError::InsufficientStock(id)); }
        let level = u32::try_from(level).unwrap_or(u32::MAX);
        book.stock = Quantity::new(level);
        book.updated_at = Utc::now();
        Ok(level)
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(self.inner.read().await.books.get(&id).cloned())
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<(Vec<Book>, u64)> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Book> = inner.books.values().filter(|b| filter.matches(b)).cloned().collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        let total = matching.len() as u64;
        Ok((paginate(&matching, filter.page), total))
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_category(&self, category: &Category) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.categories.iter().any(|c| c.slug == category.slug) {
            return Err(BookstoreError::Validation(format!("category '{}' already exists", category.slug)));
        }
        inner.categories.push(category.clone());
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.inner.read().await.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut cats = self.inner.read().await.categories.clone();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cats)
    }

    async fn insert_author(&self, author: &Author) -> Result<()> {
        self.inner.write().await.authors.push(author.clone());
        Ok(())
    }

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>> {
        Ok(self.inner.read().await.authors.iter().find(|a| a.id == id).cloned())
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        let mut authors = self.inner.read().await.authors.clone();
        authors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(authors)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn load_cart(&self, session_id: &str, currency: &str) -> Result<Cart> {
        Ok(self.inner.read().await.carts.get(session_id).cloned().unwrap_or_else(|| Cart::new(session_id, currency)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.inner.write().await.carts.insert(cart.session_id().to_string(), cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, session_id: &str) -> Result<()> {
        self.inner.write().await.carts.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl VoucherRepository for MemoryStore {
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.vouchers.contains_key(&voucher.code) { return Err(BookstoreError::VoucherExists); }
        inner.vouchers.insert(voucher.code.clone(), voucher.clone());
        Ok(())
    }

    async fn save_voucher(&self, voucher: &Voucher) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner.vouchers.get_mut(&voucher.code).ok_or(BookstoreError::VoucherNotFound)?;
        let used_count = slot.used_count;
        if voucher.usage_limit.map_or(false, |limit| limit < used_count) {
            return Err(BookstoreError::Validation(format!("usage_limit is below the {used_count} redemptions already made")));
        }
        *slot = voucher.clone();
        slot.used_count = used_count;
        Ok(())
    }

    async fn find_voucher(&self, code: &VoucherCode) -> Result<Option<Voucher>> {
        Ok(self.inner.read().await.vouchers.get(code).cloned())
    }

    async fn list_vouchers(&self) -> Result<Vec<Voucher>> {
        let mut vouchers: Vec<Voucher> = self.inner.read().await.vouchers.values().cloned().collect();
        vouchers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(vouchers)
    }

    async fn user_redemptions(&self, code: &VoucherCode, user_id: &str) -> Result<u32> {
        Ok(self.inner.read().await.redemptions_by(code, user_id))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place_order(&self, placement: &OrderPlacement) -> Result<()> {
        let mut inner = self.inner.write().await;
        let order = &placement.order;

        let mut wanted: HashMap<Uuid, u32> = HashMap::new();
        for item in order.items() {
            *wanted.entry(item.book_id).or_default() += item.quantity;
        }
        for (book_id, qty) in &wanted {
            let book = inner.books.get(book_id).ok_or(BookstoreError::BookNotFound)?;
            if book.stock().value() < *qty { return Err(BookstoreError::InsufficientStock(*book_id)); }
        }

        if let Some(voucher) = &placement.voucher {
            let stored = inner.vouchers.get(&voucher.code).ok_or(BookstoreError::VoucherNotFound)?;
            if stored.is_exhausted() { return Err(VoucherRejection::UsageLimitReached.into()); }
            if let Some(limit) = stored.usage_limit_per_user {
                if inner.redemptions_by(&voucher.code, order.user_id()) >= limit {
                    return Err(VoucherRejection::PerUserLimitReached.into());
                }
            }
        }

        for (book_id, qty) in wanted {
            if let Some(book) = inner.books.get_mut(&book_id) {
                book.remove_stock(qty)?;
                book.events.clear();
            }
        }
        if let Some(voucher) = &placement.voucher {
            if let Some(stored) = inner.vouchers.get_mut(&voucher.code) {
                stored.used_count += 1;
                stored.updated_at = Utc::now();
            }
            inner.redemptions.push(Redemption { code: voucher.code.clone(), user_id: order.user_id().to_string() });
        }
        let mut stored = order.clone();
        stored.events.clear();
        inner.orders.push(stored);
        inner.carts.remove(&placement.session_id);
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner.orders.iter_mut().find(|o| o.id() == order.id()).ok_or(BookstoreError::OrderNotFound)?;
        *slot = order.clone();
        slot.events.clear();
        Ok(())
    }

    async fn cancel_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner.orders.iter_mut().find(|o| o.id() == order.id()).ok_or(BookstoreError::OrderNotFound)?;
        if !matches!(slot.status(), OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(OrderError::InvalidTransition { from: slot.status(), to: OrderStatus::Cancelled.as_str() }.into());
        }
        *slot = order.clone();
        slot.events.clear();
        for item in order.items() {
            if let Some(book) = inner.books.get_mut(&item.book_id) {
                book.stock = book.stock.add(item.quantity);
                book.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.iter().find(|o| o.id() == id).cloned())
    }

    async fn list_orders(&self, user_id: Option<&str>, page: Page) -> Result<(Vec<Order>, u64)> {
        let inner = self.inner.read().await;
        let matching: Vec<Order> = inner.orders.iter().rev().filter(|o| user_id.map_or(true, |u| o.user_id() == u)).cloned().collect();
        let total = matching.len() as u64;
        Ok((paginate(&matching, page), total))
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert_review(&self, review: &Review) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.reviews.iter().any(|r| r.book_id() == review.book_id() && r.user_id() == review.user_id()) {
            return Err(ReviewError::Duplicate.into());
        }
        let mut stored = review.clone();
        stored.events.clear();
        inner.reviews.push(stored);
        Ok(())
    }

    async fn save_review(&self, review: &Review) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner.reviews.iter_mut().find(|r| r.id() == review.id()).ok_or(BookstoreError::ReviewNotFound)?;
        *slot = review.clone();
        slot.events.clear();
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        Ok(self.inner.read().await.reviews.iter().find(|r| r.id() == id).cloned())
    }

    async fn list_reviews(&self, book_id: Option<Uuid>, status: Option<ReviewStatus>) -> Result<Vec<Review>> {
        Ok(self.inner.read().await.reviews.iter()
            .filter(|r| book_id.map_or(true, |b| r.book_id() == b) && status.map_or(true, |s| r.status() == s))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{BookDetails, LineItem, PaymentMethod, Recipient};
    use crate::domain::pricing::{PricedItem, VoucherType};
    use crate::domain::value_objects::{Isbn, Money};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    async fn seeded_book(store: &MemoryStore, stock: u32) -> Book {
        let mut book = Book::create(Isbn::new("9786041085251").unwrap(), BookDetails { title: "Mắt Biếc".into(), ..Default::default() }, PricedItem::new(dec!(110000)));
        book.add_stock(stock);
        book.publish().unwrap();
        store.insert_book(&book).await.unwrap();
        book
    }

    fn order_for(book: &Book, user: &str, qty: u32) -> Order {
        let price = Money::vnd(dec!(110000));
        let line = LineItem { book_id: book.id(), title: book.title().into(), isbn: book.isbn().to_string(), quantity: qty, total: price.multiply(qty), unit_price: price };
        Order::place(Order::generate_number(), user, Recipient::default(), vec![line], PaymentMethod::Cod, "VND").unwrap()
    }

    #[tokio::test]
    async fn test_place_order_reserves_stock_and_redeems() {
        let store = MemoryStore::new();
        let book = seeded_book(&store, 3).await;
        let now = Utc::now();
        let mut voucher = Voucher::new(VoucherCode::new("MOTLAN").unwrap(), VoucherType::FixedAmount, dec!(10000), now - Duration::days(1), now + Duration::days(1));
        voucher.usage_limit_per_user = Some(1);
        store.insert_voucher(&voucher).await.unwrap();

        let placement = OrderPlacement { order: order_for(&book, "u1", 2), session_id: "s1".into(), voucher: Some(voucher.clone()) };
        store.place_order(&placement).await.unwrap();
        assert_eq!(store.get_book(book.id()).await.unwrap().unwrap().stock().value(), 1);
        assert_eq!(store.find_voucher(&voucher.code).await.unwrap().unwrap().used_count, 1);
        assert_eq!(store.user_redemptions(&voucher.code, "u1").await.unwrap(), 1);

        let again = OrderPlacement { order: order_for(&book, "u1", 1), session_id: "s1".into(), voucher: Some(voucher) };
        assert!(matches!(store.place_order(&again).await, Err(BookstoreError::Voucher(VoucherRejection::PerUserLimitReached))));
        assert_eq!(store.get_book(book.id()).await.unwrap().unwrap().stock().value(), 1);
    }

    #[tokio::test]
    async fn test_place_order_rejects_oversell() {
        let store = MemoryStore::new();
        let book = seeded_book(&store, 1).await;
        let placement = OrderPlacement { order: order_for(&book, "u1", 2), session_id: "s1".into(), voucher: None };
        assert!(matches!(store.place_order(&placement).await, Err(BookstoreError::InsufficientStock(id)) if id == book.id()));
        assert_eq!(store.list_orders(None, Page::default()).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_global_limit_rechecked_at_placement() {
        let store = MemoryStore::new();
        let book = seeded_book(&store, 5).await;
        let now = Utc::now();
        let mut voucher = Voucher::new(VoucherCode::new("FLASH").unwrap(), VoucherType::Percentage, dec!(10), now - Duration::days(1), now + Duration::days(1));
        voucher.usage_limit = Some(1);
        store.insert_voucher(&voucher).await.unwrap();
        let first = OrderPlacement { order: order_for(&book, "a", 1), session_id: "sa".into(), voucher: Some(voucher.clone()) };
        let second = OrderPlacement { order: order_for(&book, "b", 1), session_id: "sb".into(), voucher: Some(voucher) };
        store.place_order(&first).await.unwrap();
        assert!(matches!(store.place_order(&second).await, Err(BookstoreError::Voucher(VoucherRejection::UsageLimitReached))));
    }

    #[tokio::test]
    async fn test_cancel_checks_stored_status() {
        let store = MemoryStore::new();
        let book = seeded_book(&store, 5).await;
        let placement = OrderPlacement { order: order_for(&book, "u1", 2), session_id: "s1".into(), voucher: None };
        store.place_order(&placement).await.unwrap();

        let mut first = store.get_order(placement.order.id()).await.unwrap().unwrap();
        let mut stale = first.clone();
        first.cancel().unwrap();
        stale.cancel().unwrap();
        store.cancel_order(&first).await.unwrap();
        let err = store.cancel_order(&stale).await.unwrap_err();
        assert!(matches!(err, BookstoreError::Order(OrderError::InvalidTransition { from: OrderStatus::Cancelled, .. })));
        assert_eq!(store.get_book(book.id()).await.unwrap().unwrap().stock().value(), 5);
    }

    #[tokio::test]
    async fn test_save_book_keeps_stored_stock() {
        let store = MemoryStore::new();
        let book = seeded_book(&store, 4).await;
        let mut edited = store.get_book(book.id()).await.unwrap().unwrap();
        let placement = OrderPlacement { order: order_for(&book, "u1", 3), session_id: "s1".into(), voucher: None };
        store.place_order(&placement).await.unwrap();

        edited.update_details(BookDetails { title: "Mắt Biếc (tái bản)".into(), ..Default::default() }).unwrap();
        store.save_book(&edited).await.unwrap();
        let stored = store.get_book(book.id()).await.unwrap().unwrap();
        assert_eq!(stored.title(), "Mắt Biếc (tái bản)");
        assert_eq!(stored.stock().value(), 1);

        assert_eq!(store.adjust_stock(book.id(), 6).await.unwrap(), 7);
        assert!(matches!(store.adjust_stock(book.id(), -8).await, Err(BookstoreError::InsufficientStock(_))));
        assert_eq!(store.adjust_stock(book.id(), -7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_review_rejected() {
        let store = MemoryStore::new();
        let rating = crate::domain::value_objects::Rating::new(4).unwrap();
        let book_id = Uuid::now_v7();
        store.insert_review(&Review::submit(book_id, "u1", rating, None).unwrap()).await.unwrap();
        let dup = Review::submit(book_id, "u1", rating, None).unwrap();
        assert!(matches!(store.insert_review(&dup).await, Err(BookstoreError::Review(ReviewError::Duplicate))));
    }
}
