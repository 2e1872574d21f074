//! Postgres store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{BookFilter, BookRepository, CartRepository, CatalogRepository, OrderPlacement, OrderRepository, Page, ReviewRepository, VoucherRepository};
use crate::domain::aggregates::{Author, Book, BookStatus, Cart, CartItem, Category, LineItem, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus, Recipient, Review, ReviewError, ReviewStatus};
use crate::domain::pricing::{PricedItem, Voucher, VoucherRejection, VoucherType};
use crate::domain::value_objects::{Isbn, Money, Quantity, Rating, VoucherCode};
use crate::{BookstoreError, Result};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await.map_err(|e| BookstoreError::StorageError(e.to_string()))
    }
}

fn corrupt(what: &str, value: impl std::fmt::Display) -> BookstoreError {
    BookstoreError::StorageError(format!("invalid {what} in database: {value}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn to_u32(v: i32) -> u32 { v.max(0) as u32 }

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid, isbn: String, title: String, slug: String, description: Option<String>, author_ids: Vec<Uuid>,
    category_id: Option<Uuid>, publisher: Option<String>, publication_year: Option<i32>,
    base_price: Decimal, discount_percentage: Option<Decimal>, discount_amount: Decimal, is_on_sale: bool,
    sale_start: Option<DateTime<Utc>>, sale_end: Option<DateTime<Utc>>, stock: i32, status: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<BookRow> for Book {
    type Error = BookstoreError;
    fn try_from(r: BookRow) -> Result<Self> {
        Ok(Book {
            id: r.id, isbn: Isbn::new(&r.isbn).map_err(|_| corrupt("isbn", &r.isbn))?, title: r.title, slug: r.slug,
            description: r.description, author_ids: r.author_ids, category_id: r.category_id, publisher: r.publisher,
            publication_year: r.publication_year,
            pricing: PricedItem {
                base_price: r.base_price, discount_percentage: r.discount_percentage, discount_amount: r.discount_amount,
                is_on_sale: r.is_on_sale, sale_start: r.sale_start, sale_end: r.sale_end,
            },
            stock: Quantity::new(to_u32(r.stock)),
            status: BookStatus::parse(&r.status).ok_or_else(|| corrupt("book status", &r.status))?,
            created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow { id: Uuid, name: String, slug: String, description: Option<String>, parent_id: Option<Uuid>, created_at: DateTime<Utc> }

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self { Category { id: r.id, name: r.name, slug: r.slug, description: r.description, parent_id: r.parent_id, created_at: r.created_at } }
}

#[derive(sqlx::FromRow)]
struct AuthorRow { id: Uuid, name: String, slug: String, bio: Option<String>, created_at: DateTime<Utc> }

impl From<AuthorRow> for Author {
    fn from(r: AuthorRow) -> Self { Author { id: r.id, name: r.name, slug: r.slug, bio: r.bio, created_at: r.created_at } }
}

#[derive(sqlx::FromRow)]
struct CartItemRow { book_id: Uuid, title: String, quantity: i32, unit_price: Decimal, currency: String, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct VoucherRow {
    id: Uuid, code: String, description: Option<String>, voucher_type: String, value: Decimal,
    minimum_order_amount: Decimal, maximum_discount_amount: Option<Decimal>, usage_limit: Option<i32>,
    used_count: i32, usage_limit_per_user: Option<i32>, start_date: DateTime<Utc>, end_date: DateTime<Utc>,
    is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = BookstoreError;
    fn try_from(r: VoucherRow) -> Result<Self> {
        Ok(Voucher {
            id: r.id, code: VoucherCode::new(&r.code).map_err(|_| corrupt("voucher code", &r.code))?, description: r.description,
            voucher_type: VoucherType::parse(&r.voucher_type).ok_or_else(|| corrupt("voucher type", &r.voucher_type))?,
            value: r.value, minimum_order_amount: r.minimum_order_amount, maximum_discount_amount: r.maximum_discount_amount,
            usage_limit: r.usage_limit.map(to_u32), used_count: to_u32(r.used_count), usage_limit_per_user: r.usage_limit_per_user.map(to_u32),
            start_date: r.start_date, end_date: r.end_date, is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, user_id: String, recipient_name: String, recipient_phone: String, recipient_address: String,
    status: String, payment_method: String, payment_status: String, currency: String, subtotal: Decimal,
    voucher_code: Option<String>, discount: Decimal, shipping_fee: Decimal, total: Decimal, note: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { order_id: Uuid, book_id: Uuid, title: String, isbn: String, quantity: i32, unit_price: Decimal, total: Decimal }

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order> {
        let currency = self.currency;
        let voucher_code = match self.voucher_code {
            Some(c) => Some(VoucherCode::new(&c).map_err(|_| corrupt("voucher code", &c))?),
            None => None,
        };
        Ok(Order {
            id: self.id, order_number: self.order_number, user_id: self.user_id,
            recipient: Recipient { name: self.recipient_name, phone: self.recipient_phone, address: self.recipient_address },
            status: OrderStatus::parse(&self.status).ok_or_else(|| corrupt("order status", &self.status))?,
            payment_method: PaymentMethod::parse(&self.payment_method).ok_or_else(|| corrupt("payment method", &self.payment_method))?,
            payment_status: PaymentStatus::parse(&self.payment_status).ok_or_else(|| corrupt("payment status", &self.payment_status))?,
            items: items.into_iter().map(|i| LineItem {
                book_id: i.book_id, title: i.title, isbn: i.isbn, quantity: to_u32(i.quantity),
                unit_price: Money::new(i.unit_price, &currency), total: Money::new(i.total, &currency),
            }).collect(),
            subtotal: Money::new(self.subtotal, &currency), voucher_code, discount: Money::new(self.discount, &currency),
            shipping_fee: Money::new(self.shipping_fee, &currency), total: Money::new(self.total, &currency),
            note: self.note, created_at: self.created_at, updated_at: self.updated_at, events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid, book_id: Uuid, user_id: String, rating: i16, comment: Option<String>, status: String,
    moderation_note: Option<String>, created_at: DateTime<Utc>, moderated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = BookstoreError;
    fn try_from(r: ReviewRow) -> Result<Self> {
        let rating = u8::try_from(r.rating).ok().and_then(|v| Rating::new(v).ok()).ok_or_else(|| corrupt("rating", r.rating))?;
        Ok(Review {
            id: r.id, book_id: r.book_id, user_id: r.user_id, rating, comment: r.comment,
            status: ReviewStatus::parse(&r.status).ok_or_else(|| corrupt("review status", &r.status))?,
            moderation_note: r.moderation_note, created_at: r.created_at, moderated_at: r.moderated_at, events: vec![],
        })
    }
}

// =============================================================================
// Repositories
// =============================================================================

const BOOK_COLUMNS: &str = "id, isbn, title, slug, description, author_ids, category_id, publisher, publication_year, base_price, discount_percentage, discount_amount, is_on_sale, sale_start, sale_end, stock, status, created_at, updated_at";

const BOOK_FILTER: &str = "($1 OR status = 'active') AND ($2::uuid IS NULL OR category_id = $2) AND ($3::uuid IS NULL OR $3 = ANY(author_ids)) AND ($4::text IS NULL OR title ILIKE '%' || $4 || '%')";

#[async_trait]
impl BookRepository for PgStore {
    async fn insert_book(&self, b: &Book) -> Result<()> {
        let p = b.pricing();
        sqlx::query(&format!("INSERT INTO books ({BOOK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"))
            .bind(b.id()).bind(b.isbn().as_str()).bind(b.title()).bind(b.slug()).bind(b.description()).bind(b.author_ids())
            .bind(b.category_id()).bind(b.publisher()).bind(b.publication_year())
            .bind(p.base_price).bind(p.discount_percentage).bind(p.discount_amount).bind(p.is_on_sale).bind(p.sale_start).bind(p.sale_end)
            .bind(b.stock().value() as i32).bind(b.status().as_str()).bind(b.created_at()).bind(b.updated_at)
            .execute(&self.db).await
            .map_err(|e| if is_unique_violation(&e) { BookstoreError::Validation(format!("ISBN {} already exists", b.isbn())) } else { e.into() })?;
        Ok(())
    }

    async fn save_book(&self, b: &Book) -> Result<()> {
        let p = b.pricing();
        let done = sqlx::query("UPDATE books SET title = $2, slug = $3, description = $4, author_ids = $5, category_id = $6, publisher = $7, publication_year = $8, base_price = $9, discount_percentage = $10, discount_amount = $11, is_on_sale = $12, sale_start = $13, sale_end = $14, status = $15, updated_at = $16 WHERE id = $1")
            .bind(b.id()).bind(b.title()).bind(b.slug()).bind(b.description()).bind(b.author_ids()).bind(b.category_id())
            .bind(b.publisher()).bind(b.publication_year()).bind(p.base_price).bind(p.discount_percentage).bind(p.discount_amount)
            .bind(p.is_on_sale).bind(p.sale_start).bind(p.sale_end).bind(b.status().as_str()).bind(b.updated_at)
            .execute(&self.db).await?;
        if done.rows_affected() == 0 { return Err(BookstoreError::BookNotFound); }
        Ok(())
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<u32> {
        let level: Option<(i32,)> = sqlx::query_as("UPDATE books SET stock = stock + $2, updated_at = NOW() WHERE id = $1 AND stock + $2 >= 0 RETURNING stock")
            .bind(id).bind(delta).fetch_optional(&self.db).await?;
        match level {
            Some((level,)) => Ok(level.max(0) as u32),
            None => {
                let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM books WHERE id = $1").bind(id).fetch_optional(&self.db).await?;
                Err(if exists.is_some() { BookstoreError::InsufficientStock(id) } else { BookstoreError::BookNotFound })
            }
        }
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<Book>> {
        sqlx::query_as::<_, BookRow>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Book::try_from).transpose()
    }

    async fn list_books(&self, f: &BookFilter) -> Result<(Vec<Book>, u64)> {
        let rows = sqlx::query_as::<_, BookRow>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE {BOOK_FILTER} ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"))
            .bind(f.include_inactive).bind(f.category_id).bind(f.author_id).bind(f.search.as_deref())
            .bind(f.page.per_page as i64).bind(f.page.offset() as i64)
            .fetch_all(&self.db).await?;
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM books WHERE {BOOK_FILTER}"))
            .bind(f.include_inactive).bind(f.category_id).bind(f.author_id).bind(f.search.as_deref())
            .fetch_one(&self.db).await?;
        let books = rows.into_iter().map(Book::try_from).collect::<Result<Vec<_>>>()?;
        Ok((books, total.0.max(0) as u64))
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn insert_category(&self, c: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, slug, description, parent_id, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(c.id).bind(&c.name).bind(&c.slug).bind(&c.description).bind(c.parent_id).bind(c.created_at)
            .execute(&self.db).await
            .map_err(|e| if is_unique_violation(&e) { BookstoreError::Validation(format!("category '{}' already exists", c.slug)) } else { e.into() })?;
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1").bind(id).fetch_optional(&self.db).await?.map(Category::from))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name").fetch_all(&self.db).await?.into_iter().map(Category::from).collect())
    }

    async fn insert_author(&self, a: &Author) -> Result<()> {
        sqlx::query("INSERT INTO authors (id, name, slug, bio, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(a.id).bind(&a.name).bind(&a.slug).bind(&a.bio).bind(a.created_at)
            .execute(&self.db).await?;
        Ok(())
    }

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>> {
        Ok(sqlx::query_as::<_, AuthorRow>("SELECT * FROM authors WHERE id = $1").bind(id).fetch_optional(&self.db).await?.map(Author::from))
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        Ok(sqlx::query_as::<_, AuthorRow>("SELECT * FROM authors ORDER BY name").fetch_all(&self.db).await?.into_iter().map(Author::from).collect())
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn load_cart(&self, session_id: &str, currency: &str) -> Result<Cart> {
        let rows = sqlx::query_as::<_, CartItemRow>("SELECT book_id, title, quantity, unit_price, currency, updated_at FROM cart_items WHERE session_id = $1 ORDER BY position")
            .bind(session_id).fetch_all(&self.db).await?;
        if rows.is_empty() { return Ok(Cart::new(session_id, currency)); }
        let updated_at = rows.iter().map(|r| r.updated_at).max().unwrap_or_else(Utc::now);
        let currency = rows[0].currency.clone();
        let items = rows.into_iter().map(|r| CartItem { book_id: r.book_id, title: r.title, quantity: to_u32(r.quantity), unit_price: Money::new(r.unit_price, &r.currency) }).collect();
        Ok(Cart::restore(session_id.to_string(), currency, items, updated_at))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(cart.session_id()).execute(&mut *tx).await?;
        for (pos, item) in cart.items().iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (session_id, position, book_id, title, quantity, unit_price, currency, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(cart.session_id()).bind(pos as i32).bind(item.book_id).bind(&item.title).bind(item.quantity as i32)
                .bind(item.unit_price.amount()).bind(item.unit_price.currency()).bind(cart.updated_at)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_cart(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session_id).execute(&self.db).await?;
        Ok(())
    }
}

const VOUCHER_COLUMNS: &str = "id, code, description, voucher_type, value, minimum_order_amount, maximum_discount_amount, usage_limit, used_count, usage_limit_per_user, start_date, end_date, is_active, created_at, updated_at";

#[async_trait]
impl VoucherRepository for PgStore {
    async fn insert_voucher(&self, v: &Voucher) -> Result<()> {
        sqlx::query(&format!("INSERT INTO vouchers ({VOUCHER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"))
            .bind(v.id).bind(v.code.as_str()).bind(&v.description).bind(v.voucher_type.as_str()).bind(v.value)
            .bind(v.minimum_order_amount).bind(v.maximum_discount_amount).bind(v.usage_limit.map(|l| l as i32))
            .bind(v.used_count as i32).bind(v.usage_limit_per_user.map(|l| l as i32)).bind(v.start_date).bind(v.end_date)
            .bind(v.is_active).bind(v.created_at).bind(v.updated_at)
            .execute(&self.db).await
            .map_err(|e| if is_unique_violation(&e) { BookstoreError::VoucherExists } else { e.into() })?;
        Ok(())
    }

    /// `used_count` is owned by order placement and is not overwritten here.
    async fn save_voucher(&self, v: &Voucher) -> Result<()> {
        let done = sqlx::query("UPDATE vouchers SET description = $2, voucher_type = $3, value = $4, minimum_order_amount = $5, maximum_discount_amount = $6, usage_limit = $7, usage_limit_per_user = $8, start_date = $9, end_date = $10, is_active = $11, updated_at = $12 WHERE code = $1 AND ($7::int IS NULL OR used_count <= $7)")
            .bind(v.code.as_str()).bind(&v.description).bind(v.voucher_type.as_str()).bind(v.value).bind(v.minimum_order_amount)
            .bind(v.maximum_discount_amount).bind(v.usage_limit.map(|l| l as i32)).bind(v.usage_limit_per_user.map(|l| l as i32))
            .bind(v.start_date).bind(v.end_date).bind(v.is_active).bind(v.updated_at)
            .execute(&self.db).await?;
        if done.rows_affected() == 0 {
            let used: Option<(i32,)> = sqlx::query_as("SELECT used_count FROM vouchers WHERE code = $1").bind(v.code.as_str()).fetch_optional(&self.db).await?;
            return Err(match used {
                Some((used,)) => BookstoreError::Validation(format!("usage_limit is below the {used} redemptions already made")),
                None => BookstoreError::VoucherNotFound,
            });
        }
        Ok(())
    }

    async fn find_voucher(&self, code: &VoucherCode) -> Result<Option<Voucher>> {
        sqlx::query_as::<_, VoucherRow>(&format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = $1"))
            .bind(code.as_str()).fetch_optional(&self.db).await?
            .map(Voucher::try_from).transpose()
    }

    async fn list_vouchers(&self) -> Result<Vec<Voucher>> {
        sqlx::query_as::<_, VoucherRow>(&format!("SELECT {VOUCHER_COLUMNS} FROM vouchers ORDER BY created_at DESC"))
            .fetch_all(&self.db).await?
            .into_iter().map(Voucher::try_from).collect()
    }

    async fn user_redemptions(&self, code: &VoucherCode, user_id: &str) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM voucher_redemptions r JOIN vouchers v ON v.id = r.voucher_id WHERE v.code = $1 AND r.user_id = $2")
            .bind(code.as_str()).bind(user_id).fetch_one(&self.db).await?;
        Ok(count.0.max(0) as u32)
    }
}

impl PgStore {
    async fn redeem_voucher(tx: &mut Transaction<'_, Postgres>, voucher: &Voucher, order: &Order) -> Result<()> {
        // The conditional update takes the row lock, so the per-user count below is serialised per voucher.
        let claimed = sqlx::query("UPDATE vouchers SET used_count = used_count + 1, updated_at = NOW() WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)")
            .bind(voucher.id).execute(&mut **tx).await?;
        if claimed.rows_affected() == 0 { return Err(VoucherRejection::UsageLimitReached.into()); }
        let per_user: (Option<i32>, i64) = sqlx::query_as("SELECT v.usage_limit_per_user, (SELECT COUNT(*) FROM voucher_redemptions r WHERE r.voucher_id = v.id AND r.user_id = $2) FROM vouchers v WHERE v.id = $1")
            .bind(voucher.id).bind(order.user_id()).fetch_one(&mut **tx).await?;
        if let (Some(limit), used) = per_user {
            if used >= i64::from(limit) { return Err(VoucherRejection::PerUserLimitReached.into()); }
        }
        sqlx::query("INSERT INTO voucher_redemptions (id, voucher_id, user_id, order_id, redeemed_at) VALUES ($1, $2, $3, $4, NOW())")
            .bind(Uuid::now_v7()).bind(voucher.id).bind(order.user_id()).bind(order.id())
            .execute(&mut **tx).await?;
        Ok(())
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<Vec<OrderItemRow>> {
        Ok(sqlx::query_as::<_, OrderItemRow>("SELECT order_id, book_id, title, isbn, quantity, unit_price, total FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(order_ids).fetch_all(&self.db).await?)
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;
        rows.into_iter().map(|row| {
            let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut items).into_iter().partition(|i| i.order_id == row.id);
            items = rest;
            row.into_order(mine)
        }).collect()
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, recipient_name, recipient_phone, recipient_address, status, payment_method, payment_status, currency, subtotal, voucher_code, discount, shipping_fee, total, note, created_at, updated_at";

#[async_trait]
impl OrderRepository for PgStore {
    async fn place_order(&self, placement: &OrderPlacement) -> Result<()> {
        let order = &placement.order;
        let mut tx = self.db.begin().await?;

        for item in order.items() {
            let reserved = sqlx::query("UPDATE books SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
                .bind(item.book_id).bind(item.quantity as i32).execute(&mut *tx).await?;
            if reserved.rows_affected() == 0 { return Err(BookstoreError::InsufficientStock(item.book_id)); }
        }

        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"))
            .bind(order.id()).bind(order.order_number()).bind(order.user_id())
            .bind(&order.recipient().name).bind(&order.recipient().phone).bind(&order.recipient().address)
            .bind(order.status().as_str()).bind(order.payment_method().as_str()).bind(order.payment_status().as_str())
            .bind(order.subtotal().currency()).bind(order.subtotal().amount()).bind(order.voucher_code().map(|c| c.as_str()))
            .bind(order.discount().amount()).bind(order.shipping_fee().amount()).bind(order.total().amount()).bind(order.note())
            .bind(order.created_at()).bind(order.updated_at)
            .execute(&mut *tx).await?;

        for (pos, item) in order.items().iter().enumerate() {
            sqlx::query("INSERT INTO order_items (order_id, position, book_id, title, isbn, quantity, unit_price, total) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(order.id()).bind(pos as i32).bind(item.book_id).bind(&item.title).bind(&item.isbn)
                .bind(item.quantity as i32).bind(item.unit_price.amount()).bind(item.total.amount())
                .execute(&mut *tx).await?;
        }

        if let Some(voucher) = &placement.voucher {
            Self::redeem_voucher(&mut tx, voucher, order).await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&placement.session_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let done = sqlx::query("UPDATE orders SET status = $2, payment_status = $3, note = $4, updated_at = $5 WHERE id = $1")
            .bind(order.id()).bind(order.status().as_str()).bind(order.payment_status().as_str()).bind(order.note()).bind(order.updated_at)
            .execute(&self.db).await?;
        if done.rows_affected() == 0 { return Err(BookstoreError::OrderNotFound); }
        Ok(())
    }

    async fn cancel_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let current: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order.id()).fetch_optional(&mut *tx).await?;
        let (current,) = current.ok_or(BookstoreError::OrderNotFound)?;
        let from = OrderStatus::parse(&current).ok_or_else(|| corrupt("order status", &current))?;
        if !matches!(from, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(OrderError::InvalidTransition { from, to: OrderStatus::Cancelled.as_str() }.into());
        }

        sqlx::query("UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 WHERE id = $1 AND status IN ('pending', 'confirmed')")
            .bind(order.id()).bind(order.status().as_str()).bind(order.payment_status().as_str()).bind(order.updated_at)
            .execute(&mut *tx).await?;
        for item in order.items() {
            sqlx::query("UPDATE books SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(item.book_id).bind(item.quantity as i32).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1")).bind(id).fetch_optional(&self.db).await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, user_id: Option<&str>, page: Page) -> Result<(Vec<Order>, u64)> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE ($1::text IS NULL OR user_id = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3"))
            .bind(user_id).bind(page.per_page as i64).bind(page.offset() as i64)
            .fetch_all(&self.db).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR user_id = $1)")
            .bind(user_id).fetch_one(&self.db).await?;
        Ok((self.hydrate(rows).await?, total.0.max(0) as u64))
    }
}

const REVIEW_COLUMNS: &str = "id, book_id, user_id, rating, comment, status, moderation_note, created_at, moderated_at";

#[async_trait]
impl ReviewRepository for PgStore {
    async fn insert_review(&self, r: &Review) -> Result<()> {
        sqlx::query(&format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"))
            .bind(r.id()).bind(r.book_id()).bind(r.user_id()).bind(i16::from(r.rating().value())).bind(r.comment())
            .bind(r.status().as_str()).bind(r.moderation_note()).bind(r.created_at).bind(r.moderated_at)
            .execute(&self.db).await
            .map_err(|e| if is_unique_violation(&e) { ReviewError::Duplicate.into() } else { BookstoreError::from(e) })?;
        Ok(())
    }

    async fn save_review(&self, r: &Review) -> Result<()> {
        let done = sqlx::query("UPDATE reviews SET status = $2, moderation_note = $3, moderated_at = $4 WHERE id = $1")
            .bind(r.id()).bind(r.status().as_str()).bind(r.moderation_note()).bind(r.moderated_at)
            .execute(&self.db).await?;
        if done.rows_affected() == 0 { return Err(BookstoreError::ReviewNotFound); }
        Ok(())
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Review::try_from).transpose()
    }

    async fn list_reviews(&self, book_id: Option<Uuid>, status: Option<ReviewStatus>) -> Result<Vec<Review>> {
        sqlx::query_as::<_, ReviewRow>(&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE ($1::uuid IS NULL OR book_id = $1) AND ($2::text IS NULL OR status = $2) ORDER BY created_at"))
            .bind(book_id).bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db).await?
            .into_iter().map(Review::try_from).collect()
    }
}
