//! Book catalog endpoints

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::ApiResult;
use super::{non_negative, percentage, ApiError, AppState, Caller, PaginatedResponse};
use crate::domain::aggregates::{Book, BookDetails, BookStatus};
use crate::domain::events::{BookEvent, DomainEvent};
use crate::domain::pricing::PricedItem;
use crate::domain::value_objects::Isbn;
use crate::store::{BookFilter, BookRepository, CatalogRepository, Page};
use crate::BookstoreError;

#[derive(Debug, Deserialize)]
pub struct BookListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Uuid>,
    pub author: Option<Uuid>,
    pub search: Option<String>,
}

/// A book together with the price a customer pays right now.
#[derive(Debug, Serialize)]
pub struct BookView {
    #[serde(flatten)]
    pub book: Book,
    pub final_price: Decimal,
    pub discount_active: bool,
    pub in_stock: bool,
}

impl BookView {
    pub fn at(book: Book, now: DateTime<Utc>) -> Self {
        Self { final_price: book.current_price(now), discount_active: book.pricing().is_discount_active(now), in_stock: book.is_in_stock(), book }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookRequest {
    pub isbn: String,
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[serde(default)]
    pub author_ids: Vec<Uuid>,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub publisher: Option<String>,
    #[validate(range(min = 1000, max = 2100))]
    pub publication_year: Option<i32>,
    #[validate(custom = "non_negative")]
    pub base_price: Decimal,
    #[validate(custom = "percentage")]
    pub discount_percentage: Option<Decimal>,
    #[serde(default)]
    #[validate(custom = "non_negative")]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub is_on_sale: bool,
    pub sale_start: Option<DateTime<Utc>>,
    pub sale_end: Option<DateTime<Utc>>,
    /// Stock level to reach. On update it is applied as a change from the
    /// level read, so sales committed in between are kept.
    #[validate(range(max = 1000000))]
    pub stock: Option<u32>,
    #[serde(default)]
    pub publish: bool,
}

impl BookRequest {
    fn details(&self) -> BookDetails {
        BookDetails {
            title: self.title.trim().to_string(), description: self.description.clone(), author_ids: self.author_ids.clone(),
            category_id: self.category_id, publisher: self.publisher.clone(), publication_year: self.publication_year,
        }
    }

    fn pricing(&self) -> PricedItem {
        PricedItem {
            base_price: self.base_price, discount_percentage: self.discount_percentage, discount_amount: self.discount_amount,
            is_on_sale: self.is_on_sale, sale_start: self.sale_start, sale_end: self.sale_end,
        }
    }
}

pub async fn list_books(State(s): State<AppState>, caller: Option<Caller>, Query(p): Query<BookListParams>) -> ApiResult<Json<PaginatedResponse<BookView>>> {
    let page = Page::new(p.page, p.per_page);
    let filter = BookFilter {
        category_id: p.category, author_id: p.author, search: p.search.filter(|s| !s.trim().is_empty()),
        include_inactive: caller.as_ref().map_or(false, Caller::is_admin), page,
    };
    let (books, total) = s.store.list_books(&filter).await?;
    let now = Utc::now();
    Ok(Json(PaginatedResponse { data: books.into_iter().map(|b| BookView::at(b, now)).collect(), total, page: page.page, per_page: page.per_page }))
}

pub async fn get_book(State(s): State<AppState>, caller: Option<Caller>, Path(id): Path<Uuid>) -> ApiResult<Json<BookView>> {
    let book = s.store.get_book(id).await?.ok_or(BookstoreError::BookNotFound)?;
    if book.status() != BookStatus::Active && !caller.as_ref().map_or(false, Caller::is_admin) {
        return Err(BookstoreError::BookNotFound.into());
    }
    Ok(Json(BookView::at(book, Utc::now())))
}

async fn check_references(s: &AppState, r: &BookRequest) -> ApiResult<()> {
    if let Some(category_id) = r.category_id {
        s.store.get_category(category_id).await?.ok_or(BookstoreError::CategoryNotFound)?;
    }
    for author_id in &r.author_ids {
        s.store.get_author(*author_id).await?.ok_or(BookstoreError::AuthorNotFound)?;
    }
    Ok(())
}

pub async fn create_book(State(s): State<AppState>, caller: Caller, Json(r): Json<BookRequest>) -> ApiResult<(StatusCode, Json<BookView>)> {
    caller.require_admin()?;
    r.validate()?;
    let isbn = Isbn::new(&r.isbn).map_err(|e| BookstoreError::Validation(e.to_string()))?;
    check_references(&s, &r).await?;
    // create() does not validate; re-applying details and pricing does.
    let mut book = Book::create(isbn, r.details(), r.pricing());
    book.update_details(r.details())?;
    book.set_pricing(r.pricing())?;
    if let Some(stock) = r.stock.filter(|q| *q > 0) { book.add_stock(stock); }
    if r.publish { book.publish()?; }
    s.store.insert_book(&book).await?;
    tracing::info!(book_id = %book.id(), isbn = %book.isbn(), "book created");
    s.events.publish(book.take_events()).await;
    Ok((StatusCode::CREATED, Json(BookView::at(book, Utc::now()))))
}

pub async fn update_book(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>, Json(r): Json<BookRequest>) -> ApiResult<Json<BookView>> {
    caller.require_admin()?;
    r.validate()?;
    let mut book = s.store.get_book(id).await?.ok_or(BookstoreError::BookNotFound)?;
    if Isbn::new(&r.isbn).ok().as_ref() != Some(book.isbn()) {
        return Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "isbn_immutable", "ISBN cannot be changed"));
    }
    check_references(&s, &r).await?;
    book.update_details(r.details())?;
    book.set_pricing(r.pricing())?;
    if r.publish && book.status() != BookStatus::Active { book.publish()?; }
    s.store.save_book(&book).await?;
    s.events.publish(book.take_events()).await;

    let delta = r.stock.map_or(0, |target| i64::from(target) - i64::from(book.stock().value()));
    if delta != 0 {
        let level = s.store.adjust_stock(id, delta).await?;
        tracing::info!(book_id = %id, delta, level, "stock adjusted");
        let quantity = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        let event = if delta > 0 { BookEvent::StockAdded { book_id: id, quantity } } else { BookEvent::StockRemoved { book_id: id, quantity } };
        s.events.publish(vec![DomainEvent::Book(event)]).await;
        book = s.store.get_book(id).await?.ok_or(BookstoreError::BookNotFound)?;
    }
    Ok(Json(BookView::at(book, Utc::now())))
}

/// Archives the book; it stays referenced by past orders.
pub async fn delete_book(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    caller.require_admin()?;
    let mut book = s.store.get_book(id).await?.ok_or(BookstoreError::BookNotFound)?;
    book.archive();
    s.store.save_book(&book).await?;
    Ok(StatusCode::NO_CONTENT)
}
