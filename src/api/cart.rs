//! Session cart endpoints

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiResult;
use super::AppState;
use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::Money;
use crate::store::{BookRepository, CartRepository};
use crate::BookstoreError;

const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub book_id: Uuid,
    #[validate(range(min = 1, max = 99))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    /// `0` removes the line.
    #[validate(range(max = 99))]
    pub quantity: u32,
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<Cart>> {
    Ok(Json(s.store.load_cart(&session, &s.currency).await?))
}

pub async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> ApiResult<(StatusCode, Json<Cart>)> {
    r.validate()?;
    let book = s.store.get_book(r.book_id).await?.ok_or(BookstoreError::BookNotFound)?;
    if !book.is_purchasable() { return Err(BookstoreError::BookUnavailable(book.id()).into()); }
    let mut cart = s.store.load_cart(&session, &s.currency).await?;
    let in_cart = cart.items().iter().find(|i| i.book_id == book.id()).map_or(0, |i| i.quantity);
    let wanted = in_cart + r.quantity;
    if wanted > MAX_LINE_QUANTITY {
        return Err(BookstoreError::Validation(format!("at most {MAX_LINE_QUANTITY} copies per book")).into());
    }
    if wanted > book.stock().value() { return Err(BookstoreError::InsufficientStock(book.id()).into()); }
    cart.add_item(CartItem {
        book_id: book.id(), title: book.title().to_string(), quantity: r.quantity,
        unit_price: Money::new(book.current_price(Utc::now()), &s.currency),
    })?;
    s.store.save_cart(&cart).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn update_item(State(s): State<AppState>, Path((session, book_id)): Path<(String, Uuid)>, Json(r): Json<UpdateCartItemRequest>) -> ApiResult<Json<Cart>> {
    r.validate()?;
    let mut cart = s.store.load_cart(&session, &s.currency).await?;
    if r.quantity > 0 {
        let book = s.store.get_book(book_id).await?.ok_or(BookstoreError::BookNotFound)?;
        if r.quantity > book.stock().value() { return Err(BookstoreError::InsufficientStock(book_id).into()); }
    }
    cart.update_quantity(book_id, r.quantity)?;
    s.store.save_cart(&cart).await?;
    Ok(Json(cart))
}

pub async fn remove_item(State(s): State<AppState>, Path((session, book_id)): Path<(String, Uuid)>) -> ApiResult<Json<Cart>> {
    let mut cart = s.store.load_cart(&session, &s.currency).await?;
    cart.remove_item(book_id)?;
    s.store.save_cart(&cart).await?;
    Ok(Json(cart))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<StatusCode> {
    s.store.clear_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
