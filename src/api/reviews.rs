//! Reader reviews and moderation

use axum::{extract::{Path, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::ApiResult;
use super::{AppState, Caller};
use crate::domain::aggregates::{average_rating, BookStatus, Review, ReviewError, ReviewStatus};
use crate::domain::value_objects::Rating;
use crate::store::{BookRepository, ReviewRepository};
use crate::BookstoreError;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectReviewRequest {
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookReviews {
    pub book_id: Uuid,
    pub average_rating: Option<Decimal>,
    pub count: usize,
    pub reviews: Vec<Review>,
}

pub async fn list_book_reviews(State(s): State<AppState>, Path(book_id): Path<Uuid>) -> ApiResult<Json<BookReviews>> {
    s.store.get_book(book_id).await?.ok_or(BookstoreError::BookNotFound)?;
    let reviews = s.store.list_reviews(Some(book_id), Some(ReviewStatus::Approved)).await?;
    Ok(Json(BookReviews { book_id, average_rating: average_rating(&reviews), count: reviews.len(), reviews }))
}

pub async fn submit_review(State(s): State<AppState>, caller: Caller, Path(book_id): Path<Uuid>, Json(r): Json<SubmitReviewRequest>) -> ApiResult<(StatusCode, Json<Review>)> {
    r.validate()?;
    let book = s.store.get_book(book_id).await?.ok_or(BookstoreError::BookNotFound)?;
    if book.status() != BookStatus::Active { return Err(BookstoreError::BookNotFound.into()); }
    let rating = Rating::new(r.rating).map_err(|e| BookstoreError::Validation(e.to_string()))?;
    let mut review = Review::submit(book_id, caller.user_id, rating, r.comment)?;
    s.store.insert_review(&review).await?;
    tracing::debug!(review_id = %review.id(), %book_id, "review submitted");
    s.events.publish(review.take_events()).await;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_pending(State(s): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Review>>> {
    caller.require_admin()?;
    Ok(Json(s.store.list_reviews(None, Some(ReviewStatus::Pending)).await?))
}

async fn moderate(s: AppState, caller: Caller, id: Uuid, decide: impl FnOnce(&mut Review) -> Result<(), ReviewError>) -> ApiResult<Json<Review>> {
    caller.require_admin()?;
    let mut review = s.store.get_review(id).await?.ok_or(BookstoreError::ReviewNotFound)?;
    decide(&mut review)?;
    s.store.save_review(&review).await?;
    s.events.publish(review.take_events()).await;
    Ok(Json(review))
}

pub async fn approve_review(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Review>> {
    moderate(s, caller, id, Review::approve).await
}

pub async fn reject_review(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>, Json(r): Json<RejectReviewRequest>) -> ApiResult<Json<Review>> {
    r.validate()?;
    moderate(s, caller, id, |review| review.reject(r.note)).await
}
