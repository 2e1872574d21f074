//! Error responses

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use validator::ValidationErrors;

use crate::domain::aggregates::{BookError, CartError, OrderError, ReviewError};
use crate::domain::pricing::VoucherRejection;
use crate::BookstoreError;

/// JSON error body: `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
    pub fn unauthorized() -> Self { Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing x-user-id header") }
    pub fn forbidden(message: impl Into<String>) -> Self { Self::new(StatusCode::FORBIDDEN, "forbidden", message) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({"error": self.code, "message": self.message}))).into_response()
    }
}

impl From<BookstoreError> for ApiError {
    fn from(e: BookstoreError) -> Self {
        use BookstoreError as E;
        let message = e.to_string();
        let (status, code) = match &e {
            E::BookNotFound => (StatusCode::NOT_FOUND, "book_not_found"),
            E::AuthorNotFound => (StatusCode::NOT_FOUND, "author_not_found"),
            E::CategoryNotFound => (StatusCode::NOT_FOUND, "category_not_found"),
            E::OrderNotFound => (StatusCode::NOT_FOUND, "order_not_found"),
            E::ReviewNotFound => (StatusCode::NOT_FOUND, "review_not_found"),
            E::VoucherNotFound => (StatusCode::NOT_FOUND, "voucher_not_found"),
            E::VoucherExists => (StatusCode::CONFLICT, "voucher_exists"),
            E::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart"),
            E::BookUnavailable(_) => (StatusCode::CONFLICT, "book_unavailable"),
            E::InsufficientStock(_) | E::Book(BookError::InsufficientStock) => (StatusCode::CONFLICT, "insufficient_stock"),
            E::Voucher(r) => (StatusCode::UNPROCESSABLE_ENTITY, r.code()),
            E::Book(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_book"),
            E::Cart(CartError::ItemNotFound) => (StatusCode::NOT_FOUND, "cart_item_not_found"),
            E::Cart(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_cart_item"),
            E::Order(OrderError::NoItems) => (StatusCode::BAD_REQUEST, "empty_order"),
            E::Order(_) => (StatusCode::CONFLICT, "invalid_order_state"),
            E::Review(ReviewError::CommentTooLong) => (StatusCode::UNPROCESSABLE_ENTITY, "comment_too_long"),
            E::Review(ReviewError::Duplicate) => (StatusCode::CONFLICT, "duplicate_review"),
            E::Review(ReviewError::AlreadyModerated(_)) => (StatusCode::CONFLICT, "already_moderated"),
            E::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
            E::StorageError(_) => {
                tracing::error!(error = %e, "storage failure");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error");
            }
        };
        Self::new(status, code, message)
    }
}

macro_rules! via_bookstore_error {
    ($($t:ty),+) => { $(impl From<$t> for ApiError { fn from(e: $t) -> Self { BookstoreError::from(e).into() } })+ };
}
via_bookstore_error!(BookError, CartError, OrderError, ReviewError, VoucherRejection);

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self { Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_failed", e.to_string()) }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
