//! Sách Việt Bookstore
//!
//! Online bookstore back end for the Vietnamese market.
//!
//! ## Features
//! - Book catalog with authors and categories
//! - Sale pricing with percentage/fixed discounts and sale windows
//! - Shopping cart and checkout
//! - Vouchers with minimum order, caps and usage limits
//! - Order management
//! - Reader reviews with moderation

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{BookError, CartError, OrderError, ReviewError};
use crate::domain::pricing::VoucherRejection;

pub use config::Config;
pub use domain::pricing::{compute_final_price, PricedItem, Voucher, VoucherType};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BookstoreError {
    #[error("Book not found")]
    BookNotFound,

    #[error("Author not found")]
    AuthorNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Review not found")]
    ReviewNotFound,

    #[error("Voucher not found")]
    VoucherNotFound,

    #[error("Voucher code already exists")]
    VoucherExists,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Book {0} is not available for sale")]
    BookUnavailable(Uuid),

    #[error("Insufficient stock for book {0}")]
    InsufficientStock(Uuid),

    #[error(transparent)]
    Voucher(#[from] VoucherRejection),

    #[error(transparent)]
    Book(#[from] BookError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for BookstoreError {
    fn from(e: sqlx::Error) -> Self { Self::StorageError(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, BookstoreError>;
