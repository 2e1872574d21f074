//! HTTP API

pub mod books;
pub mod cart;
pub mod catalog;
pub mod context;
pub mod error;
pub mod orders;
pub mod reviews;
pub mod vouchers;

use axum::{routing::{get, post, put}, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::ValidationError;

use crate::checkout::CheckoutService;
use crate::config::Config;
use crate::messaging::EventPublisher;
use crate::store::Store;

pub use context::{Caller, Role};
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub checkout: CheckoutService,
    pub events: EventPublisher,
    pub currency: String,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, config: &Config) -> Self {
        let checkout = CheckoutService::new(store.clone(), events.clone(), config.shipping.clone(), config.currency.clone());
        Self { store, checkout, events, currency: config.currency.clone() }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "sachviet-bookstore"})) }))
        .route("/api/v1/books", get(books::list_books).post(books::create_book))
        .route("/api/v1/books/:id", get(books::get_book).put(books::update_book).delete(books::delete_book))
        .route("/api/v1/books/:id/reviews", get(reviews::list_book_reviews).post(reviews::submit_review))
        .route("/api/v1/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/api/v1/categories/:id", get(catalog::get_category))
        .route("/api/v1/authors", get(catalog::list_authors).post(catalog::create_author))
        .route("/api/v1/authors/:id", get(catalog::get_author))
        .route("/api/v1/cart/:session", get(cart::get_cart).post(cart::add_to_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/items/:book_id", put(cart::update_item).delete(cart::remove_item))
        .route("/api/v1/checkout", post(orders::checkout))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/confirm", post(orders::confirm_order))
        .route("/api/v1/orders/:id/pay", post(orders::pay_order))
        .route("/api/v1/orders/:id/ship", post(orders::ship_order))
        .route("/api/v1/orders/:id/deliver", post(orders::deliver_order))
        .route("/api/v1/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/v1/vouchers", get(vouchers::list_vouchers).post(vouchers::create_voucher))
        .route("/api/v1/vouchers/validate", post(vouchers::validate_voucher))
        .route("/api/v1/vouchers/:code", get(vouchers::get_voucher).put(vouchers::update_voucher))
        .route("/api/v1/reviews/pending", get(reviews::list_pending))
        .route("/api/v1/reviews/:id/approve", post(reviews::approve_review))
        .route("/api/v1/reviews/:id/reject", post(reviews::reject_review))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: u64, pub page: u32, pub per_page: u32 }

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() { return Err(ValidationError::new("non_negative")); }
    Ok(())
}

fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED { return Err(ValidationError::new("percentage")); }
    Ok(())
}
