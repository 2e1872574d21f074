//! Checkout and order management endpoints

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::error::ApiResult;
use super::{ApiError, AppState, Caller, ListParams, PaginatedResponse};
use crate::checkout::CheckoutRequest;
use crate::domain::aggregates::{Order, OrderError, OrderStatus, PaymentMethod, Recipient};
use crate::store::{OrderRepository, Page};
use crate::BookstoreError;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(length(min = 1, max = 120))]
    pub recipient_name: String,
    #[validate(length(min = 9, max = 15))]
    pub phone: String,
    #[validate(length(min = 5, max = 500))]
    pub address: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub voucher_code: Option<String>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

pub async fn checkout(State(s): State<AppState>, caller: Caller, Json(r): Json<CheckoutBody>) -> ApiResult<(StatusCode, Json<Order>)> {
    r.validate()?;
    let req = CheckoutRequest {
        session_id: r.session_id, user_id: caller.user_id,
        recipient: Recipient { name: r.recipient_name.trim().to_string(), phone: r.phone.trim().to_string(), address: r.address.trim().to_string() },
        payment_method: r.payment_method, voucher_code: r.voucher_code, note: r.note.filter(|n| !n.trim().is_empty()),
    };
    let order = s.checkout.place_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Customers see their own orders; admins see all of them.
pub async fn list_orders(State(s): State<AppState>, caller: Caller, Query(p): Query<ListParams>) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let page = Page::new(p.page, p.per_page);
    let owner = if caller.is_admin() { None } else { Some(caller.user_id.as_str()) };
    let (orders, total) = s.store.list_orders(owner, page).await?;
    Ok(Json(PaginatedResponse { data: orders, total, page: page.page, per_page: page.per_page }))
}

async fn load_for(s: &AppState, caller: &Caller, id: Uuid) -> ApiResult<Order> {
    match s.store.get_order(id).await? {
        Some(order) if caller.can_access(order.user_id()) => Ok(order),
        _ => Err(BookstoreError::OrderNotFound.into()),
    }
}

pub async fn get_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(load_for(&s, &caller, id).await?))
}

async fn advance(s: AppState, caller: Caller, id: Uuid, step: fn(&mut Order) -> Result<(), OrderError>) -> ApiResult<Json<Order>> {
    caller.require_admin()?;
    let mut order = s.store.get_order(id).await?.ok_or(BookstoreError::OrderNotFound)?;
    step(&mut order)?;
    s.store.save_order(&order).await?;
    tracing::info!(order_id = %order.id(), status = order.status().as_str(), payment = order.payment_status().as_str(), "order updated");
    s.events.publish(order.take_events()).await;
    Ok(Json(order))
}

pub async fn confirm_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    advance(s, caller, id, Order::confirm).await
}

pub async fn pay_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    advance(s, caller, id, Order::mark_paid).await
}

pub async fn ship_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    advance(s, caller, id, Order::ship).await
}

pub async fn deliver_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    advance(s, caller, id, Order::deliver).await
}

/// Owners may cancel while the order is still pending; admins until it ships.
pub async fn cancel_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    let order = load_for(&s, &caller, id).await?;
    if !caller.is_admin() && order.status() != OrderStatus::Pending {
        return Err(ApiError::forbidden("only pending orders can be cancelled by the customer"));
    }
    Ok(Json(s.checkout.cancel_order(order).await?))
}
