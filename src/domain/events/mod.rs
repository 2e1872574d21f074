//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Isbn, VoucherCode};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Book(BookEvent),
    Order(OrderEvent),
    Voucher(VoucherEvent),
    Review(ReviewEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookEvent {
    Created { book_id: Uuid, isbn: Isbn },
    Published { book_id: Uuid },
    PriceChanged { book_id: Uuid, base_price: Decimal },
    StockAdded { book_id: Uuid, quantity: u32 },
    StockRemoved { book_id: Uuid, quantity: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: String, total: Decimal },
    Confirmed { order_id: Uuid },
    Paid { order_id: Uuid },
    Shipped { order_id: Uuid },
    Delivered { order_id: Uuid },
    Cancelled { order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoucherEvent {
    Redeemed { code: VoucherCode, order_id: Uuid, user_id: String, discount: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewEvent {
    Submitted { review_id: Uuid, book_id: Uuid },
    Approved { review_id: Uuid, book_id: Uuid },
    Rejected { review_id: Uuid, book_id: Uuid },
}

impl DomainEvent {
    /// Messaging subject, e.g. `bookstore.order.placed`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Book(e) => ("book", match e {
                BookEvent::Created { .. } => "created",
                BookEvent::Published { .. } => "published",
                BookEvent::PriceChanged { .. } => "price_changed",
                BookEvent::StockAdded { .. } => "stock_added",
                BookEvent::StockRemoved { .. } => "stock_removed",
            }),
            Self::Order(e) => ("order", match e {
                OrderEvent::Placed { .. } => "placed",
                OrderEvent::Confirmed { .. } => "confirmed",
                OrderEvent::Paid { .. } => "paid",
                OrderEvent::Shipped { .. } => "shipped",
                OrderEvent::Delivered { .. } => "delivered",
                OrderEvent::Cancelled { .. } => "cancelled",
            }),
            Self::Voucher(VoucherEvent::Redeemed { .. }) => ("voucher", "redeemed"),
            Self::Review(e) => ("review", match e {
                ReviewEvent::Submitted { .. } => "submitted",
                ReviewEvent::Approved { .. } => "approved",
                ReviewEvent::Rejected { .. } => "rejected",
            }),
        };
        format!("bookstore.{aggregate}.{name}")
    }
}
