//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, VoucherCode};
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) order_number: String,
    pub(crate) user_id: String,
    pub(crate) recipient: Recipient,
    pub(crate) status: OrderStatus,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) items: Vec<LineItem>,
    pub(crate) subtotal: Money,
    pub(crate) voucher_code: Option<VoucherCode>,
    pub(crate) discount: Money,
    pub(crate) shipping_fee: Money,
    pub(crate) total: Money,
    pub(crate) note: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem { pub book_id: Uuid, pub title: String, pub isbn: String, pub quantity: u32, pub unit_price: Money, pub total: Money }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient { pub name: String, pub phone: String, pub address: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipping, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { #[default] Cod, VnPay, BankTransfer }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Refunded }

macro_rules! str_enum {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $s),+ } }
            pub fn parse(s: &str) -> Option<Self> { match s { $($s => Some(Self::$variant),)+ _ => None } }
        }
    };
}

str_enum!(OrderStatus { Pending => "pending", Confirmed => "confirmed", Shipping => "shipping", Delivered => "delivered", Cancelled => "cancelled" });
str_enum!(PaymentMethod { Cod => "cod", VnPay => "vn_pay", BankTransfer => "bank_transfer" });
str_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Refunded => "refunded" });

impl Order {
    /// Builds a pending order from priced line items.
    pub fn place(order_number: impl Into<String>, user_id: impl Into<String>, recipient: Recipient, items: Vec<LineItem>, payment_method: PaymentMethod, currency: &str) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), order_number: order_number.into(), user_id: user_id.into(), recipient,
            status: OrderStatus::Pending, payment_method, payment_status: PaymentStatus::Pending,
            items, subtotal: Money::zero(currency), voucher_code: None, discount: Money::zero(currency),
            shipping_fee: Money::zero(currency), total: Money::zero(currency), note: None,
            created_at: now, updated_at: now, events: vec![],
        };
        order.recalculate();
        Ok(order)
    }

    /// `DH` followed by eight digits.
    pub fn generate_number() -> String { format!("DH{:08}", rand::random::<u32>() % 100_000_000) }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn recipient(&self) -> &Recipient { &self.recipient }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn voucher_code(&self) -> Option<&VoucherCode> { self.voucher_code.as_ref() }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn shipping_fee(&self) -> &Money { &self.shipping_fee }
    pub fn total(&self) -> &Money { &self.total }
    pub fn note(&self) -> Option<&str> { self.note.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn set_note(&mut self, note: Option<String>) { self.note = note; }

    /// Records a voucher discount. Amounts are rounded to whole units.
    pub fn apply_voucher(&mut self, code: VoucherCode, discount: Decimal) {
        self.voucher_code = Some(code);
        self.discount = Money::new(discount.max(Decimal::ZERO).round_dp(0), self.subtotal.currency());
        self.recalculate();
    }

    pub fn set_shipping_fee(&mut self, fee: Decimal) {
        self.shipping_fee = Money::new(fee.max(Decimal::ZERO), self.subtotal.currency());
        self.recalculate();
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.transition(&[OrderStatus::Pending], OrderStatus::Confirmed)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed { order_id: self.id }));
        Ok(())
    }

    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled { return Err(OrderError::InvalidTransition { from: self.status, to: "paid" }); }
        if self.payment_status != PaymentStatus::Pending { return Err(OrderError::AlreadyPaid); }
        self.payment_status = PaymentStatus::Paid;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id }));
        Ok(())
    }

    pub fn ship(&mut self) -> Result<(), OrderError> {
        self.transition(&[OrderStatus::Confirmed], OrderStatus::Shipping)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped { order_id: self.id }));
        Ok(())
    }

    /// Cash-on-delivery orders are settled on delivery.
    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.transition(&[OrderStatus::Shipping], OrderStatus::Delivered)?;
        if self.payment_method == PaymentMethod::Cod && self.payment_status == PaymentStatus::Pending {
            self.payment_status = PaymentStatus::Paid;
        }
        self.raise_event(DomainEvent::Order(OrderEvent::Delivered { order_id: self.id }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.transition(&[OrderStatus::Pending, OrderStatus::Confirmed], OrderStatus::Cancelled)?;
        if self.payment_status == PaymentStatus::Paid { self.payment_status = PaymentStatus::Refunded; }
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    fn transition(&mut self, allowed_from: &[OrderStatus], to: OrderStatus) -> Result<(), OrderError> {
        if !allowed_from.contains(&self.status) {
            return Err(OrderError::InvalidTransition { from: self.status, to: to.as_str() });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn recalculate(&mut self) {
        let currency = self.subtotal.currency().to_string();
        self.subtotal = self.items.iter().fold(Money::zero(&currency), |acc, i| acc.add(&i.total).unwrap_or(acc));
        let discount = self.discount.amount().min(self.subtotal.amount());
        self.discount = Money::new(discount, &currency);
        let after_discount = self.subtotal.saturating_sub(&self.discount).unwrap_or_else(|_| self.subtotal.clone());
        self.total = after_discount.add(&self.shipping_fee).unwrap_or(after_discount);
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    pub(crate) fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Cannot move order from {from:?} to {to}")]
    InvalidTransition { from: OrderStatus, to: &'static str },
    #[error("Order is already paid")]
    AlreadyPaid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(qty: u32, price: Decimal) -> LineItem {
        LineItem { book_id: Uuid::now_v7(), title: "Số Đỏ".into(), isbn: "9786041085251".into(), quantity: qty, unit_price: Money::vnd(price), total: Money::vnd(price * Decimal::from(qty)) }
    }

    fn order() -> Order {
        Order::place("DH00000001", "user-1", Recipient::default(), vec![line(2, dec!(150000))], PaymentMethod::Cod, "VND").unwrap()
    }

    #[test]
    fn test_totals() {
        let mut o = order();
        o.set_shipping_fee(dec!(30000));
        o.apply_voucher(VoucherCode::new("GIAM20K").unwrap(), dec!(20000));
        assert_eq!(o.subtotal().amount(), dec!(300000));
        assert_eq!(o.total().amount(), dec!(310000));
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        let mut o = order();
        o.apply_voucher(VoucherCode::new("BIG").unwrap(), dec!(999999));
        assert_eq!(o.discount().amount(), dec!(300000));
        assert_eq!(o.total().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_order_workflow() {
        let mut o = order();
        o.confirm().unwrap();
        assert_eq!(o.confirm(), Err(OrderError::InvalidTransition { from: OrderStatus::Confirmed, to: "confirmed" }));
        o.ship().unwrap();
        assert!(o.cancel().is_err());
        o.deliver().unwrap();
        assert_eq!(o.status(), OrderStatus::Delivered);
        assert_eq!(o.payment_status(), PaymentStatus::Paid);
        assert_eq!(o.take_events().len(), 3);
    }

    #[test]
    fn test_cancel_refunds_paid_order() {
        let mut o = order();
        o.mark_paid().unwrap();
        assert_eq!(o.mark_paid(), Err(OrderError::AlreadyPaid));
        o.cancel().unwrap();
        assert_eq!(o.payment_status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_empty_order_rejected() {
        assert_eq!(Order::place("DH1", "u", Recipient::default(), vec![], PaymentMethod::Cod, "VND").err(), Some(OrderError::NoItems));
    }

    #[test]
    fn test_order_number_format() {
        let n = Order::generate_number();
        assert!(n.starts_with("DH") && n.len() == 10);
    }
}
