//! Checkout: turns a session cart into a placed order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::config::ShippingPolicy;
use crate::domain::aggregates::{LineItem, Order, PaymentMethod, Recipient};
use crate::domain::events::{BookEvent, DomainEvent, OrderEvent, VoucherEvent};
use crate::domain::pricing::Voucher;
use crate::domain::value_objects::{Money, VoucherCode};
use crate::messaging::EventPublisher;
use crate::store::{BookRepository, CartRepository, OrderPlacement, OrderRepository, Store, VoucherRepository};
use crate::{BookstoreError, Result};

#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    pub session_id: String,
    pub user_id: String,
    pub recipient: Recipient,
    pub payment_method: PaymentMethod,
    pub voucher_code: Option<String>,
    pub note: Option<String>,
}

/// What a voucher would do for an order, without redeeming it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoucherQuote {
    pub code: VoucherCode,
    pub discount: Decimal,
    pub free_shipping: bool,
    pub amount_after_discount: Decimal,
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    events: EventPublisher,
    shipping: ShippingPolicy,
    currency: String,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, shipping: ShippingPolicy, currency: impl Into<String>) -> Self {
        Self { store, events, shipping, currency: currency.into() }
    }

    /// Looks up the voucher and the user's redemption count, then validates.
    pub async fn validate_for_user(&self, code: &str, user_id: &str, order_amount: Decimal, now: DateTime<Utc>) -> Result<Voucher> {
        let code = VoucherCode::new(code).map_err(|_| BookstoreError::VoucherNotFound)?;
        let voucher = self.store.find_voucher(&code).await?.ok_or(BookstoreError::VoucherNotFound)?;
        let used_by_user = self.store.user_redemptions(&code, user_id).await?;
        voucher.validate(order_amount, used_by_user, now)?;
        Ok(voucher)
    }

    pub async fn preview_voucher(&self, code: &str, user_id: &str, order_amount: Decimal) -> Result<VoucherQuote> {
        let voucher = self.validate_for_user(code, user_id, order_amount, Utc::now()).await?;
        let discount = voucher.apply(order_amount);
        Ok(VoucherQuote {
            free_shipping: voucher.waives_shipping(),
            amount_after_discount: (order_amount - discount).max(Decimal::ZERO),
            code: voucher.code,
            discount,
        })
    }

    pub async fn place_order(&self, req: CheckoutRequest) -> Result<Order> {
        let now = Utc::now();
        let cart = self.store.load_cart(&req.session_id, &self.currency).await?;
        if cart.is_empty() { return Err(BookstoreError::EmptyCart); }

        let mut items = Vec::with_capacity(cart.item_count());
        for entry in cart.items() {
            let book = self.store.get_book(entry.book_id).await?.ok_or(BookstoreError::BookUnavailable(entry.book_id))?;
            if !book.is_purchasable() { return Err(BookstoreError::BookUnavailable(book.id())); }
            if book.stock().value() < entry.quantity { return Err(BookstoreError::InsufficientStock(book.id())); }
            let unit_price = Money::new(book.current_price(now), &self.currency);
            items.push(LineItem {
                book_id: book.id(), title: book.title().to_string(), isbn: book.isbn().to_string(),
                quantity: entry.quantity, total: unit_price.multiply(entry.quantity), unit_price,
            });
        }

        let mut order = Order::place(Order::generate_number(), &req.user_id, req.recipient, items, req.payment_method, &self.currency)?;
        order.set_note(req.note);
        let subtotal = order.subtotal().amount();

        let voucher = match req.voucher_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.validate_for_user(code, &req.user_id, subtotal, now).await?),
            None => None,
        };
        let waive_shipping = voucher.as_ref().map_or(false, Voucher::waives_shipping);
        order.set_shipping_fee(if waive_shipping { Decimal::ZERO } else { self.shipping.fee_for(subtotal) });
        if let Some(v) = &voucher {
            order.apply_voucher(v.code.clone(), v.apply(subtotal));
        }

        let placement = OrderPlacement { order, session_id: req.session_id, voucher };
        self.store.place_order(&placement).await?;
        let OrderPlacement { mut order, voucher, .. } = placement;

        tracing::info!(order_id = %order.id(), number = order.order_number(), total = %order.total(), "order placed");
        let (order_id, user_id) = (order.id(), order.user_id().to_string());
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id,
            user_id: user_id.clone(),
            total: order.total().amount(),
        }));
        if let Some(v) = voucher {
            let discount = order.discount().amount();
            order.raise_event(DomainEvent::Voucher(VoucherEvent::Redeemed { code: v.code, order_id, user_id, discount }));
        }
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    /// Cancels the order and returns its copies to stock. Voucher usage is not restored.
    pub async fn cancel_order(&self, mut order: Order) -> Result<Order> {
        order.cancel()?;
        self.store.cancel_order(&order).await?;
        tracing::info!(order_id = %order.id(), number = order.order_number(), "order cancelled");
        let restocked = order.items().iter()
            .map(|item| DomainEvent::Book(BookEvent::StockAdded { book_id: item.book_id, quantity: item.quantity }))
            .collect();
        self.events.publish(restocked).await;
        self.events.publish(order.take_events()).await;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Book, BookDetails, CartItem};
    use crate::domain::pricing::{PricedItem, VoucherRejection, VoucherType};
    use crate::domain::value_objects::Isbn;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    struct Fixture { store: Arc<MemoryStore>, service: CheckoutService, book: Book }

    async fn fixture(price: PricedItem, stock: u32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut book = Book::create(Isbn::new("9786041085251").unwrap(), BookDetails { title: "Cho Tôi Xin Một Vé Đi Tuổi Thơ".into(), ..Default::default() }, price);
        book.add_stock(stock);
        book.publish().unwrap();
        store.insert_book(&book).await.unwrap();
        let service = CheckoutService::new(store.clone(), EventPublisher::disabled(), ShippingPolicy::default(), "VND");
        Fixture { store, service, book }
    }

    async fn fill_cart(f: &Fixture, session: &str, qty: u32) {
        let mut cart = f.store.load_cart(session, "VND").await.unwrap();
        cart.add_item(CartItem { book_id: f.book.id(), title: f.book.title().into(), quantity: qty, unit_price: Money::vnd(f.book.pricing().base_price) }).unwrap();
        f.store.save_cart(&cart).await.unwrap();
    }

    fn request(session: &str, user: &str, voucher: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            session_id: session.into(), user_id: user.into(),
            recipient: Recipient { name: "Nguyễn Văn A".into(), phone: "0901234567".into(), address: "12 Lê Lợi, Q.1, TP.HCM".into() },
            payment_method: PaymentMethod::Cod, voucher_code: voucher.map(String::from), note: None,
        }
    }

    async fn add_voucher(f: &Fixture, code: &str, kind: VoucherType, value: Decimal, edit: impl FnOnce(&mut Voucher)) -> Voucher {
        let now = Utc::now();
        let mut v = Voucher::new(VoucherCode::new(code).unwrap(), kind, value, now - Duration::days(1), now + Duration::days(7));
        edit(&mut v);
        f.store.insert_voucher(&v).await.unwrap();
        v
    }

    #[tokio::test]
    async fn test_reprices_from_current_sale() {
        let f = fixture(PricedItem::new(dec!(100000)).with_percentage(dec!(20)).on_sale(None, None), 10).await;
        fill_cart(&f, "s1", 2).await;
        let order = f.service.place_order(request("s1", "u1", None)).await.unwrap();
        assert_eq!(order.items()[0].unit_price.amount(), dec!(80000));
        assert_eq!(order.subtotal().amount(), dec!(160000));
        assert_eq!(order.shipping_fee().amount(), dec!(30000));
        assert_eq!(order.total().amount(), dec!(190000));
        assert!(f.store.load_cart("s1", "VND").await.unwrap().is_empty());
        assert_eq!(f.store.get_book(f.book.id()).await.unwrap().unwrap().stock().value(), 8);
    }

    #[tokio::test]
    async fn test_percentage_voucher_is_capped() {
        let f = fixture(PricedItem::new(dec!(150000)), 10).await;
        add_voucher(&f, "SACH10", VoucherType::Percentage, dec!(10), |v| v.maximum_discount_amount = Some(dec!(20000))).await;
        fill_cart(&f, "s1", 2).await;
        let order = f.service.place_order(request("s1", "u1", Some("sach10"))).await.unwrap();
        assert_eq!(order.discount().amount(), dec!(20000));
        assert_eq!(order.total().amount(), dec!(310000));
        assert_eq!(f.store.find_voucher(&VoucherCode::new("SACH10").unwrap()).await.unwrap().unwrap().used_count, 1);
    }

    #[tokio::test]
    async fn test_free_shipping_voucher() {
        let f = fixture(PricedItem::new(dec!(90000)), 10).await;
        add_voucher(&f, "FREESHIP", VoucherType::FreeShipping, Decimal::ZERO, |_| {}).await;
        fill_cart(&f, "s1", 1).await;
        let order = f.service.place_order(request("s1", "u1", Some("FREESHIP"))).await.unwrap();
        assert_eq!(order.discount().amount(), Decimal::ZERO);
        assert_eq!(order.shipping_fee().amount(), Decimal::ZERO);
        assert_eq!(order.total().amount(), dec!(90000));
    }

    #[tokio::test]
    async fn test_below_minimum_keeps_cart() {
        let f = fixture(PricedItem::new(dec!(50000)), 10).await;
        add_voucher(&f, "MIN100K", VoucherType::FixedAmount, dec!(15000), |v| v.minimum_order_amount = dec!(100000)).await;
        fill_cart(&f, "s1", 1).await;
        let err = f.service.place_order(request("s1", "u1", Some("MIN100K"))).await.unwrap_err();
        assert!(matches!(err, BookstoreError::Voucher(VoucherRejection::BelowMinimumOrder)));
        assert!(!f.store.load_cart("s1", "VND").await.unwrap().is_empty());
        assert_eq!(f.store.list_orders(None, Default::default()).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_per_user_limit() {
        let f = fixture(PricedItem::new(dec!(200000)), 10).await;
        add_voucher(&f, "WELCOME", VoucherType::FixedAmount, dec!(25000), |v| v.usage_limit_per_user = Some(1)).await;
        fill_cart(&f, "s1", 1).await;
        f.service.place_order(request("s1", "u1", Some("welcome"))).await.unwrap();
        fill_cart(&f, "s1", 1).await;
        let err = f.service.place_order(request("s1", "u1", Some("welcome"))).await.unwrap_err();
        assert!(matches!(err, BookstoreError::Voucher(VoucherRejection::PerUserLimitReached)));
        fill_cart(&f, "s2", 1).await;
        assert!(f.service.place_order(request("s2", "u2", Some("welcome"))).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_voucher_and_empty_cart() {
        let f = fixture(PricedItem::new(dec!(10000)), 1).await;
        assert!(matches!(f.service.place_order(request("none", "u1", None)).await, Err(BookstoreError::EmptyCart)));
        fill_cart(&f, "s1", 1).await;
        assert!(matches!(f.service.place_order(request("s1", "u1", Some("NOPE"))).await, Err(BookstoreError::VoucherNotFound)));
    }

    #[tokio::test]
    async fn test_preview_does_not_redeem() {
        let f = fixture(PricedItem::new(dec!(10000)), 1).await;
        let v = add_voucher(&f, "GIAM50", VoucherType::FixedAmount, dec!(50000), |_| {}).await;
        let quote = f.service.preview_voucher("giam50", "u1", dec!(300000)).await.unwrap();
        assert_eq!(quote.discount, dec!(50000));
        assert_eq!(quote.amount_after_discount, dec!(250000));
        assert_eq!(f.store.find_voucher(&v.code).await.unwrap().unwrap().used_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_restocks() {
        let f = fixture(PricedItem::new(dec!(10000)), 3).await;
        fill_cart(&f, "s1", 3).await;
        let order = f.service.place_order(request("s1", "u1", None)).await.unwrap();
        assert_eq!(f.store.get_book(f.book.id()).await.unwrap().unwrap().stock().value(), 0);
        let cancelled = f.service.cancel_order(order).await.unwrap();
        assert_eq!(cancelled.status(), crate::domain::aggregates::OrderStatus::Cancelled);
        assert_eq!(f.store.get_book(f.book.id()).await.unwrap().unwrap().stock().value(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_cancels_restock_once() {
        let f = fixture(PricedItem::new(dec!(10000)), 3).await;
        fill_cart(&f, "s1", 3).await;
        let placed = f.service.place_order(request("s1", "u1", None)).await.unwrap();
        let first = f.store.get_order(placed.id()).await.unwrap().unwrap();
        let second = f.store.get_order(placed.id()).await.unwrap().unwrap();

        let (a, b) = tokio::join!(f.service.cancel_order(first), f.service.cancel_order(second));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let err = a.err().or(b.err()).unwrap();
        assert!(matches!(err, BookstoreError::Order(crate::domain::aggregates::OrderError::InvalidTransition { .. })));
        assert_eq!(f.store.get_book(f.book.id()).await.unwrap().unwrap().stock().value(), 3);
    }
}
