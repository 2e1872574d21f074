//! Book sale pricing

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price attributes of a sellable book.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    pub base_price: Decimal,
    #[serde(default)]
    pub discount_percentage: Option<Decimal>,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub is_on_sale: bool,
    #[serde(default)]
    pub sale_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sale_end: Option<DateTime<Utc>>,
}

impl PricedItem {
    pub fn new(base_price: Decimal) -> Self {
        Self { base_price, ..Self::default() }
    }

    pub fn with_percentage(mut self, pct: Decimal) -> Self {
        self.discount_percentage = Some(pct);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.discount_amount = amount;
        self
    }

    pub fn on_sale(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.is_on_sale = true;
        self.sale_start = start;
        self.sale_end = end;
        self
    }

    fn percentage(&self) -> Decimal {
        self.discount_percentage.unwrap_or(Decimal::ZERO).clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    }

    fn amount(&self) -> Decimal { self.discount_amount.max(Decimal::ZERO) }

    /// `[sale_start, sale_end]`, either bound open when missing.
    pub fn in_sale_window(&self, now: DateTime<Utc>) -> bool {
        self.sale_start.map_or(true, |start| now >= start) && self.sale_end.map_or(true, |end| now <= end)
    }

    /// A discount applies when one is configured and, for items flagged as on
    /// sale, `now` falls inside the sale window. Items not flagged as on sale
    /// keep their discount regardless of the window.
    pub fn is_discount_active(&self, now: DateTime<Utc>) -> bool {
        let has_discount = self.percentage() > Decimal::ZERO || self.amount() > Decimal::ZERO;
        has_discount && (!self.is_on_sale || self.in_sale_window(now))
    }
}

/// Price charged for `item` at `now`. Always within `[0, base_price]`.
pub fn compute_final_price(item: &PricedItem, now: DateTime<Utc>) -> Decimal {
    let base = item.base_price.max(Decimal::ZERO);
    if !item.is_discount_active(now) {
        return base;
    }
    let discount = base * item.percentage() / Decimal::ONE_HUNDRED + item.amount();
    (base - discount).max(Decimal::ZERO)
}
