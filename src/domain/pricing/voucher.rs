//! Voucher validation and discount calculation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::VoucherCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    Percentage,
    FixedAmount,
    /// Waives the order's shipping fee; contributes no item discount.
    FreeShipping,
}

impl VoucherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
            Self::FreeShipping => "free_shipping",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(Self::Percentage),
            "fixed_amount" => Some(Self::FixedAmount),
            "free_shipping" => Some(Self::FreeShipping),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Uuid,
    pub code: VoucherCode,
    pub description: Option<String>,
    pub voucher_type: VoucherType,
    pub value: Decimal,
    pub minimum_order_amount: Decimal,
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub usage_limit_per_user: Option<u32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a voucher cannot be used for an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherRejection {
    #[error("Mã giảm giá đã bị vô hiệu hóa")]
    Inactive,
    #[error("Mã giảm giá chưa đến thời gian sử dụng")]
    NotStarted,
    #[error("Mã giảm giá đã hết hạn")]
    Expired,
    #[error("Mã giảm giá đã hết lượt sử dụng")]
    UsageLimitReached,
    #[error("Bạn đã dùng hết số lượt cho mã giảm giá này")]
    PerUserLimitReached,
    #[error("Đơn hàng chưa đạt giá trị tối thiểu để dùng mã")]
    BelowMinimumOrder,
}

impl VoucherRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Inactive => "voucher_inactive",
            Self::NotStarted => "voucher_not_started",
            Self::Expired => "voucher_expired",
            Self::UsageLimitReached => "voucher_usage_limit_reached",
            Self::PerUserLimitReached => "voucher_per_user_limit_reached",
            Self::BelowMinimumOrder => "voucher_below_minimum_order",
        }
    }
}

impl Voucher {
    pub fn new(code: VoucherCode, voucher_type: VoucherType, value: Decimal, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), code, description: None, voucher_type, value,
            minimum_order_amount: Decimal::ZERO, maximum_discount_amount: None,
            usage_limit: None, used_count: 0, usage_limit_per_user: None,
            start_date, end_date, is_active: true, created_at: now, updated_at: now,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.map_or(false, |limit| self.used_count >= limit)
    }

    /// Checks whether the voucher may be used on an order of `order_amount`
    /// by a user who has already redeemed it `user_redemptions` times.
    pub fn validate(&self, order_amount: Decimal, user_redemptions: u32, now: DateTime<Utc>) -> Result<(), VoucherRejection> {
        if !self.is_active { return Err(VoucherRejection::Inactive); }
        if now < self.start_date { return Err(VoucherRejection::NotStarted); }
        if now > self.end_date { return Err(VoucherRejection::Expired); }
        if self.is_exhausted() { return Err(VoucherRejection::UsageLimitReached); }
        if order_amount < self.minimum_order_amount { return Err(VoucherRejection::BelowMinimumOrder); }
        if self.usage_limit_per_user.map_or(false, |limit| user_redemptions >= limit) {
            return Err(VoucherRejection::PerUserLimitReached);
        }
        Ok(())
    }

    /// Discount granted on `order_amount`, within `[0, order_amount]`.
    pub fn apply(&self, order_amount: Decimal) -> Decimal {
        let order_amount = order_amount.max(Decimal::ZERO);
        let raw = match self.voucher_type {
            VoucherType::Percentage => {
                let pct = order_amount * self.value / Decimal::ONE_HUNDRED;
                match self.maximum_discount_amount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            VoucherType::FixedAmount => self.value,
            VoucherType::FreeShipping => Decimal::ZERO,
        };
        raw.clamp(Decimal::ZERO, order_amount)
    }

    pub fn waives_shipping(&self) -> bool { self.voucher_type == VoucherType::FreeShipping }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn voucher(kind: VoucherType, value: Decimal) -> Voucher {
        let now = Utc::now();
        Voucher::new(VoucherCode::new("SACH10").unwrap(), kind, value, now - Duration::days(1), now + Duration::days(30))
    }

    #[test]
    fn percentage_is_capped() {
        let mut v = voucher(VoucherType::Percentage, dec!(10));
        v.maximum_discount_amount = Some(dec!(20000));
        assert_eq!(v.apply(dec!(300000)), dec!(20000));
        assert_eq!(v.apply(dec!(150000)), dec!(15000));
    }

    #[test]
    fn fixed_amount_never_exceeds_order() {
        let v = voucher(VoucherType::FixedAmount, dec!(50000));
        assert_eq!(v.apply(dec!(200000)), dec!(50000));
        assert_eq!(v.apply(dec!(30000)), dec!(30000));
    }

    #[test]
    fn free_shipping_gives_no_item_discount() {
        let v = voucher(VoucherType::FreeShipping, dec!(30000));
        assert_eq!(v.apply(dec!(200000)), Decimal::ZERO);
        assert!(v.waives_shipping());
    }

    #[test]
    fn below_minimum_order() {
        let mut v = voucher(VoucherType::FixedAmount, dec!(10000));
        v.minimum_order_amount = dec!(100000);
        assert_eq!(v.validate(dec!(50000), 0, Utc::now()), Err(VoucherRejection::BelowMinimumOrder));
        assert_eq!(v.validate(dec!(100000), 0, Utc::now()), Ok(()));
    }

    #[test]
    fn date_window() {
        let v = voucher(VoucherType::Percentage, dec!(5));
        assert_eq!(v.validate(dec!(1), 0, v.start_date - Duration::seconds(1)), Err(VoucherRejection::NotStarted));
        assert_eq!(v.validate(dec!(1), 0, v.end_date + Duration::seconds(1)), Err(VoucherRejection::Expired));
        assert_eq!(v.validate(dec!(1), 0, v.end_date), Ok(()));
    }

    #[test]
    fn inactive_takes_precedence() {
        let mut v = voucher(VoucherType::Percentage, dec!(5));
        v.is_active = false;
        v.minimum_order_amount = dec!(1000000);
        assert_eq!(v.validate(dec!(1), 0, Utc::now()), Err(VoucherRejection::Inactive));
    }

    #[test]
    fn usage_limits() {
        let mut v = voucher(VoucherType::Percentage, dec!(5));
        v.usage_limit = Some(2);
        v.used_count = 2;
        assert_eq!(v.validate(dec!(1), 0, Utc::now()), Err(VoucherRejection::UsageLimitReached));
        v.used_count = 1;
        v.usage_limit_per_user = Some(1);
        assert_eq!(v.validate(dec!(1), 1, Utc::now()), Err(VoucherRejection::PerUserLimitReached));
        assert_eq!(v.validate(dec!(1), 0, Utc::now()), Ok(()));
    }

    #[test]
    fn validate_does_not_mutate() {
        let v = voucher(VoucherType::Percentage, dec!(5));
        let before = v.clone();
        let _ = v.validate(dec!(10), 0, Utc::now());
        let _ = v.apply(dec!(10));
        assert_eq!(v, before);
    }
}
