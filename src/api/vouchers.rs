//! Voucher administration and validation endpoints

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::error::ApiResult;
use super::{non_negative, AppState, Caller};
use crate::checkout::VoucherQuote;
use crate::domain::pricing::{Voucher, VoucherType};
use crate::domain::value_objects::VoucherCode;
use crate::store::VoucherRepository;
use crate::BookstoreError;

/// Editable voucher terms.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "consistent_terms"))]
pub struct VoucherTerms {
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub voucher_type: VoucherType,
    #[serde(default)]
    #[validate(custom = "non_negative")]
    pub value: Decimal,
    #[serde(default)]
    #[validate(custom = "non_negative")]
    pub minimum_order_amount: Decimal,
    #[validate(custom = "non_negative")]
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub usage_limit_per_user: Option<u32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool { true }

fn consistent_terms(t: &VoucherTerms) -> Result<(), ValidationError> {
    if t.end_date <= t.start_date { return Err(ValidationError::new("end_date_before_start_date")); }
    if t.voucher_type == VoucherType::Percentage && (t.value <= Decimal::ZERO || t.value > Decimal::ONE_HUNDRED) {
        return Err(ValidationError::new("percentage_out_of_range"));
    }
    if t.voucher_type == VoucherType::FixedAmount && t.value <= Decimal::ZERO {
        return Err(ValidationError::new("fixed_amount_must_be_positive"));
    }
    Ok(())
}

impl VoucherTerms {
    fn apply_to(self, v: &mut Voucher) {
        v.description = self.description;
        v.voucher_type = self.voucher_type;
        v.value = self.value;
        v.minimum_order_amount = self.minimum_order_amount;
        v.maximum_discount_amount = self.maximum_discount_amount;
        v.usage_limit = self.usage_limit;
        v.usage_limit_per_user = self.usage_limit_per_user;
        v.start_date = self.start_date;
        v.end_date = self.end_date;
        v.is_active = self.is_active;
        v.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVoucherRequest {
    pub code: String,
    #[serde(flatten)]
    #[validate]
    pub terms: VoucherTerms,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateVoucherRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: String,
    #[validate(custom = "non_negative")]
    pub order_amount: Decimal,
}

fn parse_code(raw: &str) -> ApiResult<VoucherCode> {
    VoucherCode::new(raw).map_err(|e| BookstoreError::Validation(e.to_string()).into())
}

pub async fn list_vouchers(State(s): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Voucher>>> {
    caller.require_admin()?;
    Ok(Json(s.store.list_vouchers().await?))
}

pub async fn get_voucher(State(s): State<AppState>, caller: Caller, Path(code): Path<String>) -> ApiResult<Json<Voucher>> {
    caller.require_admin()?;
    let code = parse_code(&code)?;
    Ok(Json(s.store.find_voucher(&code).await?.ok_or(BookstoreError::VoucherNotFound)?))
}

pub async fn create_voucher(State(s): State<AppState>, caller: Caller, Json(r): Json<CreateVoucherRequest>) -> ApiResult<(StatusCode, Json<Voucher>)> {
    caller.require_admin()?;
    r.validate()?;
    let code = parse_code(&r.code)?;
    let mut voucher = Voucher::new(code, r.terms.voucher_type, r.terms.value, r.terms.start_date, r.terms.end_date);
    r.terms.apply_to(&mut voucher);
    s.store.insert_voucher(&voucher).await?;
    tracing::info!(code = %voucher.code, kind = voucher.voucher_type.as_str(), "voucher created");
    Ok((StatusCode::CREATED, Json(voucher)))
}

/// Replaces the voucher's terms; the code and usage count are kept.
pub async fn update_voucher(State(s): State<AppState>, caller: Caller, Path(code): Path<String>, Json(r): Json<VoucherTerms>) -> ApiResult<Json<Voucher>> {
    caller.require_admin()?;
    r.validate()?;
    let code = parse_code(&code)?;
    let mut voucher = s.store.find_voucher(&code).await?.ok_or(BookstoreError::VoucherNotFound)?;
    if let Some(limit) = r.usage_limit.filter(|l| *l < voucher.used_count) {
        return Err(BookstoreError::Validation(below_usage(limit, voucher.used_count)).into());
    }
    r.apply_to(&mut voucher);
    s.store.save_voucher(&voucher).await?;
    Ok(Json(voucher))
}

fn below_usage(limit: u32, used: u32) -> String {
    format!("usage_limit {limit} is below the {used} redemptions already made")
}

/// Quotes the discount for the caller without redeeming the voucher.
pub async fn validate_voucher(State(s): State<AppState>, caller: Caller, Json(r): Json<ValidateVoucherRequest>) -> ApiResult<Json<VoucherQuote>> {
    r.validate()?;
    Ok(Json(s.checkout.preview_voucher(&r.code, &caller.user_id, r.order_amount).await?))
}
