//! Value Objects for the bookstore

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CURRENCY: &str = "VND";

/// ISBN-10 or ISBN-13, stored without separators
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    pub fn new(value: impl Into<String>) -> Result<Self, IsbnError> {
        let value: String = value.into().chars().filter(|c| !matches!(c, '-' | ' ')).collect::<String>().to_uppercase();
        if value.is_empty() { return Err(IsbnError::Empty); }
        match value.len() {
            10 => Self::check_isbn10(&value)?,
            13 => Self::check_isbn13(&value)?,
            _ => return Err(IsbnError::InvalidLength),
        }
        Ok(Self(value))
    }

    fn check_isbn10(v: &str) -> Result<(), IsbnError> {
        let mut sum = 0u32;
        for (i, c) in v.chars().enumerate() {
            let digit = match (i, c) {
                (9, 'X') => 10,
                (_, c) => c.to_digit(10).ok_or(IsbnError::InvalidCharacter)?,
            };
            sum += digit * (10 - i as u32);
        }
        if sum % 11 == 0 { Ok(()) } else { Err(IsbnError::BadChecksum) }
    }

    fn check_isbn13(v: &str) -> Result<(), IsbnError> {
        let mut sum = 0u32;
        for (i, c) in v.chars().enumerate() {
            let digit = c.to_digit(10).ok_or(IsbnError::InvalidCharacter)?;
            sum += if i % 2 == 0 { digit } else { digit * 3 };
        }
        if sum % 10 == 0 { Ok(()) } else { Err(IsbnError::BadChecksum) }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Isbn {
    type Error = IsbnError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self { isbn.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum IsbnError { Empty, InvalidLength, InvalidCharacter, BadChecksum }
impl std::error::Error for IsbnError {}
impl fmt::Display for IsbnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "ISBN empty"),
            Self::InvalidLength => write!(f, "ISBN must have 10 or 13 digits"),
            Self::InvalidCharacter => write!(f, "ISBN contains invalid characters"),
            Self::BadChecksum => write!(f, "ISBN checksum mismatch"),
        }
    }
}

/// Voucher code. Codes compare case-insensitively, so they are kept uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoucherCode(String);

impl VoucherCode {
    pub fn new(value: impl Into<String>) -> Result<Self, VoucherCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(VoucherCodeError::Empty); }
        if value.len() < 3 || value.len() > 30 { return Err(VoucherCodeError::InvalidLength); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(VoucherCodeError::InvalidCharacter);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for VoucherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for VoucherCode {
    type Error = VoucherCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<VoucherCode> for String {
    fn from(code: VoucherCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum VoucherCodeError { Empty, InvalidLength, InvalidCharacter }
impl std::error::Error for VoucherCodeError {}
impl fmt::Display for VoucherCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "voucher code empty"),
            Self::InvalidLength => write!(f, "voucher code must be 3-30 characters"),
            Self::InvalidCharacter => write!(f, "voucher code may only contain letters, digits, '-' and '_'"),
        }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn vnd(amount: Decimal) -> Self { Self::new(amount, DEFAULT_CURRENCY) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    /// Subtracts `other`, bottoming out at zero.
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new((self.amount - other.amount).max(Decimal::ZERO), &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
}

impl Default for Money { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(0), self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Review star rating, 1 to 5
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: u8) -> Result<Self, RatingError> {
        if (1..=5).contains(&value) { Ok(Self(value)) } else { Err(RatingError) }
    }
    pub fn value(&self) -> u8 { self.0 }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;
    fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self { r.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct RatingError;
impl std::error::Error for RatingError {}
impl fmt::Display for RatingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "rating must be between 1 and 5") }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_isbn() {
        assert_eq!(Isbn::new("978-604-1-08525-1").unwrap().as_str(), "9786041085251");
        assert_eq!(Isbn::new("0-8044-2957-x").unwrap().as_str(), "080442957X");
        assert_eq!(Isbn::new("978-604-1-08525-2"), Err(IsbnError::BadChecksum));
        assert_eq!(Isbn::new("12345"), Err(IsbnError::InvalidLength));
        assert_eq!(Isbn::new("97860410852A1"), Err(IsbnError::InvalidCharacter));
        assert_eq!(Isbn::new(" - "), Err(IsbnError::Empty));
    }
    #[test]
    fn test_voucher_code_case_insensitive() {
        assert_eq!(VoucherCode::new(" sach10 ").unwrap(), VoucherCode::new("SACH10").unwrap());
        assert_eq!(VoucherCode::new("ab"), Err(VoucherCodeError::InvalidLength));
        assert_eq!(VoucherCode::new("GIẢM10"), Err(VoucherCodeError::InvalidCharacter));
    }
    #[test]
    fn test_money_add() {
        let a = Money::vnd(Decimal::new(100000, 0));
        let b = Money::vnd(Decimal::new(50000, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150000, 0));
        assert_eq!(b.saturating_sub(&a).unwrap().amount(), Decimal::ZERO);
        assert_eq!(a.add(&Money::new(Decimal::ONE, "USD")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_rating() {
        assert!(Rating::new(0).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(serde_json::from_str::<Rating>("6").is_err());
    }
}
