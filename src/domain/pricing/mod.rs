//! Pricing rules: book sale discounts and order vouchers.
//!
//! Everything here is a pure function of the supplied snapshot. Vouchers are
//! never mutated by validation; redemption is recorded by the order store.
pub mod book_discount;
pub mod voucher;

pub use book_discount::{compute_final_price, PricedItem};
pub use voucher::{Voucher, VoucherRejection, VoucherType};
