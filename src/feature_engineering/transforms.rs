//! Scalar feature transforms

use crate::schema::LeaseType;

/// `ln(1 + v)`. Negative inputs are passed through to `ln_1p` unchecked.
#[inline]
pub fn log_transform(value: f64) -> f64 {
    value.ln_1p()
}

/// Inverse of [`log_transform`]: `exp(y) - 1`
#[inline]
pub fn inverse_log_transform(value: f64) -> f64 {
    value.exp_m1()
}

/// Lease-equivalent value of a contract in 만원.
///
/// A monthly-rent contract is converted by capitalising twelve months of
/// rent at `rate`; a lease contract is worth its deposit.
pub fn unified_value(deposit: i64, monthly_rent: i64, lease: LeaseType, rate: f64) -> i64 {
    match lease {
        LeaseType::Rent => (deposit as f64 + monthly_rent as f64 * 12.0 / rate).round() as i64,
        LeaseType::Lease => deposit,
    }
}
