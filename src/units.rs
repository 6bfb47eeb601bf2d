//! Conversion between human token units (`f64`) and smallest-unit
//! fixed-point integers (`U256`) at the chain boundary.
//!
//! Plan arithmetic runs entirely in human units; only deposit, withdraw,
//! and ledger calls cross this boundary, scaled by the token's decimal
//! precision. Fractional digits beyond the token's precision are
//! truncated, never rounded up.

use alloy::primitives::U256;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UnitsError {
    #[error("amount is not a finite number: {0}")]
    NotFinite(f64),
    #[error("amount cannot be negative: {0}")]
    Negative(f64),
    #[error("amount {amount} overflows at {decimals} decimals")]
    Overflow { amount: f64, decimals: u8 },
    #[error("chain amount {0} exceeds the representable range")]
    TooLarge(U256),
}

/// Scales a human-unit amount to smallest units at the given decimal
/// precision, e.g. `1.5` USDC (6 decimals) becomes `1_500_000`.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<U256, UnitsError> {
    if !amount.is_finite() {
        return Err(UnitsError::NotFinite(amount));
    }

    if amount < 0.0 {
        return Err(UnitsError::Negative(amount));
    }

    let decimal =
        Decimal::try_from(amount).map_err(|_| UnitsError::Overflow { amount, decimals })?;

    let scaled = decimal
        .checked_mul(Decimal::from(10u128.pow(u32::from(decimals))))
        .ok_or(UnitsError::Overflow { amount, decimals })?
        .trunc();

    // trunc() leaves no fractional digits, so the string is a plain integer
    U256::from_str_radix(&scaled.to_string(), 10)
        .map_err(|_| UnitsError::Overflow { amount, decimals })
}

/// Scales a smallest-unit amount back to human units. Lossy beyond
/// `f64` precision, which is the convention for plan arithmetic.
pub fn from_base_units(amount: U256, decimals: u8) -> Result<f64, UnitsError> {
    let raw: u128 = amount
        .try_into()
        .map_err(|_| UnitsError::TooLarge(amount))?;

    Ok(raw as f64 / 10f64.powi(i32::from(decimals)))
}
