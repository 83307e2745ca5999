//! Unit scaling between human-readable amounts and on-chain integer units.
//!
//! The native coin (CVX) has 9 decimal places; generic fungible tokens are
//! assumed to have 6. Conversion truncates toward zero, so any fraction
//! smaller than one unit is dropped.

use thiserror::Error;

/// Errors returned when an amount cannot be represented in integer units.
#[derive(Debug, Error, PartialEq)]
pub enum UnitsError {
    #[error("amount must be a finite number, got {0}")]
    NotFinite(f64),

    #[error("amount must not be negative, got {0}")]
    Negative(f64),

    #[error("amount {0} is too large to represent in integer units")]
    TooLarge(f64),
}

/// Number of decimal places between a display amount and its integer units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimals(u8);

impl Decimals {
    /// CVX: 1 CVX = 10^9 copper.
    pub const NATIVE: Decimals = Decimals(9);

    /// Default for fungible tokens.
    pub const TOKEN: Decimals = Decimals(6);

    pub const fn new(places: u8) -> Self {
        Self(places)
    }

    pub fn places(self) -> u8 {
        self.0
    }

    fn factor(self) -> f64 {
        10f64.powi(i32::from(self.0))
    }

    /// Convert a display amount to integer units, truncating.
    pub fn to_units(self, amount: f64) -> Result<u64, UnitsError> {
        if !amount.is_finite() {
            return Err(UnitsError::NotFinite(amount));
        }
        if amount < 0.0 {
            return Err(UnitsError::Negative(amount));
        }
        let scaled = (amount * self.factor()).floor();
        if scaled >= u64::MAX as f64 {
            return Err(UnitsError::TooLarge(amount));
        }
        Ok(scaled as u64)
    }

    /// Convert a raw integer amount back to a display amount.
    pub fn from_units(self, raw: f64) -> f64 {
        raw / self.factor()
    }
}

/// `floor(amount * 10^9)`.
pub fn native_units(amount: f64) -> Result<u64, UnitsError> {
    Decimals::NATIVE.to_units(amount)
}

/// `floor(amount * 10^6)`.
pub fn token_units(amount: f64) -> Result<u64, UnitsError> {
    Decimals::TOKEN.to_units(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_scaling() {
        assert_eq!(native_units(2.5), Ok(2_500_000_000));
        assert_eq!(native_units(1.0), Ok(1_000_000_000));
    }

    #[test]
    fn token_scaling() {
        assert_eq!(token_units(2.5), Ok(2_500_000));
        assert_eq!(token_units(0.5), Ok(500_000));
    }

    #[test]
    fn sub_unit_fraction_is_dropped() {
        assert_eq!(native_units(0.0000000009), Ok(0));
        assert_eq!(token_units(0.0000009), Ok(0));
        assert_eq!(token_units(1.0000009), Ok(1_000_000));
    }

    #[test]
    fn zero_is_zero() {
        assert_eq!(native_units(0.0), Ok(0));
    }

    #[test]
    fn rejects_negative() {
        assert_eq!(native_units(-1.0), Err(UnitsError::Negative(-1.0)));
    }

    #[test]
    fn rejects_non_finite() {
        assert!(matches!(token_units(f64::NAN), Err(UnitsError::NotFinite(_))));
        assert!(matches!(
            token_units(f64::INFINITY),
            Err(UnitsError::NotFinite(_))
        ));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(native_units(1e40), Err(UnitsError::TooLarge(_))));
    }

    #[test]
    fn custom_decimals() {
        assert_eq!(Decimals::new(2).to_units(1.239), Ok(123));
        assert_eq!(Decimals::new(0).to_units(7.9), Ok(7));
    }

    #[test]
    fn from_units_undoes_token_scale() {
        assert!((Decimals::TOKEN.from_units(1_500_000.0) - 1.5).abs() < f64::EPSILON);
    }
}
