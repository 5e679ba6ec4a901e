//! Decimal arithmetic helpers.
//!
//! Amounts are natural numbers (`u128`); ratios, prices and scores are
//! [`Dec`]. Every conversion between the two is checked and truncates
//! toward zero, matching the chain's `TruncateInt` semantics.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

pub use rust_decimal::Decimal as Dec;

/// Fractional digits carried by the chain's legacy decimal wire encoding.
pub const LEGACY_DEC_PRECISION: u32 = 18;

/// Arithmetic failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("negative value where a natural number is required: {0}")]
    Negative(Dec),

    #[error("invalid decimal {input:?}: {reason}")]
    Parse { input: String, reason: String },
}

/// Lift an integer amount into a decimal.
///
/// # Errors
///
/// Returns [`MathError::Overflow`] if the amount exceeds the decimal range.
pub fn dec_from_amount(amount: u128) -> Result<Dec, MathError> {
    Dec::from_u128(amount).ok_or(MathError::Overflow)
}

/// Truncate a non-negative decimal to an integer amount.
///
/// # Errors
///
/// Returns [`MathError::Negative`] for values below zero.
pub fn truncate(value: Dec) -> Result<u128, MathError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MathError::Negative(value));
    }
    value.trunc().to_u128().ok_or(MathError::Overflow)
}

/// `trunc(amount × factor)`.
///
/// # Errors
///
/// Returns [`MathError::Overflow`] or [`MathError::Negative`].
pub fn mul_truncate(amount: u128, factor: Dec) -> Result<u128, MathError> {
    let product = dec_from_amount(amount)?
        .checked_mul(factor)
        .ok_or(MathError::Overflow)?;
    truncate(product)
}

/// Checked multiplication.
///
/// # Errors
///
/// Returns [`MathError::Overflow`].
pub fn mul(a: Dec, b: Dec) -> Result<Dec, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

/// Checked addition.
///
/// # Errors
///
/// Returns [`MathError::Overflow`].
pub fn add(a: Dec, b: Dec) -> Result<Dec, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// Checked division guarding against a zero divisor.
///
/// # Errors
///
/// Returns [`MathError::DivisionByZero`] or [`MathError::Overflow`].
pub fn quo(a: Dec, b: Dec) -> Result<Dec, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    a.checked_div(b).ok_or(MathError::Overflow)
}

/// Parse a human-readable decimal (`"0.34"`, `"12"`).
///
/// # Errors
///
/// Returns [`MathError::Parse`] for malformed input.
pub fn parse_dec(input: &str) -> Result<Dec, MathError> {
    Dec::from_str(input.trim()).map_err(|e| MathError::Parse {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse the chain's legacy decimal wire text: an integer scaled by 10^18.
///
/// `"1011799284893187069"` decodes to `1.011799284893187069`. Values too
/// wide for [`Dec`] at full scale drop their lowest fractional digits.
///
/// # Errors
///
/// Returns [`MathError::Parse`] for malformed input or values outside the
/// decimal range.
pub fn parse_legacy_dec(input: &str) -> Result<Dec, MathError> {
    let parse_err = |reason: String| MathError::Parse {
        input: input.to_string(),
        reason,
    };
    let mut raw: i128 = input.trim().parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?;
    let mut scale = LEGACY_DEC_PRECISION;
    loop {
        match Dec::try_from_i128_with_scale(raw, scale) {
            Ok(d) => return Ok(d.normalize()),
            Err(_) if scale > 0 => {
                raw /= 10;
                scale -= 1;
            }
            Err(e) => return Err(parse_err(e.to_string())),
        }
    }
}

/// Parse decimal text, dropping fractional digits beyond [`Dec`]'s scale.
///
/// Some chains emit 36 fractional digits (`"1.000000000000000000000000000000000000"`).
///
/// # Errors
///
/// Returns [`MathError::Parse`] for malformed input.
pub fn parse_dec_truncating(input: &str) -> Result<Dec, MathError> {
    let trimmed = input.trim();
    let clipped = match trimmed.split_once('.') {
        Some((whole, frac)) if frac.len() > LEGACY_DEC_PRECISION as usize => {
            match frac.get(..LEGACY_DEC_PRECISION as usize) {
                Some(kept) => format!("{whole}.{kept}"),
                None => trimmed.to_string(),
            }
        }
        _ => trimmed.to_string(),
    };
    parse_dec(&clipped)
}

/// Parse an integer amount encoded as decimal text.
///
/// # Errors
///
/// Returns [`MathError::Parse`] for malformed input.
pub fn parse_amount(input: &str) -> Result<u128, MathError> {
    input.trim().parse().map_err(|e: std::num::ParseIntError| MathError::Parse {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_truncate_floors() {
        let third = quo(Dec::ONE, Dec::from(3)).expect("quo");
        assert_eq!(mul_truncate(5000, third).expect("mul"), 1666);
        assert_eq!(mul_truncate(164_133_471_813, Dec::new(34, 2)).expect("mul"), 55_805_380_416);
    }

    #[test]
    fn test_quo_by_zero() {
        assert_eq!(quo(Dec::ONE, Dec::ZERO), Err(MathError::DivisionByZero));
    }

    #[test]
    fn test_truncate_negative_rejected() {
        let err = truncate(Dec::new(-5, 1)).expect_err("negative");
        assert!(matches!(err, MathError::Negative(_)));
        assert_eq!(truncate(Dec::new(99, 1)).expect("truncate"), 9);
    }

    #[test]
    fn test_amount_out_of_decimal_range() {
        assert_eq!(dec_from_amount(u128::MAX), Err(MathError::Overflow));
    }

    #[test]
    fn test_parse_legacy_dec() {
        let rate = parse_legacy_dec("1011799284893187069").expect("parse");
        assert_eq!(rate, parse_dec("1.011799284893187069").expect("parse"));
        assert_eq!(parse_legacy_dec("2000000000000000000").expect("parse"), Dec::TWO);
        assert!(parse_legacy_dec("1.5").is_err());
        let wide = parse_legacy_dec("150000000000000000000000000000000000").expect("wide");
        assert_eq!(wide, Dec::from(150_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_dec_truncating() {
        let sqrt = parse_dec_truncating("1.000000000000000000999999999999999999").expect("parse");
        assert_eq!(sqrt, Dec::ONE);
        assert_eq!(parse_dec_truncating("0.5").expect("parse"), Dec::new(5, 1));
        assert!(parse_dec_truncating("abc").is_err());
    }
}
