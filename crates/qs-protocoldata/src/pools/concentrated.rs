//! Concentrated-liquidity pools and Osmosis tick math.
//!
//! Ticks are geometric in exponent and additive within an exponent: every
//! `9 * 10^6` ticks the price gains a power of ten, starting from a
//! per-tick increment of `10^-6` at price one.

use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use qs_types::encoding::u64_lenient;
use qs_types::math::{add, mul, quo, truncate};
use qs_types::{Coin, Dec, MathError};

use super::wide_dec;
use crate::{ProtocolDataError, Result};

/// Exponent of the per-tick price increment at price one.
pub const EXPONENT_AT_PRICE_ONE: i64 = -6;

/// Ticks between successive powers of ten.
pub const TICKS_PER_EXPONENT: i64 = 9_000_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClPool {
    #[serde(with = "u64_lenient")]
    pub id: u64,
    pub token0: String,
    pub token1: String,
    #[serde(with = "wide_dec")]
    pub current_sqrt_price: Dec,
    #[serde(default)]
    pub current_tick: i64,
}

fn pow10(exponent: i64) -> Result<Dec> {
    if exponent >= 0 {
        let e = u32::try_from(exponent).map_err(|_| MathError::Overflow)?;
        let value = 10u128.checked_pow(e).ok_or(MathError::Overflow)?;
        Ok(qs_types::math::dec_from_amount(value)?)
    } else {
        let scale = u32::try_from(-exponent).map_err(|_| MathError::Overflow)?;
        if scale > 28 {
            return Err(MathError::Overflow.into());
        }
        Ok(Dec::new(1, scale))
    }
}

/// Price at `tick`.
///
/// # Errors
///
/// Returns [`MathError::Overflow`] for ticks whose price leaves the
/// decimal range.
pub fn tick_to_price(tick: i64) -> Result<Dec> {
    if tick == 0 {
        return Ok(Dec::ONE);
    }
    let geometric_delta = tick / TICKS_PER_EXPONENT;
    let mut exponent = EXPONENT_AT_PRICE_ONE + geometric_delta;
    if tick < 0 {
        exponent -= 1;
    }
    let increment = pow10(exponent)?;
    let additive_ticks = tick - geometric_delta * TICKS_PER_EXPONENT;
    Ok(add(pow10(geometric_delta)?, mul(Dec::from(additive_ticks), increment)?)?)
}

/// Square root of the price at `tick`.
///
/// # Errors
///
/// See [`tick_to_price`].
pub fn tick_to_sqrt_price(tick: i64) -> Result<Dec> {
    let price = tick_to_price(tick)?;
    price
        .sqrt()
        .ok_or_else(|| ProtocolDataError::InvalidPool(format!("no square root for tick {tick}")))
}

impl ClPool {
    fn sqrt_price_squared(&self) -> Result<Dec> {
        Ok(mul(self.current_sqrt_price, self.current_sqrt_price)?)
    }

    /// Price of `base` in `quote`; the pool price is token1 per token0.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::InvalidPool`] for foreign denoms or a
    /// math error for a zero price.
    pub fn spot_price(&self, quote: &str, base: &str) -> Result<Dec> {
        if base == self.token0 && quote == self.token1 {
            self.sqrt_price_squared()
        } else if base == self.token1 && quote == self.token0 {
            Ok(quo(Dec::ONE, self.sqrt_price_squared()?)?)
        } else {
            Err(ProtocolDataError::InvalidPool(format!(
                "pool {} does not pair {quote} and {base}",
                self.id
            )))
        }
    }

    /// Token amounts backing `liquidity` between `lower_tick` and
    /// `upper_tick` at the current price.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::InvalidPool`] for an empty tick range,
    /// or a math error.
    pub fn actual_amounts(&self, lower_tick: i64, upper_tick: i64, liquidity: Dec) -> Result<(Dec, Dec)> {
        if lower_tick >= upper_tick {
            return Err(ProtocolDataError::InvalidPool(format!(
                "lower tick {lower_tick} must be below upper tick {upper_tick}"
            )));
        }
        let sqrt_lower = tick_to_sqrt_price(lower_tick)?;
        let sqrt_upper = tick_to_sqrt_price(upper_tick)?;
        let amount0 = |from: Dec| -> Result<Dec> {
            let delta = mul(liquidity, sqrt_upper - from)?;
            Ok(quo(delta, mul(sqrt_upper, from)?)?)
        };

        if self.current_tick < lower_tick {
            Ok((amount0(sqrt_lower)?, Dec::ZERO))
        } else if self.current_tick >= upper_tick {
            Ok((Dec::ZERO, mul(liquidity, sqrt_upper - sqrt_lower)?))
        } else {
            let current = self.current_sqrt_price;
            Ok((amount0(current)?, mul(liquidity, current - sqrt_lower)?))
        }
    }

    /// Underlying coins of a position, truncated.
    ///
    /// # Errors
    ///
    /// See [`ClPool::actual_amounts`].
    pub fn underlying_assets(&self, lower_tick: i64, upper_tick: i64, liquidity: Dec) -> Result<(Coin, Coin)> {
        if liquidity.is_zero() {
            return Ok((Coin::zero(&self.token0), Coin::zero(&self.token1)));
        }
        let (a0, a1) = self.actual_amounts(lower_tick, upper_tick, liquidity)?;
        Ok((
            Coin::new(&self.token0, truncate(a0)?),
            Coin::new(&self.token1, truncate(a1)?),
        ))
    }
}
