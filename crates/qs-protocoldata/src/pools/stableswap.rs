//! Two-asset stableswap pools on the `xy(x² + y²) = k` curve.

use serde::{Deserialize, Serialize};

use qs_types::encoding::u64_lenient;
use qs_types::math::{add, dec_from_amount, mul, quo};
use qs_types::{Coin, Dec};

use crate::{ProtocolDataError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableSwapPool {
    #[serde(with = "u64_lenient")]
    pub id: u64,
    #[serde(default)]
    pub pool_liquidity: Vec<Coin>,
    /// One factor per liquidity entry, in the same order.
    #[serde(default)]
    pub scaling_factors: Vec<u64>,
    #[serde(default)]
    pub total_shares: Coin,
}

impl StableSwapPool {
    pub fn liquidity_of(&self, denom: &str) -> u128 {
        self.pool_liquidity
            .iter()
            .filter(|c| c.denom == denom)
            .map(|c| c.amount)
            .sum()
    }

    fn scaled_reserve(&self, denom: &str) -> Result<(Dec, Dec)> {
        let idx = self
            .pool_liquidity
            .iter()
            .position(|c| c.denom == denom)
            .ok_or_else(|| ProtocolDataError::InvalidPool(format!("pool {} has no asset {denom}", self.id)))?;
        let factor = self
            .scaling_factors
            .get(idx)
            .copied()
            .map(Dec::from)
            .ok_or_else(|| ProtocolDataError::InvalidPool(format!("pool {} missing scaling factor", self.id)))?;
        let reserve = quo(dec_from_amount(self.pool_liquidity[idx].amount)?, factor)?;
        Ok((reserve, factor))
    }

    /// Marginal price of `base` in `quote` on the scaled curve, rescaled to
    /// raw units: with `r = x / y`, `p = (3r² + 1) / (r³ + 3r)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::InvalidPool`] unless the pool holds
    /// exactly two assets with two scaling factors, or a math error for
    /// empty reserves.
    pub fn spot_price(&self, quote: &str, base: &str) -> Result<Dec> {
        if self.pool_liquidity.len() != 2 || self.scaling_factors.len() != 2 {
            return Err(ProtocolDataError::InvalidPool(format!(
                "stableswap pool {} must hold exactly two assets and two scaling factors",
                self.id
            )));
        }
        let (x, base_factor) = self.scaled_reserve(base)?;
        let (y, quote_factor) = self.scaled_reserve(quote)?;
        let r = quo(x, y)?;
        let r2 = mul(r, r)?;
        let numerator = add(mul(Dec::from(3), r2)?, Dec::ONE)?;
        let denominator = add(mul(r2, r)?, mul(Dec::from(3), r)?)?;
        let scaled_price = quo(numerator, denominator)?;
        Ok(quo(mul(scaled_price, quote_factor)?, base_factor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(a: u128, b: u128, fa: u64, fb: u64) -> StableSwapPool {
        StableSwapPool {
            id: 7,
            pool_liquidity: vec![Coin::new("uatom", a), Coin::new("uqatom", b)],
            scaling_factors: vec![fa, fb],
            total_shares: Coin::new("gamm/pool/7", 1_000),
        }
    }

    #[test]
    fn test_balanced_pool_trades_at_par() {
        let p = pool(1_000_000, 1_000_000, 1, 1);
        assert_eq!(p.spot_price("uatom", "uqatom").expect("price"), Dec::ONE);
    }

    #[test]
    fn test_scarcer_asset_is_dearer() {
        let p = pool(2_000_000, 1_000_000, 1, 1);
        let qatom_in_atom = p.spot_price("uatom", "uqatom").expect("price");
        let atom_in_qatom = p.spot_price("uqatom", "uatom").expect("price");
        assert!(qatom_in_atom > Dec::ONE);
        assert!(atom_in_qatom < Dec::ONE);
        // the two directions are reciprocal up to decimal rounding
        let product = mul(qatom_in_atom, atom_in_qatom).expect("mul");
        assert!((product - Dec::ONE).abs() < Dec::new(1, 20));
    }

    #[test]
    fn test_scaling_factors_rescale() {
        // 1 uqatom-unit scaled by 1000 vs 1 uatom scaled by 1: equal scaled reserves
        let p = pool(1_000, 1_000_000, 1, 1_000);
        assert_eq!(p.spot_price("uatom", "uqatom").expect("price"), Dec::new(1, 3));
    }

    #[test]
    fn test_requires_two_factors() {
        let mut p = pool(1, 1, 1, 1);
        p.scaling_factors.pop();
        assert!(matches!(
            p.spot_price("uatom", "uqatom"),
            Err(ProtocolDataError::InvalidPool(_))
        ));
    }
}
