//! Weighted (balancer) pools.

use serde::{Deserialize, Serialize};

use qs_types::encoding::{amount_string, u64_lenient};
use qs_types::math::{dec_from_amount, quo};
use qs_types::{Coin, Dec};

use crate::{ProtocolDataError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAsset {
    pub token: Coin,
    #[serde(with = "amount_string")]
    pub weight: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerPool {
    #[serde(with = "u64_lenient")]
    pub id: u64,
    #[serde(default)]
    pub pool_assets: Vec<PoolAsset>,
    #[serde(default)]
    pub total_shares: Coin,
}

impl BalancerPool {
    fn asset(&self, denom: &str) -> Result<&PoolAsset> {
        self.pool_assets
            .iter()
            .find(|a| a.token.denom == denom)
            .ok_or_else(|| ProtocolDataError::InvalidPool(format!("pool {} has no asset {denom}", self.id)))
    }

    pub fn liquidity_of(&self, denom: &str) -> u128 {
        self.pool_assets
            .iter()
            .filter(|a| a.token.denom == denom)
            .map(|a| a.token.amount)
            .sum()
    }

    /// `(balance_quote / weight_quote) / (balance_base / weight_base)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::InvalidPool`] for missing assets and
    /// [`qs_types::MathError::DivisionByZero`] for zero weights or reserves.
    pub fn spot_price(&self, quote: &str, base: &str) -> Result<Dec> {
        let q = self.asset(quote)?;
        let b = self.asset(base)?;
        let quote_ratio = quo(dec_from_amount(q.token.amount)?, dec_from_amount(q.weight)?)?;
        let base_ratio = quo(dec_from_amount(b.token.amount)?, dec_from_amount(b.weight)?)?;
        Ok(quo(quote_ratio, base_ratio)?)
    }
}
