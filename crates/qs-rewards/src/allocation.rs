//! Module-level rewards split and per-zone TVL allocation.
//!
//! The module balance is split by the configured proportions. Truncation
//! dust from the split goes to the validator-selection bucket, so the three
//! buckets always sum to the balance. The validator-selection and holdings
//! buckets are then shared between zones in proportion to zone TVL; the
//! lockup bucket is paid out in bulk by the caller.

use serde::{Deserialize, Serialize};

use qs_types::math::{add, dec_from_amount, mul, mul_truncate, quo};
use qs_types::Dec;

use crate::token_values::TokenValues;
use crate::{Result, RewardsError};

/// Share of each epoch's module balance per bucket; must sum to 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionProportions {
    pub validator_selection_allocation: Dec,
    pub holdings_allocation: Dec,
    pub lockup_allocation: Dec,
}

impl Default for DistributionProportions {
    fn default() -> Self {
        Self {
            validator_selection_allocation: Dec::new(34, 2),
            holdings_allocation: Dec::new(33, 2),
            lockup_allocation: Dec::new(33, 2),
        }
    }
}

impl DistributionProportions {
    pub fn total(&self) -> Dec {
        self.validator_selection_allocation + self.holdings_allocation + self.lockup_allocation
    }

    /// # Errors
    ///
    /// - [`RewardsError::NegativeProportion`] for a proportion below zero
    /// - [`RewardsError::InvalidTotalProportions`] unless the sum is exactly 1
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("validator_selection_allocation", self.validator_selection_allocation),
            ("holdings_allocation", self.holdings_allocation),
            ("lockup_allocation", self.lockup_allocation),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(RewardsError::NegativeProportion { name, value });
            }
        }
        let total = self.total();
        if total != Dec::ONE {
            return Err(RewardsError::InvalidTotalProportions(total));
        }
        Ok(())
    }
}

/// One epoch's buckets, in bond denom units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsAllocation {
    pub validator_selection: u128,
    pub holdings: u128,
    pub lockup: u128,
}

/// Split `balance` into buckets.
///
/// # Errors
///
/// - [`RewardsError::NothingToAllocate`] for a zero balance
/// - [`RewardsError::InvalidTotalProportions`] for proportions not summing to 1
pub fn get_rewards_allocations(balance: u128, proportions: &DistributionProportions) -> Result<RewardsAllocation> {
    if balance == 0 {
        return Err(RewardsError::NothingToAllocate);
    }
    proportions.validate()?;

    let validator_selection = mul_truncate(balance, proportions.validator_selection_allocation)?;
    let holdings = mul_truncate(balance, proportions.holdings_allocation)?;
    let lockup = mul_truncate(balance, proportions.lockup_allocation)?;

    let allocated = validator_selection + holdings + lockup;
    let dust = balance.saturating_sub(allocated);

    let allocation = RewardsAllocation {
        validator_selection: validator_selection + dust,
        holdings,
        lockup,
    };
    tracing::info!(
        balance,
        validator_selection = allocation.validator_selection,
        holdings = allocation.holdings,
        lockup = allocation.lockup,
        dust,
        "rewards allocation"
    );
    Ok(allocation)
}

/// Stake held by a zone, valued in its base denom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneStake {
    pub chain_id: String,
    pub base_denom: String,
    /// Delegated plus in-process amount.
    pub staked: u128,
}

/// A zone's TVL and its share of the epoch's buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneAllocation {
    pub chain_id: String,
    pub tvl: Dec,
    pub validator_selection: u128,
    pub holdings: u128,
}

/// Share the validator-selection and holdings buckets between zones by TVL.
///
/// Zones whose base denom has no token value are logged and receive a zero
/// TVL and zero budgets. Output order follows `zones`.
///
/// # Errors
///
/// - [`RewardsError::ZeroProtocolTvl`] when no zone has a positive TVL
/// - [`RewardsError::Math`] on overflow
pub fn zone_allocations(
    zones: &[ZoneStake],
    token_values: &TokenValues,
    allocation: &RewardsAllocation,
) -> Result<Vec<ZoneAllocation>> {
    let mut tvls = Vec::with_capacity(zones.len());
    let mut protocol_tvl = Dec::ZERO;
    for zone in zones {
        let tvl = match token_values.get(&zone.base_denom) {
            Some(value) => mul(dec_from_amount(zone.staked)?, *value)?,
            None => {
                tracing::error!(
                    zone = %zone.chain_id,
                    denom = %zone.base_denom,
                    "unable to obtain token value for zone"
                );
                Dec::ZERO
            }
        };
        tracing::info!(zone = %zone.chain_id, %tvl, "zone tvl");
        protocol_tvl = add(protocol_tvl, tvl)?;
        tvls.push(tvl);
    }

    if protocol_tvl.is_zero() {
        return Err(RewardsError::ZeroProtocolTvl);
    }

    zones
        .iter()
        .zip(tvls)
        .map(|(zone, tvl)| {
            let proportion = quo(tvl, protocol_tvl)?;
            tracing::info!(zone = %zone.chain_id, %proportion, "zone proportion");
            Ok(ZoneAllocation {
                chain_id: zone.chain_id.clone(),
                tvl,
                validator_selection: mul_truncate(allocation.validator_selection, proportion)?,
                holdings: mul_truncate(allocation.holdings, proportion)?,
            })
        })
        .collect()
}
