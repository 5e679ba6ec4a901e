//! Holdings allocation.
//!
//! A zone's holdings budget is shared between users in proportion to the
//! qAssets they have claimed. No user counts for more than `cap` of the
//! qAsset supply; the token rate is computed over the capped amounts.
//! Truncation remainders stay with the caller as `remaining`.
//!
//! The balances of the zone's withdrawal account (rewards earned by the
//! staked assets on the host zone) are shared by the same claims, each user
//! receiving their uncapped share of the qAsset supply.

use std::collections::BTreeMap;

use qs_types::math::{add, dec_from_amount, mul, quo, truncate};
use qs_types::{Claim, Coin, Dec};

use crate::{Result, UserAllocation};

/// Default share of the qAsset supply a single user can be counted for.
pub fn default_holdings_cap() -> Dec {
    Dec::new(2, 2)
}

/// Per-user payouts and the unallocated remainder of the zone budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldingsOutcome {
    pub allocations: Vec<UserAllocation>,
    pub remaining: u128,
    /// Payouts from the zone's withdrawal account, one per user and denom.
    pub ics_allocations: Vec<UserAllocation>,
}

/// Inputs for one zone.
#[derive(Debug, Clone)]
pub struct HoldingsInput<'a> {
    pub chain_id: &'a str,
    /// Zone holdings budget.
    pub allocation: u128,
    /// Bank supply of the zone's qAsset.
    pub supply: u128,
    pub cap: Dec,
    pub bond_denom: &'a str,
    /// Balances of the zone's withdrawal account.
    pub ics_rewards: &'a [Coin],
}

fn nothing(allocation: u128) -> HoldingsOutcome {
    HoldingsOutcome {
        allocations: Vec::new(),
        remaining: allocation,
        ics_allocations: Vec::new(),
    }
}

/// Apportion a zone's holdings budget over its live claims.
///
/// Users are returned in address order.
///
/// # Errors
///
/// Returns [`crate::RewardsError::Math`] on overflow.
pub fn calc_user_holdings_allocations(input: &HoldingsInput<'_>, claims: &[Claim]) -> Result<HoldingsOutcome> {
    tracing::info!(zone = input.chain_id, allocation = input.allocation, "calculating holdings allocations");

    if input.allocation == 0 || input.supply == 0 {
        tracing::info!(zone = input.chain_id, "holdings allocation is zero, nothing to allocate");
        return Ok(nothing(input.allocation));
    }

    let mut user_amounts: BTreeMap<&str, u128> = BTreeMap::new();
    for claim in claims.iter().filter(|c| c.chain_id == input.chain_id) {
        tracing::debug!(
            claim_type = %claim.module,
            user = %claim.user_address,
            source = %claim.source_chain_id,
            amount = claim.amount,
            "claim"
        );
        let entry = user_amounts.entry(claim.user_address.as_str()).or_default();
        *entry = entry.saturating_add(claim.amount);
    }

    let limit = mul(dec_from_amount(input.supply)?, input.cap)?;
    let mut counted = Vec::with_capacity(user_amounts.len());
    let mut adjusted_total = Dec::ZERO;
    for (address, amount) in &user_amounts {
        let amount = dec_from_amount(*amount)?.min(limit);
        adjusted_total = add(adjusted_total, amount)?;
        counted.push((*address, amount));
    }

    if adjusted_total.is_zero() {
        tracing::info!(zone = input.chain_id, "zero claims for zone");
        return Ok(nothing(input.allocation));
    }

    let tokens_per_asset = quo(dec_from_amount(input.allocation)?, adjusted_total)?;
    tracing::info!(zone = input.chain_id, %tokens_per_asset, %limit, "tokens per asset");

    let mut remaining = input.allocation;
    let mut allocations = Vec::with_capacity(counted.len());
    for (address, amount) in counted {
        let payout = truncate(mul(amount, tokens_per_asset)?)?.min(remaining);
        remaining -= payout;
        allocations.push(UserAllocation {
            address: address.to_string(),
            amount: Coin::new(input.bond_denom, payout),
        });
    }

    let ics_allocations = ics_rewards_allocations(input, &user_amounts)?;
    Ok(HoldingsOutcome {
        allocations,
        remaining,
        ics_allocations,
    })
}

/// Share each withdrawal account balance by `amount / supply`, truncated.
fn ics_rewards_allocations(
    input: &HoldingsInput<'_>,
    user_amounts: &BTreeMap<&str, u128>,
) -> Result<Vec<UserAllocation>> {
    let mut allocations = Vec::new();
    let supply = dec_from_amount(input.supply)?;
    for reward in input.ics_rewards.iter().filter(|c| !c.is_zero()) {
        let per_asset = quo(dec_from_amount(reward.amount)?, supply)?;
        tracing::info!(zone = input.chain_id, denom = %reward.denom, %per_asset, "ics rewards per asset");
        let mut remaining = reward.amount;
        for (address, amount) in user_amounts {
            let payout = truncate(mul(dec_from_amount(*amount)?, per_asset)?)?.min(remaining);
            if payout == 0 {
                continue;
            }
            remaining -= payout;
            allocations.push(UserAllocation {
                address: (*address).to_string(),
                amount: Coin::new(reward.denom.clone(), payout),
            });
        }
    }
    Ok(allocations)
}
