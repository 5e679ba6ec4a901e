//! Validator scoring and validator-selection allocation.
//!
//! ```text
//! power_percentage   = voting_power / total_voting_power
//! distribution_score = 1 - (power_percentage - min) / max
//! performance_score  = min(actual_reward / expected_reward, 1)
//! score              = distribution_score * performance_score
//! ```
//!
//! `expected_reward` is the performance account's total reward in the base
//! denom divided by the number of validators it delegates to. Users are
//! scored by the sum of `intent weight * validator score` over their
//! snapshotted intents, and the zone budget is split pro rata.

use std::collections::BTreeMap;

use qs_types::math::{add, dec_from_amount, mul, quo, truncate};
use qs_types::proto::{DelegationTotalRewardsResponse, ProtoDecCoin};
use qs_types::{Coin, Dec, DelegatorIntent, Validator};

use crate::{Result, RewardsError, UserAllocation};

/// Scores of one validator for the current epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorScore {
    pub power_percentage: Dec,
    pub distribution_score: Dec,
    pub performance_score: Dec,
}

impl ValidatorScore {
    /// Distribution score only. Performance stays zero until the validator
    /// shows up in the performance account's rewards.
    pub fn new(power_percentage: Dec, distribution_score: Dec) -> Self {
        Self {
            power_percentage,
            distribution_score,
            performance_score: Dec::ZERO,
        }
    }

    /// # Errors
    ///
    /// Returns [`RewardsError::Math`] on overflow.
    pub fn total_score(&self) -> Result<Dec> {
        Ok(mul(self.distribution_score, self.performance_score)?)
    }
}

/// Validator scores of one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneScore {
    pub zone_id: String,
    pub total_voting_power: u128,
    pub validator_scores: BTreeMap<String, ValidatorScore>,
}

/// Score validators by voting power, favouring smaller validators.
///
/// # Errors
///
/// - [`RewardsError::NoValidators`] for an empty validator set
/// - [`RewardsError::ZeroVotingPower`] when total voting power is zero
pub fn calc_distribution_scores(zone_id: &str, validators: &[Validator]) -> Result<ZoneScore> {
    tracing::info!(zone = zone_id, "calculate distribution scores");
    if validators.is_empty() {
        return Err(RewardsError::NoValidators(zone_id.to_string()));
    }

    let mut total: u128 = 0;
    for v in validators {
        total = total.checked_add(v.voting_power).ok_or(qs_types::MathError::Overflow)?;
    }
    tracing::info!(zone = zone_id, total_voting_power = total, "zone voting power");
    if total == 0 {
        return Err(RewardsError::ZeroVotingPower(zone_id.to_string()));
    }

    let total_dec = dec_from_amount(total)?;
    let mut percentages = BTreeMap::new();
    for v in validators {
        percentages.insert(v.valoper_address.clone(), quo(dec_from_amount(v.voting_power)?, total_dec)?);
    }
    let max = percentages.values().copied().max().unwrap_or(Dec::ONE);
    let min = percentages.values().copied().min().unwrap_or(Dec::ZERO);

    let mut validator_scores = BTreeMap::new();
    for (valoper, pct) in percentages {
        let distribution_score = Dec::ONE - quo(pct - min, max)?;
        tracing::debug!(validator = %valoper, power_percentage = %pct, %distribution_score, "validator score");
        validator_scores.insert(valoper, ValidatorScore::new(pct, distribution_score));
    }

    Ok(ZoneScore {
        zone_id: zone_id.to_string(),
        total_voting_power: total,
        validator_scores,
    })
}

fn amount_of(coins: &[ProtoDecCoin], denom: &str) -> Result<Dec> {
    let mut sum = Dec::ZERO;
    for coin in coins.iter().filter(|c| c.denom == denom) {
        sum = add(sum, coin.amount_dec()?)?;
    }
    Ok(sum)
}

/// Apply performance scores from the performance account's rewards.
///
/// Validators absent from `zs` (removed from the active set) are skipped;
/// validators of `zs` absent from the response earned nothing and keep a
/// zero performance score.
/// Returns the addresses of the scored validators in response order; their
/// rewards should be withdrawn to reset scoring for the next epoch.
///
/// # Errors
///
/// - [`RewardsError::NoPerformanceRewards`] when the response has no
///   rewards or a zero total in `base_denom`
/// - [`RewardsError::Types`] for malformed decimal amounts
pub fn calc_performance_scores(
    zs: &mut ZoneScore,
    rewards: &DelegationTotalRewardsResponse,
    base_denom: &str,
) -> Result<Vec<String>> {
    tracing::info!(zone = %zs.zone_id, "calculate performance and overall scores");
    if rewards.rewards.is_empty() {
        return Err(RewardsError::NoPerformanceRewards(zs.zone_id.clone()));
    }
    let total = amount_of(&rewards.total, base_denom)?;
    if total.is_zero() {
        return Err(RewardsError::NoPerformanceRewards(zs.zone_id.clone()));
    }
    let expected = quo(total, Dec::from(rewards.rewards.len() as u64))?;
    tracing::info!(zone = %zs.zone_id, %total, %expected, "performance account rewards");

    let mut scored = Vec::new();
    for reward in &rewards.rewards {
        let Some(vs) = zs.validator_scores.get_mut(&reward.validator_address) else {
            tracing::info!(validator = %reward.validator_address, "validator may have been removed from active set");
            continue;
        };
        let actual = amount_of(&reward.reward, base_denom)?;
        vs.performance_score = quo(actual, expected)?.min(Dec::ONE);
        let overall = vs.total_score()?;
        tracing::info!(
            validator = %reward.validator_address,
            distribution = %vs.distribution_score,
            performance = %vs.performance_score,
            total = %overall,
            "overall score"
        );
        scored.push(reward.validator_address.clone());
    }
    Ok(scored)
}

/// Split a zone's validator-selection budget between delegators.
///
/// Allocations follow `intents` order. Zero budget or zero summed score
/// allocates nothing.
///
/// # Errors
///
/// Returns [`RewardsError::Math`] on overflow.
pub fn calc_user_validator_selection_allocations(
    zs: &ZoneScore,
    allocation: u128,
    intents: &[DelegatorIntent],
    bond_denom: &str,
) -> Result<Vec<UserAllocation>> {
    tracing::info!(zone = %zs.zone_id, allocation, "calculate user validator selection allocations");
    if allocation == 0 {
        tracing::info!(zone = %zs.zone_id, "validator selection allocation is zero, nothing to allocate");
        return Ok(Vec::new());
    }

    let mut sum = Dec::ZERO;
    let mut user_scores = Vec::with_capacity(intents.len());
    for di in intents {
        let mut user_sum = Dec::ZERO;
        for intent in &di.intents {
            let score = match zs.validator_scores.get(&intent.valoper_address) {
                Some(vs) => mul(intent.weight, vs.total_score()?)?,
                None => Dec::ZERO,
            };
            tracing::debug!(
                user = %di.delegator,
                validator = %intent.valoper_address,
                %score,
                "user score for validator"
            );
            user_sum = add(user_sum, score)?;
        }
        sum = add(sum, user_sum)?;
        user_scores.push((di.delegator.as_str(), user_sum));
    }

    if sum.is_zero() {
        tracing::info!(zone = %zs.zone_id, "zero sum score for zone");
        return Ok(Vec::new());
    }

    let tokens_per_point = quo(dec_from_amount(allocation)?, sum)?;
    tracing::info!(zone = %zs.zone_id, zone_score = %sum, %tokens_per_point, "tokens per point");

    user_scores
        .into_iter()
        .map(|(address, score)| {
            Ok(UserAllocation {
                address: address.to_string(),
                amount: Coin::new(bond_denom, truncate(mul(score, tokens_per_point)?)?),
            })
        })
        .collect()
}
