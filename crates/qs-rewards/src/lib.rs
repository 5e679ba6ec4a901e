//! # qs-rewards
//!
//! Reward arithmetic for participation rewards.
//!
//! Every epoch the module balance is split into validator-selection,
//! holdings and lockup buckets, the first two are shared between zones by
//! TVL, and each zone's share is apportioned to users by weighted score.
//! All payouts truncate toward zero.
//!
//! ## Modules
//!
//! - [`allocation`] - module-level split and per-zone TVL allocation
//! - [`token_values`] - denom values derived from Osmosis pool prices
//! - [`holdings`] - per-user holdings allocation with the anti-whale cap
//! - [`validator_selection`] - validator scoring and per-user allocation

pub mod allocation;
pub mod holdings;
pub mod token_values;
pub mod validator_selection;

use serde::{Deserialize, Serialize};

use qs_protocoldata::ProtocolDataError;
use qs_types::{Coin, Dec, MathError, TypesError};

pub use allocation::{DistributionProportions, RewardsAllocation};
pub use token_values::TokenValues;
pub use validator_selection::{ValidatorScore, ZoneScore};

/// A payout to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAllocation {
    pub address: String,
    pub amount: Coin,
}

/// Errors produced by reward computation.
#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    /// Module balance is zero.
    #[error("balance is zero, nothing to allocate")]
    NothingToAllocate,

    /// Distribution proportions do not sum to one.
    #[error("total distribution proportions must be 1.0: got {0:.2}")]
    InvalidTotalProportions(Dec),

    /// A distribution proportion is negative.
    #[error("distribution proportion {name} must not be negative: got {value}")]
    NegativeProportion { name: &'static str, value: Dec },

    /// Sum of zone TVLs is zero.
    #[error("protocol tvl is zero")]
    ZeroProtocolTvl,

    /// Zone has no validators to score.
    #[error("zone {0} has no validators")]
    NoValidators(String),

    /// Zone validators carry no voting power.
    #[error("invalid zone {0}, zero voting power")]
    ZeroVotingPower(String),

    /// Performance account rewards are missing or zero.
    #[error("no performance rewards for zone {0}")]
    NoPerformanceRewards(String),

    /// Required protocol data is absent.
    #[error("{0} protocol data not found")]
    MissingProtocolData(&'static str),

    /// One or more pools could not be priced.
    #[error("unable to calculate token values: {}", .0.join("; "))]
    TokenValues(Vec<String>),

    #[error(transparent)]
    ProtocolData(#[from] ProtocolDataError),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Math(#[from] MathError),
}

pub type Result<T> = std::result::Result<T, RewardsError>;
