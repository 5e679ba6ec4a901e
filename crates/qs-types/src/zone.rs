//! Registered host zones and their validator sets.
//!
//! Zones are owned by the interchain-staking collaborator; this module only
//! reads them and writes back the allocation fields and validator scores.

use serde::{Deserialize, Serialize};

use crate::encoding::amount_string;
use crate::math::Dec;

/// A host chain registered for liquid staking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub chain_id: String,
    pub connection_id: String,
    /// Bech32 prefix of accounts on the host chain.
    pub account_prefix: String,
    /// qAsset denom minted locally (e.g. `uqatom`).
    pub local_denom: String,
    /// Staking denom on the host chain (e.g. `uatom`).
    pub base_denom: String,
    /// Local channel used to send the qAsset to the host chain.
    #[serde(default)]
    pub transfer_channel: String,
    /// Interchain account that delegates equally to every validator, used
    /// to measure performance.
    #[serde(default)]
    pub performance_address: Option<String>,
    #[serde(default)]
    pub withdrawal_address: Option<String>,
    #[serde(default, with = "amount_string")]
    pub holdings_allocation: u128,
    #[serde(default, with = "amount_string")]
    pub validator_selection_allocation: u128,
    #[serde(default)]
    pub tvl: Dec,
    #[serde(default = "default_messages_per_tx")]
    pub messages_per_tx: u32,
}

fn default_messages_per_tx() -> u32 {
    5
}

impl Zone {
    /// Minimal zone with defaults for the optional fields.
    pub fn new(
        chain_id: impl Into<String>,
        connection_id: impl Into<String>,
        account_prefix: impl Into<String>,
        local_denom: impl Into<String>,
        base_denom: impl Into<String>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            connection_id: connection_id.into(),
            account_prefix: account_prefix.into(),
            local_denom: local_denom.into(),
            base_denom: base_denom.into(),
            transfer_channel: String::new(),
            performance_address: None,
            withdrawal_address: None,
            holdings_allocation: 0,
            validator_selection_allocation: 0,
            tvl: Dec::ZERO,
            messages_per_tx: default_messages_per_tx(),
        }
    }
}

/// A validator on a host zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub valoper_address: String,
    #[serde(with = "amount_string")]
    pub voting_power: u128,
    #[serde(default)]
    pub score: Dec,
}

impl Validator {
    pub fn new(valoper_address: impl Into<String>, voting_power: u128) -> Self {
        Self {
            valoper_address: valoper_address.into(),
            voting_power,
            score: Dec::ZERO,
        }
    }
}

/// One weighted preference of a delegator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorIntent {
    pub valoper_address: String,
    pub weight: Dec,
}

/// A delegator's validator-selection intents for a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatorIntent {
    pub delegator: String,
    pub intents: Vec<ValidatorIntent>,
}
