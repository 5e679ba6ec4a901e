//! Protobuf messages read from (or sent to) remote chains.
//!
//! Only the fields this module consumes are declared; prost skips unknown
//! fields on decode.

use prost::Message;

use crate::math::{parse_amount, parse_legacy_dec, Dec};
use crate::{Coin, Result, TypesError};

/// `cosmos.base.v1beta1.Coin`.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoCoin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

impl ProtoCoin {
    /// # Errors
    ///
    /// Returns [`TypesError::Math`] for a malformed amount.
    pub fn to_coin(&self) -> Result<Coin> {
        Ok(Coin::new(self.denom.clone(), parse_amount(&self.amount)?))
    }
}

/// `cosmos.base.v1beta1.DecCoin`; `amount` is legacy 18-dp decimal text.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoDecCoin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

impl ProtoDecCoin {
    /// # Errors
    ///
    /// Returns [`TypesError::Math`] for a malformed amount.
    pub fn amount_dec(&self) -> Result<Dec> {
        Ok(parse_legacy_dec(&self.amount)?)
    }
}

/// `google.protobuf.Duration`.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct ProtoDuration {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// `google.protobuf.Timestamp`.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct ProtoTimestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// `osmosis.lockup.PeriodLock`.
#[derive(Clone, PartialEq, Message)]
pub struct PeriodLock {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub owner: String,
    #[prost(message, optional, tag = "3")]
    pub duration: Option<ProtoDuration>,
    #[prost(message, optional, tag = "4")]
    pub end_time: Option<ProtoTimestamp>,
    #[prost(message, repeated, tag = "5")]
    pub coins: Vec<ProtoCoin>,
}

/// `osmosis.concentratedliquidity.v1beta1.Position`.
#[derive(Clone, PartialEq, Message)]
pub struct ClPosition {
    #[prost(uint64, tag = "1")]
    pub position_id: u64,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(uint64, tag = "3")]
    pub pool_id: u64,
    #[prost(int64, tag = "4")]
    pub lower_tick: i64,
    #[prost(int64, tag = "5")]
    pub upper_tick: i64,
    #[prost(message, optional, tag = "6")]
    pub join_time: Option<ProtoTimestamp>,
    #[prost(string, tag = "7")]
    pub liquidity: String,
}

impl ClPosition {
    /// # Errors
    ///
    /// Returns [`TypesError::Math`] for malformed liquidity text.
    pub fn liquidity_dec(&self) -> Result<Dec> {
        Ok(parse_legacy_dec(&self.liquidity)?)
    }
}

/// `crescent.lpfarm.v1beta1.Position`.
#[derive(Clone, PartialEq, Message)]
pub struct FarmPosition {
    #[prost(string, tag = "1")]
    pub farmer: String,
    #[prost(string, tag = "2")]
    pub denom: String,
    #[prost(string, tag = "3")]
    pub farming_amount: String,
}

/// `cosmos.distribution.v1beta1.DelegationDelegatorReward`.
#[derive(Clone, PartialEq, Message)]
pub struct DelegationDelegatorReward {
    #[prost(string, tag = "1")]
    pub validator_address: String,
    #[prost(message, repeated, tag = "2")]
    pub reward: Vec<ProtoDecCoin>,
}

/// `cosmos.distribution.v1beta1.QueryDelegationTotalRewardsRequest`.
#[derive(Clone, PartialEq, Message)]
pub struct QueryDelegationTotalRewardsRequest {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
}

/// `cosmos.distribution.v1beta1.QueryDelegationTotalRewardsResponse`.
#[derive(Clone, PartialEq, Message)]
pub struct DelegationTotalRewardsResponse {
    #[prost(message, repeated, tag = "1")]
    pub rewards: Vec<DelegationDelegatorReward>,
    #[prost(message, repeated, tag = "2")]
    pub total: Vec<ProtoDecCoin>,
}

/// Subset of `tendermint.types.Header`.
#[derive(Clone, PartialEq, Message)]
pub struct Header {
    #[prost(string, tag = "2")]
    pub chain_id: String,
    #[prost(int64, tag = "3")]
    pub height: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Block {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
}

/// `cosmos.base.tendermint.v1beta1.GetLatestBlockResponse`.
#[derive(Clone, PartialEq, Message)]
pub struct GetLatestBlockResponse {
    #[prost(message, optional, tag = "2")]
    pub block: Option<Block>,
    #[prost(message, optional, tag = "3")]
    pub sdk_block: Option<Block>,
}

impl GetLatestBlockResponse {
    /// Height of the returned block, preferring the SDK block encoding.
    pub fn height(&self) -> Option<i64> {
        self.sdk_block
            .as_ref()
            .or(self.block.as_ref())
            .and_then(|b| b.header.as_ref())
            .map(|h| h.height)
    }
}

/// `cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward`.
#[derive(Clone, PartialEq, Message)]
pub struct MsgWithdrawDelegatorReward {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
}

/// Decode `bytes` as `M`, naming the message in the error.
///
/// # Errors
///
/// Returns [`TypesError::ProtoDecode`].
pub fn decode<M: Message + Default>(message: &'static str, bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|e| TypesError::ProtoDecode {
        message,
        reason: e.to_string(),
    })
}
