//! Interfaces of the collaborating modules this module drives.
//!
//! Bank, account, staking, interchain-query and interchain-staking state is
//! owned elsewhere. The keeper reaches it only through these traits, so the
//! host (or a test harness) supplies the implementations.

use crate::coin::Coin;
use crate::proto::MsgWithdrawDelegatorReward;
use crate::zone::{DelegatorIntent, Validator, Zone};

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ExternalError(pub String);

impl ExternalError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type ExternalResult<T> = std::result::Result<T, ExternalError>;

pub trait BankKeeper {
    fn get_balance(&self, address: &str, denom: &str) -> Coin;

    fn get_supply(&self, denom: &str) -> Coin;

    /// Non-zero balances of `address`, ordered by denom.
    fn get_all_balances(&self, address: &str) -> Vec<Coin>;

    /// # Errors
    ///
    /// Fails on insufficient funds or an invalid recipient.
    fn send_coins(&mut self, from: &str, to: &str, coins: &[Coin]) -> ExternalResult<()>;

    /// # Errors
    ///
    /// Fails on insufficient module funds or an invalid recipient.
    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        recipient: &str,
        coins: &[Coin],
    ) -> ExternalResult<()>;

    /// # Errors
    ///
    /// Fails on insufficient module funds.
    fn send_coins_from_module_to_module(
        &mut self,
        from_module: &str,
        to_module: &str,
        coins: &[Coin],
    ) -> ExternalResult<()>;
}

pub trait AccountKeeper {
    fn module_address(&self, module: &str) -> String;
}

pub trait StakingKeeper {
    fn bond_denom(&self) -> String;
}

/// An interchain query to schedule on a remote chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcqRequest {
    pub connection_id: String,
    pub chain_id: String,
    pub query_type: String,
    pub request: Vec<u8>,
    /// Re-query period in blocks; `-1` for a one-shot query.
    pub period: i64,
    pub module: String,
    pub callback_id: String,
    pub ttl: u64,
}

pub trait InterchainQueryKeeper {
    /// # Errors
    ///
    /// Fails if the query cannot be scheduled.
    fn make_request(&mut self, request: IcqRequest) -> ExternalResult<()>;
}

/// Messages submitted to a host zone through an interchain account.
#[derive(Debug, Clone, PartialEq)]
pub enum TxMsg {
    WithdrawDelegatorReward(MsgWithdrawDelegatorReward),
}

pub trait InterchainStakingKeeper {
    fn get_zone(&self, chain_id: &str) -> Option<Zone>;

    fn set_zone(&mut self, zone: Zone);

    /// All registered zones, ordered by chain ID.
    fn zones(&self) -> Vec<Zone>;

    fn validators(&self, chain_id: &str) -> Vec<Validator>;

    /// # Errors
    ///
    /// Fails if the zone or validator is unknown.
    fn set_validator(&mut self, chain_id: &str, validator: Validator) -> ExternalResult<()>;

    /// Current intents, or the snapshot taken at the last epoch boundary.
    fn delegator_intents(&self, chain_id: &str, snapshot: bool) -> Vec<DelegatorIntent>;

    fn set_delegator_intent(&mut self, chain_id: &str, intent: DelegatorIntent, snapshot: bool);

    /// Address on `chain_id` that the local account `local` has mapped
    /// itself to, if any.
    fn local_address_map(&self, local: &[u8], chain_id: &str) -> Option<Vec<u8>>;

    /// Total amount delegated by the zone's delegation accounts.
    fn delegated_amount(&self, chain_id: &str) -> u128;

    /// Amount received but not yet delegated.
    fn delegations_in_process(&self, chain_id: &str) -> u128;

    /// # Errors
    ///
    /// Fails if the zone has no such account or the messages cannot be sent.
    fn submit_tx(
        &mut self,
        chain_id: &str,
        msgs: Vec<TxMsg>,
        account: &str,
        memo: &str,
        messages_per_tx: u32,
    ) -> ExternalResult<()>;
}

/// IBC channel lookups.
pub trait ChannelKeeper {
    /// Channel ID on the counterparty end of a local `(port, channel)`.
    fn counterparty_channel(&self, port: &str, channel: &str) -> Option<String>;
}
