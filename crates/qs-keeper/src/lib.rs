//! # qs-keeper
//!
//! The participation rewards keeper.
//!
//! The keeper owns the module store (protocol data, live and archived
//! claims, params) and drives everything else through the collaborator
//! traits in [`qs_types::keepers`], bundled per call in a [`Host`].
//!
//! ## Modules
//!
//! - [`config`] - module configuration and params
//! - [`msg_server`] - `MsgSubmitClaim` handling
//! - [`proposals`] - governance additions and removals of protocol data
//! - [`queries`] - params and protocol data queries
//! - [`callbacks`] - interchain query callbacks
//! - [`hooks`] - epoch and zone-creation hooks
//! - [`distribution`] - payouts from the module account
//! - [`genesis`] - genesis import and export
//! - [`sim`] - in-memory collaborators for simulation and tests

pub mod callbacks;
pub mod config;
pub mod distribution;
pub mod genesis;
pub mod hooks;
pub mod msg_server;
pub mod proposals;
pub mod queries;
pub mod sim;

use qs_claims::ClaimError;
use qs_proofs::{LightClient, ProofError};
use qs_protocoldata::ProtocolDataError;
use qs_rewards::RewardsError;
use qs_store::{KvStore, StoreError};
use qs_types::keepers::{
    AccountKeeper, BankKeeper, ChannelKeeper, ExternalError, InterchainQueryKeeper, InterchainStakingKeeper,
    StakingKeeper,
};
use qs_types::{FieldErrors, MathError, TypesError};

pub use callbacks::Callback;
pub use config::{ModuleConfig, Params};
pub use genesis::{GenesisState, KeyedProtocolData};
pub use hooks::EpochOutcome;
pub use proposals::AddProtocolDataProposal;

/// Store key holding the module params.
pub const PARAMS_KEY: &[u8] = &[0x03];

/// Keeper errors.
#[derive(Debug, thiserror::Error)]
pub enum KeeperError {
    #[error("claims currently disabled")]
    ClaimsDisabled,

    #[error("invalid zone, chain id {0:?} not found")]
    ZoneNotFound(String),

    #[error("unable to obtain connection protocol data for {0:?}")]
    ConnectionNotFound(String),

    /// A proof was taken at another height than the last epoch block.
    #[error("invalid claim for last epoch, Proof [{index}] expected height {expected}, got {got}")]
    ProofHeight { index: usize, expected: i64, got: i64 },

    #[error("Proof [{index}]: {source}")]
    Proof {
        index: usize,
        #[source]
        source: ProofError,
    },

    /// The claim submodule rejected one proof.
    #[error("Proof [{index}]: {source}")]
    ProofRejected {
        index: usize,
        #[source]
        source: ClaimError,
    },

    #[error("claim validation failed: {0}")]
    ClaimValidation(#[source] ClaimError),

    #[error("invalid authority: expected {expected}, got {got}")]
    InvalidAuthority { expected: String, got: String },

    #[error("error base64 decoding key, got {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    #[error("unable to find counterparty channel for {0}")]
    ChannelNotFound(String),

    #[error("unknown callback id {0:?}")]
    UnknownCallback(String),

    /// An interchain query callback arrived for a request it cannot parse.
    #[error("invalid callback request: {0}")]
    InvalidRequest(String),

    #[error("insufficient module balance: need {needed}, have {available}")]
    InsufficientModuleBalance { needed: u128, available: u128 },

    #[error("insufficient balance of {denom} in {address}: need {needed}, have {available}")]
    InsufficientBalance {
        address: String,
        denom: String,
        needed: u128,
        available: u128,
    },

    #[error("invalid genesis: {0}")]
    Genesis(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] FieldErrors),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Rewards(#[from] RewardsError),

    #[error(transparent)]
    ProtocolData(#[from] ProtocolDataError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KeeperError>;

/// Height and time of the block being processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: i64,
    /// Unix seconds.
    pub time: i64,
}

/// The collaborators reachable while processing one block.
pub struct Host<'a> {
    pub block: BlockInfo,
    pub bank: &'a mut dyn BankKeeper,
    pub accounts: &'a dyn AccountKeeper,
    pub staking: &'a dyn StakingKeeper,
    pub icq: &'a mut dyn InterchainQueryKeeper,
    pub ics: &'a mut dyn InterchainStakingKeeper,
    pub client: &'a dyn LightClient,
    pub channels: &'a dyn ChannelKeeper,
}

/// Participation rewards keeper over a module store `S`.
pub struct Keeper<S> {
    store: S,
    config: ModuleConfig,
}

impl<S: KvStore> Keeper<S> {
    pub fn new(store: S, config: ModuleConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Stored params, or the defaults if none have been set.
    ///
    /// # Errors
    ///
    /// Returns store or JSON errors.
    pub fn params(&self) -> Result<Params> {
        match self.store.get(PARAMS_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Params::default()),
        }
    }

    /// # Errors
    ///
    /// Returns [`KeeperError::Rewards`] for invalid proportions, or store
    /// errors.
    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        params.validate()?;
        self.store.set(PARAMS_KEY, &serde_json::to_vec(params)?)?;
        tracing::info!(
            claims_enabled = params.claims_enabled,
            validator_selection = %params.distribution_proportions.validator_selection_allocation,
            holdings = %params.distribution_proportions.holdings_allocation,
            lockup = %params.distribution_proportions.lockup_allocation,
            "params updated"
        );
        Ok(())
    }

    /// Address of the module account holding the rewards pool.
    pub fn module_address(&self, host: &Host<'_>) -> String {
        host.accounts.module_address(&self.config.module_name)
    }

    /// Bond denom balance of the module account.
    pub fn module_balance(&self, host: &Host<'_>) -> u128 {
        let denom = host.staking.bond_denom();
        host.bank.get_balance(&self.module_address(host), &denom).amount
    }
}
