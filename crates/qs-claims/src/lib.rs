//! # qs-claims
//!
//! Claim submodules: one per protocol a qAsset can be held in.
//!
//! Each submodule turns the proofs in a `MsgSubmitClaim` into the amount of
//! the zone's qAsset the user holds in that protocol, and refreshes the
//! protocol data it depends on by issuing interchain queries at epoch end.
//! Proof verification against the remote chain happens before a submodule
//! is consulted; submodules only interpret already-verified key/value pairs.
//!
//! ## Modules
//!
//! - [`common`] - proof deduplication, owner resolution and allow-list checks
//! - [`icq`] - query types and callback IDs issued by the hooks
//! - [`liquid`] - qAssets held in a bank account
//! - [`osmosis`] - Osmosis AMM pool shares and lockups
//! - [`osmosis_cl`] - Osmosis concentrated-liquidity positions
//! - [`crescent`] - Crescent pool coins and farming positions
//! - [`umee`] - Umee uTokens and leverage collateral
//! - [`membrane`] - Membrane CDP collateral

pub mod common;
pub mod crescent;
pub mod icq;
pub mod liquid;
pub mod membrane;
pub mod osmosis;
pub mod osmosis_cl;
pub mod umee;

#[cfg(test)]
pub(crate) mod testutil;

use qs_protocoldata::ProtocolDataError;
use qs_store::KvStore;
use qs_types::keepers::{ExternalError, InterchainQueryKeeper, InterchainStakingKeeper};
use qs_types::{ClaimType, MathError, MsgSubmitClaim, TypesError};

pub use crescent::CrescentModule;
pub use liquid::LiquidTokenModule;
pub use membrane::MembraneModule;
pub use osmosis::OsmosisModule;
pub use osmosis_cl::OsmosisClModule;
pub use umee::UmeeModule;

/// Errors produced while validating claims or refreshing protocol data.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// Claimed zone is not registered.
    #[error("unable to find registered zone for chain id: {0}")]
    ZoneNotFound(String),

    /// Proof belongs to another account and no mapping exists.
    #[error("not a valid proof for submitting user")]
    NotUserProof,

    /// Proof belongs to neither the user nor their mapped account.
    #[error("not a valid proof for submitting user or mapped account")]
    NotUserOrMappedProof,

    /// Protocol data the claim or hook depends on is absent.
    #[error("unable to obtain protocol data for {0}")]
    MissingProtocolData(String),

    /// Pool has no asset originating from the claimed zone.
    #[error("invalid zone, pool zone must match {0}")]
    PoolZoneMismatch(String),

    /// Pool has no outstanding shares.
    #[error("empty pool, {0}")]
    EmptyPool(String),

    /// Pool document has not been fetched yet.
    #[error("pool {0} has no pool data")]
    PoolDataPending(u64),

    /// Crescent pool is disabled.
    #[error("pool{0} is disabled")]
    PoolDisabled(u64),

    /// Position holds neither of the zone's denoms.
    #[error("position does not match local denom for {0}")]
    PositionMismatch(String),

    /// Lockup or position is malformed.
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// Membrane claims must come from the Osmosis chain.
    #[error("src zone does not match osmosis chain id")]
    SrcZoneMismatch,

    /// Membrane proof is for another contract.
    #[error("not a valid membrane contract address")]
    InvalidContract,

    /// Membrane proof key is not a positions entry.
    #[error("not a valid key for membrane claims: {0}")]
    InvalidContractKey(String),

    /// A proof was rejected; `index` is its position in the message.
    #[error("proof {index}: {source}")]
    AtProof {
        index: usize,
        #[source]
        source: Box<ClaimError>,
    },

    /// No submodule handles this claim type.
    #[error("no submodule for claim type {0}")]
    UnsupportedClaimType(ClaimType),

    /// The interchain query collaborator refused a request.
    #[error("unable to issue query: {0}")]
    Query(#[from] ExternalError),

    #[error(transparent)]
    ProtocolData(#[from] ProtocolDataError),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClaimError>;

/// Read access needed to validate a claim.
pub struct ClaimContext<'a> {
    pub store: &'a dyn KvStore,
    pub ics: &'a dyn InterchainStakingKeeper,
}

/// Access needed by epoch hooks to schedule protocol data refreshes.
pub struct HookContext<'a> {
    pub store: &'a dyn KvStore,
    pub icq: &'a mut dyn InterchainQueryKeeper,
    /// TTL passed with every request; zero for the query module default.
    pub ttl: u64,
}

/// Capabilities every claim submodule provides.
pub trait ClaimSubmodule {
    fn claim_type(&self) -> ClaimType;

    /// Schedule refreshes of the protocol data this submodule reads.
    /// Returns the number of queries issued.
    ///
    /// # Errors
    ///
    /// Fails when the submodule's parameters or connection data are missing
    /// or a query cannot be scheduled.
    fn hooks(&self, ctx: &mut HookContext<'_>) -> Result<usize>;

    /// Amount of the zone's qAsset proven by `msg`. Zero is a valid result.
    ///
    /// # Errors
    ///
    /// Fails when a proof does not belong to the user or cannot be decoded,
    /// or required protocol data is missing.
    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128>;
}

/// The closed set of claim submodules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Submodule {
    LiquidToken(LiquidTokenModule),
    OsmosisPool(OsmosisModule),
    OsmosisClPool(OsmosisClModule),
    CrescentPool(CrescentModule),
    UmeeToken(UmeeModule),
    Membrane(MembraneModule),
}

impl Submodule {
    /// Every submodule, in the order their hooks run.
    pub const ALL: [Submodule; 6] = [
        Submodule::LiquidToken(LiquidTokenModule),
        Submodule::OsmosisPool(OsmosisModule),
        Submodule::OsmosisClPool(OsmosisClModule),
        Submodule::CrescentPool(CrescentModule),
        Submodule::UmeeToken(UmeeModule),
        Submodule::Membrane(MembraneModule),
    ];

    /// Submodule handling `claim_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::UnsupportedClaimType`] for `Undefined` and
    /// `SifchainPool`.
    pub fn for_claim_type(claim_type: ClaimType) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.claim_type() == claim_type)
            .ok_or(ClaimError::UnsupportedClaimType(claim_type))
    }

    fn inner(&self) -> &dyn ClaimSubmodule {
        match self {
            Submodule::LiquidToken(m) => m,
            Submodule::OsmosisPool(m) => m,
            Submodule::OsmosisClPool(m) => m,
            Submodule::CrescentPool(m) => m,
            Submodule::UmeeToken(m) => m,
            Submodule::Membrane(m) => m,
        }
    }
}

impl ClaimSubmodule for Submodule {
    fn claim_type(&self) -> ClaimType {
        self.inner().claim_type()
    }

    fn hooks(&self, ctx: &mut HookContext<'_>) -> Result<usize> {
        self.inner().hooks(ctx)
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        self.inner().validate_claim(ctx, msg)
    }
}
