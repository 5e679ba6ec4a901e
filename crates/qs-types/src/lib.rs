//! # qs-types
//!
//! Shared domain types for the participation rewards workspace.
//!
//! ## Modules
//!
//! - [`address`] - bech32 address decoding/encoding and IBC denom derivation
//! - [`claims`] - claim types, stored claims and submitted proofs
//! - [`coin`] - coins and the bank balance compatibility decoder
//! - [`encoding`] - serde helpers for string amounts and base64 byte fields
//! - [`keepers`] - collaborator interfaces consumed by the keeper
//! - [`keys`] - remote store key layouts (bank, wasm contract store)
//! - [`math`] - decimal helpers with checked, truncating conversions
//! - [`msgs`] - state-transition messages and their stateless validation
//! - [`proto`] - protobuf wire messages read from remote chains
//! - [`validation`] - field-level validation error collection
//! - [`zone`] - registered zones, validators and delegator intents

pub mod address;
pub mod claims;
pub mod coin;
pub mod encoding;
pub mod keepers;
pub mod keys;
pub mod math;
pub mod msgs;
pub mod proto;
pub mod validation;
pub mod zone;

pub use claims::{Claim, ClaimType, Proof, ProofOp, ProofOps};
pub use coin::Coin;
pub use math::{Dec, MathError};
pub use msgs::{MsgGovRemoveProtocolData, MsgSubmitClaim};
pub use validation::FieldErrors;
pub use zone::{DelegatorIntent, Validator, ValidatorIntent, Zone};

/// Module name; also the name of the module account holding the rewards pool.
pub const MODULE_NAME: &str = "participationrewards";

/// Connection ID recorded for the local chain's own connection data.
pub const SELF_CONNECTION: &str = "local";

/// Errors produced while decoding or validating shared types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Address string was empty or whitespace.
    #[error("empty address string is not allowed")]
    EmptyAddress,

    /// Address failed bech32 decoding.
    #[error("invalid bech32 address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Address human-readable part did not match the expected prefix.
    #[error("unexpected prefix - got {got} expected {expected}")]
    UnexpectedPrefix { got: String, expected: String },

    /// Address byte length outside `1..=255`.
    #[error("address length must be between 1 and {max} bytes, got {len}")]
    AddressLength { len: usize, max: usize },

    /// A store key embedded a different account than expected.
    #[error("account mismatch; expected {expected}, got {got}")]
    AccountMismatch { expected: String, got: String },

    /// A store key could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Denom does not match the bank denom format.
    #[error("invalid denom: {0}")]
    InvalidDenom(String),

    /// A bank balance value could not be decoded.
    #[error("unable to decode balance: {0}")]
    BalanceDecode(String),

    /// Protobuf payload could not be decoded.
    #[error("unable to decode {message}: {reason}")]
    ProtoDecode { message: &'static str, reason: String },

    /// Arithmetic failure.
    #[error(transparent)]
    Math(#[from] MathError),

    /// One or more fields failed validation.
    #[error("{0}")]
    Validation(#[from] FieldErrors),
}

pub type Result<T> = std::result::Result<T, TypesError>;
