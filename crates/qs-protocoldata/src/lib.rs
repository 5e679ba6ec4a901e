//! # qs-protocoldata
//!
//! Typed snapshots of external chain state, and the module's claim store.
//!
//! Protocol data is written by interchain query callbacks and governance,
//! and read by the claim submodules and the token value calculator. Each
//! record is stored as JSON under `0x00 | type tag | natural key`.
//!
//! ## Modules
//!
//! - [`types`] - the protocol data type enum, the stored envelope and the
//!   tagged-variant decode
//! - [`records`] - connection, allow-list and parameter records
//! - [`osmosis`] - Osmosis AMM and concentrated-liquidity pool records
//! - [`crescent`] - Crescent pool, reserve balance and pool coin supply records
//! - [`umee`] - Umee leverage module records
//! - [`pools`] - pool documents and their pricing / liquidity math
//! - [`store`] - protocol data persistence
//! - [`claims`] - live and archived claim persistence

pub mod claims;
pub mod crescent;
pub mod osmosis;
pub mod pools;
pub mod records;
pub mod store;
pub mod types;
pub mod umee;

pub use types::{ProtocolData, ProtocolDataRecord, ProtocolDataType, ProtocolDataValue};

use qs_store::StoreError;
use qs_types::{FieldErrors, MathError, TypesError};

/// Store prefix for protocol data.
pub const PROTOCOL_DATA_PREFIX: u8 = 0x00;

/// Store prefix for live claims.
pub const CLAIM_PREFIX: u8 = 0x01;

/// Store prefix for claims archived at the last epoch boundary.
pub const LAST_EPOCH_CLAIM_PREFIX: u8 = 0x02;

/// Errors produced by protocol data decoding, validation and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolDataError {
    /// Type name or tag not known.
    #[error("unknown protocol data type: {0}")]
    UnknownType(String),

    /// Type is reserved but has no implementation.
    #[error("protocol data type {0} is not implemented")]
    Unimplemented(ProtocolDataType),

    /// Payload decoded to an all-default record.
    #[error("unable to unmarshal {0} protocol data from empty JSON object")]
    EmptyPayload(&'static str),

    /// A record was requested as a different type than it was stored as.
    #[error("protocol data type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: ProtocolDataType,
        got: ProtocolDataType,
    },

    /// A pool document is inconsistent.
    #[error("invalid pool: {0}")]
    InvalidPool(String),

    /// A store key could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] FieldErrors),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Math(#[from] MathError),
}

pub type Result<T> = std::result::Result<T, ProtocolDataError>;
