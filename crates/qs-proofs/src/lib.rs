//! # qs-proofs
//!
//! Merkle proof verification for remote (and local) chain state.
//!
//! A claim carries raw key/value pairs read from another chain together
//! with the Tendermint `ProofOps` returned by the RPC query. Verification
//! checks those ops against the app hash recorded by the IBC light client
//! for that chain at `height + 1` (the header of block N+1 commits the app
//! hash of block N).
//!
//! ## Modules
//!
//! - [`client`] - light-client lookups the verifier depends on
//! - [`path`] - Merkle paths and key escaping
//! - [`verify`] - chained membership / non-membership verification

pub mod client;
pub mod path;
pub mod verify;

pub use client::{Height, LightClient};
pub use path::MerklePath;
pub use verify::{verify_proof_ops, verify_self_proof_ops};

/// Proof verification errors.
///
/// Each failure class is a distinct variant so callers can report exactly
/// which stage rejected a proof.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("unable to validate proof. No proof submitted")]
    NoProof,

    #[error("connection {0} not found")]
    ConnectionNotFound(String),

    #[error("unable to fetch consensus state for client {client_id} at {height}")]
    ConsensusStateNotFound { client_id: String, height: Height },

    #[error("unable to fetch client state for client {0}")]
    ClientStateNotFound(String),

    #[error("unable to lookup self-consensus state {0}")]
    SelfConsensusStateNotFound(String),

    #[error("error converting proofs: {0}")]
    ProofConversion(String),

    #[error("unable to verify inclusion proof: {0}")]
    MembershipFailed(String),

    #[error("unable to verify non-inclusion proof: {0}")]
    NonMembershipFailed(String),
}

pub type Result<T> = std::result::Result<T, ProofError>;
