//! Light-client state consumed by the verifier.
//!
//! Header verification and client updates belong to the IBC stack; the
//! verifier only reads the trusted roots and proof specs it maintains.

use std::fmt;

use ics23::ProofSpec;

/// IBC height: revision number plus block height within the revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Height {
    pub revision_number: u64,
    pub revision_height: u64,
}

impl Height {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

/// Revision number encoded in a chain ID of the form `{name}-{revision}`.
///
/// Chain IDs without a well-formed suffix (no dash, empty name, leading
/// zero, non-digits) are revision 0.
pub fn parse_chain_revision(chain_id: &str) -> u64 {
    let Some((name, suffix)) = chain_id.rsplit_once('-') else {
        return 0;
    };
    if name.is_empty() || name.ends_with('-') || name.ends_with('\n') {
        return 0;
    }
    let mut chars = suffix.chars();
    match chars.next() {
        Some('1'..='9') if chars.all(|c| c.is_ascii_digit()) => suffix.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Trusted light-client state.
pub trait LightClient {
    /// Client ID backing an IBC connection.
    fn connection_client_id(&self, connection_id: &str) -> Option<String>;

    /// Commitment root (app hash) of the client's consensus state at `height`.
    fn consensus_root(&self, client_id: &str, height: Height) -> Option<Vec<u8>>;

    /// Proof specs from the client state, outermost store last.
    fn proof_specs(&self, client_id: &str) -> Option<Vec<ProofSpec>>;

    /// Root of the local chain's own consensus state recorded under `key`.
    fn self_consensus_root(&self, key: &str) -> Option<Vec<u8>>;
}

/// Proof specs of a Cosmos SDK chain: IAVL module stores under a
/// Tendermint simple-Merkle multistore.
pub fn sdk_specs() -> Vec<ProofSpec> {
    vec![ics23::iavl_spec(), ics23::tendermint_spec()]
}
