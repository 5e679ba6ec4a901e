//! Claims and the proofs submitted to back them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::{amount_string, base64_bytes};

/// Proof type for bank-store balance proofs.
pub const PROOF_TYPE_BANK: &str = "bank";
/// Proof type for Umee leverage collateral proofs.
pub const PROOF_TYPE_LEVERAGE: &str = "leverage";
/// Proof type for Osmosis lockup proofs.
pub const PROOF_TYPE_LOCKUP: &str = "lockup";
/// Proof type for Osmosis concentrated-liquidity position proofs.
pub const PROOF_TYPE_POSITION: &str = "position";
/// Proof type for Crescent farming position proofs.
pub const PROOF_TYPE_FARM: &str = "farm";
/// Proof type for wasm contract-store proofs.
pub const PROOF_TYPE_CONTRACT: &str = "contract";

/// Kind of participation a claim asserts. Tags are stable and used in store
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    Undefined,
    LiquidToken,
    OsmosisPool,
    CrescentPool,
    SifchainPool,
    UmeeToken,
    OsmosisClPool,
    Membrane,
}

impl ClaimType {
    pub const ALL: [ClaimType; 8] = [
        ClaimType::Undefined,
        ClaimType::LiquidToken,
        ClaimType::OsmosisPool,
        ClaimType::CrescentPool,
        ClaimType::SifchainPool,
        ClaimType::UmeeToken,
        ClaimType::OsmosisClPool,
        ClaimType::Membrane,
    ];

    pub fn tag(self) -> u8 {
        match self {
            ClaimType::Undefined => 0,
            ClaimType::LiquidToken => 1,
            ClaimType::OsmosisPool => 2,
            ClaimType::CrescentPool => 3,
            ClaimType::SifchainPool => 4,
            ClaimType::UmeeToken => 5,
            ClaimType::OsmosisClPool => 6,
            ClaimType::Membrane => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            ClaimType::Undefined => "ClaimTypeUndefined",
            ClaimType::LiquidToken => "ClaimTypeLiquidToken",
            ClaimType::OsmosisPool => "ClaimTypeOsmosisPool",
            ClaimType::CrescentPool => "ClaimTypeCrescentPool",
            ClaimType::SifchainPool => "ClaimTypeSifchainPool",
            ClaimType::UmeeToken => "ClaimTypeUmeeToken",
            ClaimType::OsmosisClPool => "ClaimTypeOsmosisCLPool",
            ClaimType::Membrane => "ClaimTypeMembrane",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated claim: the amount a user held in one protocol on one source
/// chain, counted towards one zone's qAsset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub user_address: String,
    pub chain_id: String,
    pub module: ClaimType,
    pub source_chain_id: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

/// One operation of a Merkle proof, as returned by Tendermint RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOp {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(with = "base64_bytes", default)]
    pub key: Vec<u8>,
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
}

/// Ordered proof operations, innermost store first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOps {
    #[serde(default)]
    pub ops: Vec<ProofOp>,
}

/// A remote key/value pair with its Merkle proof at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "base64_bytes", default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub proof_ops: Option<ProofOps>,
    pub height: i64,
    pub proof_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_type_tags_stable() {
        for t in ClaimType::ALL {
            assert_eq!(ClaimType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(ClaimType::Membrane.tag(), 7);
        assert_eq!(ClaimType::from_tag(8), None);
    }

    #[test]
    fn test_proof_json() {
        let json = r#"{"key":"AhSWFVs4U+NLuO3A3gUTOjGbZc4maHVxYXRvbQ==","data":"MjQzMDc=","proof_ops":{"ops":[{"type":"ics23:iavl","key":"AA==","data":""}]},"height":11012784,"proof_type":"bank"}"#;
        let proof: Proof = serde_json::from_str(json).expect("proof");
        assert_eq!(proof.data, b"24307".to_vec());
        assert_eq!(proof.height, 11_012_784);
        let ops = proof.proof_ops.expect("ops").ops;
        assert_eq!(ops[0].op_type, "ics23:iavl");
        assert_eq!(ops[0].key, vec![0]);
        assert!(ops[0].data.is_empty());
    }
}
