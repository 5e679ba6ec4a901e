//! State-transition messages and their stateless checks.

use serde::{Deserialize, Serialize};

use crate::address::address_from_bech32;
use crate::claims::{ClaimType, Proof};
use crate::validation::{FieldErrors, NEGATIVE_ATTRIBUTE, UNDEFINED_ATTRIBUTE};

/// A user's claim of participation, backed by remote-chain proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitClaim {
    pub user_address: String,
    /// Zone whose qAsset the claim counts towards.
    pub zone: String,
    /// Chain the proofs were taken from.
    pub src_zone: String,
    pub claim_type: ClaimType,
    pub proofs: Vec<Proof>,
}

impl MsgSubmitClaim {
    /// Stateless checks; every failing field is reported.
    ///
    /// # Errors
    ///
    /// Returns the collected [`FieldErrors`].
    pub fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();

        if let Err(e) = address_from_bech32(&self.user_address, None) {
            errs.insert("UserAddress", e);
        }
        if self.zone.is_empty() {
            errs.insert("Zone", UNDEFINED_ATTRIBUTE);
        }
        if self.src_zone.is_empty() {
            errs.insert("SrcZone", UNDEFINED_ATTRIBUTE);
        }
        if matches!(self.claim_type, ClaimType::Undefined) {
            errs.insert("Action", format!("claim type out of bounds, got {}", self.claim_type.tag()));
        }
        if self.proofs.is_empty() {
            errs.insert("Proofs", UNDEFINED_ATTRIBUTE);
        }
        for (i, proof) in self.proofs.iter().enumerate() {
            if let Err(proof_errs) = validate_proof(proof) {
                errs.nest(&format!("Proof [{i}]"), proof_errs);
            }
        }

        errs.into_result()
    }
}

fn validate_proof(proof: &Proof) -> Result<(), FieldErrors> {
    let mut errs = FieldErrors::new();
    if proof.key.is_empty() {
        errs.insert("Key", UNDEFINED_ATTRIBUTE);
    }
    if proof.proof_ops.as_ref().map_or(true, |ops| ops.ops.is_empty()) {
        errs.insert("ProofOps", UNDEFINED_ATTRIBUTE);
    }
    if proof.height < 0 {
        errs.insert("Height", NEGATIVE_ATTRIBUTE);
    }
    if proof.proof_type.is_empty() {
        errs.insert("ProofType", UNDEFINED_ATTRIBUTE);
    }
    errs.into_result()
}

/// Governance removal of a protocol data record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgGovRemoveProtocolData {
    pub title: String,
    pub description: String,
    /// Base64 of the full store key of the record.
    pub key: String,
    pub authority: String,
}

impl MsgGovRemoveProtocolData {
    /// # Errors
    ///
    /// Returns the collected [`FieldErrors`].
    pub fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        if self.title.is_empty() {
            errs.insert("Title", UNDEFINED_ATTRIBUTE);
        }
        if self.description.is_empty() {
            errs.insert("Description", UNDEFINED_ATTRIBUTE);
        }
        if self.key.is_empty() {
            errs.insert("Key", UNDEFINED_ATTRIBUTE);
        }
        if let Err(e) = address_from_bech32(&self.authority, None) {
            errs.insert("Authority", e);
        }
        errs.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ProofOp, ProofOps};

    fn proof() -> Proof {
        Proof {
            key: vec![0x02, 1, 1],
            data: b"1".to_vec(),
            proof_ops: Some(ProofOps {
                ops: vec![ProofOp {
                    op_type: "ics23:iavl".into(),
                    key: vec![1],
                    data: vec![1],
                }],
            }),
            height: 10,
            proof_type: "bank".into(),
        }
    }

    fn msg() -> MsgSubmitClaim {
        MsgSubmitClaim {
            user_address: "quick1jc24kwznud9m3mwqmcz3xw33ndjuufngu5m0y6".into(),
            zone: "cosmoshub-4".into(),
            src_zone: "osmosis-1".into(),
            claim_type: ClaimType::LiquidToken,
            proofs: vec![proof()],
        }
    }

    #[test]
    fn test_valid_msg() {
        assert!(msg().validate_basic().is_ok());
    }

    #[test]
    fn test_every_failure_reported() {
        let mut m = msg();
        m.user_address = "cosmos1bad".into();
        m.zone.clear();
        m.claim_type = ClaimType::Undefined;
        let err = m.validate_basic().expect_err("invalid");
        assert!(err.contains("UserAddress"));
        assert!(err.contains("Zone"));
        assert!(err.contains("Action"));
        assert!(!err.contains("SrcZone"));
    }

    #[test]
    fn test_each_proof_checked() {
        let mut m = msg();
        let mut bad = proof();
        bad.key.clear();
        bad.proof_ops = None;
        m.proofs.push(bad);
        let err = m.validate_basic().expect_err("invalid proof");
        assert!(err.contains("Proof [1].Key"));
        assert!(err.contains("Proof [1].ProofOps"));
        assert!(!err.contains("Proof [0].Key"));
    }

    #[test]
    fn test_no_proofs() {
        let mut m = msg();
        m.proofs.clear();
        let err = m.validate_basic().expect_err("no proofs");
        assert_eq!(err.get("Proofs"), Some(UNDEFINED_ATTRIBUTE));
    }

    #[test]
    fn test_gov_remove_validation() {
        let m = MsgGovRemoveProtocolData {
            title: "remove".into(),
            description: "stale pool".into(),
            key: "AAQx".into(),
            authority: "quick10d07y265gmmuvt4z0w9aw880jnsr700j3xrh0p".into(),
        };
        assert!(m.validate_basic().is_ok());

        let empty = MsgGovRemoveProtocolData {
            title: String::new(),
            description: String::new(),
            key: String::new(),
            authority: String::new(),
        };
        assert_eq!(empty.validate_basic().expect_err("empty").len(), 4);
    }
}
