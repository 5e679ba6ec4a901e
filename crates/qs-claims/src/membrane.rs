//! Membrane CDP collateral on Osmosis.
//!
//! Proofs are raw CosmWasm contract-store entries of the Membrane positions
//! map, keyed by owner. Membrane state lives in a contract on Osmosis, so
//! there is nothing to refresh between epochs.

use serde::Deserialize;

use qs_protocoldata::records::{MembraneParamsProtocolData, MEMBRANE_PARAMS_KEY};
use qs_protocoldata::store;
use qs_types::address::address_from_bech32;
use qs_types::keys::decode_cw_namespaced_key;
use qs_types::math::parse_amount;
use qs_types::{ClaimType, MsgSubmitClaim};

use crate::common::{is_zone_qasset, resolve_bech32_owner, sum_unique_proofs, user_bytes, zone};
use crate::osmosis::osmosis_params;
use crate::{ClaimContext, ClaimError, ClaimSubmodule, HookContext, Result};

/// Namespace of the positions map in the Membrane contract.
pub const POSITIONS_NAMESPACE: &[u8] = b"positions";

#[derive(Debug, Deserialize)]
struct Position {
    #[serde(default)]
    collateral_assets: Vec<CollateralAsset>,
}

#[derive(Debug, Deserialize)]
struct CollateralAsset {
    asset: Asset,
}

#[derive(Debug, Deserialize)]
struct Asset {
    info: AssetInfo,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AssetInfo {
    NativeToken { denom: String },
    Token { address: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MembraneModule;

impl ClaimSubmodule for MembraneModule {
    fn claim_type(&self) -> ClaimType {
        ClaimType::Membrane
    }

    fn hooks(&self, _ctx: &mut HookContext<'_>) -> Result<usize> {
        Ok(0)
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        let params = store::get_record::<MembraneParamsProtocolData>(ctx.store, MEMBRANE_PARAMS_KEY)?
            .ok_or_else(|| ClaimError::MissingProtocolData(MEMBRANE_PARAMS_KEY.to_string()))?;
        let osmosis = osmosis_params(ctx.store)?;
        if msg.src_zone != osmosis.chain_id {
            return Err(ClaimError::SrcZoneMismatch);
        }
        let zone = zone(ctx, &msg.zone)?;
        let user = user_bytes(&msg.user_address)?;
        let contract = address_from_bech32(&params.contract_address, None)?;

        sum_unique_proofs(&msg.proofs, |proof| {
            if proof.data.is_empty() {
                return Ok(0);
            }
            let key = decode_cw_namespaced_key(&proof.key, 2)?;
            if key.contract != contract {
                return Err(ClaimError::InvalidContract);
            }
            let [namespace, owner] = key.parts.as_slice() else {
                return Err(ClaimError::InvalidContractKey(format!("{} key parts", key.parts.len())));
            };
            if namespace.as_slice() != POSITIONS_NAMESPACE {
                return Err(ClaimError::InvalidContractKey(String::from_utf8_lossy(namespace).into_owned()));
            }
            let owner = std::str::from_utf8(owner)
                .map_err(|_| ClaimError::InvalidContractKey("owner is not utf-8".to_string()))?;
            resolve_bech32_owner(ctx, &user, &msg.src_zone, owner)?;

            let positions: Vec<Position> = serde_json::from_slice(&proof.data)?;
            let mut held = 0u128;
            for asset in positions.iter().flat_map(|p| &p.collateral_assets) {
                let denom = match &asset.asset.info {
                    AssetInfo::NativeToken { denom } => denom,
                    AssetInfo::Token { address } => {
                        tracing::debug!(%address, "skipping cw20 collateral");
                        continue;
                    }
                };
                if !is_zone_qasset(ctx.store, &zone, &msg.src_zone, denom)? {
                    continue;
                }
                let collateral = parse_amount(&asset.asset.amount)?;
                tracing::debug!(%owner, %denom, collateral, "membrane collateral");
                held = held.saturating_add(collateral);
            }
            Ok(held)
        })
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use qs_protocoldata::records::OsmosisParamsProtocolData;
    use qs_store::MemStore;
    use qs_types::Proof;

    use super::*;
    use crate::testutil::{allow, msg, proof_of_type, set_record, zone_atom, TestIcs};

    const KEY: &str = "A0EogIAfXd8g7KRpv7SnSKbDNLBpM2O04O25Fvi7vNrEAAlwb3NpdGlvbnNvc21vMTZxcWhtc3FjczRqNm1mYTkyZmxuejRuOHRqMnM1M2p3d2c4dWpu";
    const DATA: &str = "W3sicG9zaXRpb25faWQiOiI1MDQiLCJjb2xsYXRlcmFsX2Fzc2V0cyI6W3siYXNzZXQiOnsiaW5mbyI6eyJuYXRpdmVfdG9rZW4iOnsiZGVub20iOiJpYmMvNDJEMjQ4NzlENDU2OUNFNjQ3N0I3RTg4MjA2QURCRkU0N0MyMjJDNkNBRDUxQTU0MDgzRTRBNzI1OTQyNjlGQyJ9fSwiYW1vdW50IjoiMTAzMjAwIn0sIm1heF9ib3Jyb3dfTFRWIjoiMC40NSIsIm1heF9MVFYiOiIwLjUiLCJyYXRlX2luZGV4IjoiMS4wMTE3OTkyODQ4OTMxODcwNjkiLCJwb29sX2luZm8iOm51bGwsImhpa2VfcmF0ZXMiOm51bGx9XSwiY3JlZGl0X2Ftb3VudCI6IjAifV0=";
    const CONTRACT: &str = "osmo1gy5gpqqlth0jpm9ydxlmff6g5mpnfvrfxd3mfc8dhyt03waumtzqt8exxr";
    const QATOM_ON_OSMOSIS: &str = "ibc/42D24879D4569CE6477B7E88206ADBFE47C222C6CAD51A54083E4A72594269FC";
    const OWNER_USER: &str = "quick16qqhmsqcs4j6mfa92flnz4n8tj2s53jwdhy7an";
    const OTHER_USER: &str = "quick1jc24kwznud9m3mwqmcz3xw33ndjuufngu5m0y6";

    fn seeded_store(listed: bool) -> MemStore {
        let mut store = MemStore::new();
        set_record(
            &mut store,
            &MembraneParamsProtocolData {
                contract_address: CONTRACT.into(),
            },
        );
        set_record(
            &mut store,
            &OsmosisParamsProtocolData {
                chain_id: "osmosis-1".into(),
                base_denom: "uosmo".into(),
                base_chain: "osmosis-1".into(),
            },
        );
        if listed {
            allow(&mut store, "osmosis-1", QATOM_ON_OSMOSIS, "uqatom");
        }
        store
    }

    fn position_proof() -> Proof {
        proof_of_type(
            &STANDARD.decode(KEY).expect("key"),
            &STANDARD.decode(DATA).expect("data"),
            "contract",
        )
    }

    fn ics_mapping(remote: Option<&str>) -> TestIcs {
        let mut ics = TestIcs::with_zone(zone_atom());
        if let Some(remote) = remote {
            let local = address_from_bech32(OTHER_USER, None).expect("user");
            let remote = address_from_bech32(remote, None).expect("remote");
            ics.map_address(&local, "osmosis-1", &remote);
        }
        ics
    }

    #[test]
    fn test_owner_claims_collateral() {
        let store = seeded_store(true);
        let ics = ics_mapping(None);
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OWNER_USER, "osmosis-1", ClaimType::Membrane, vec![position_proof()]);
        assert_eq!(MembraneModule.validate_claim(&ctx, &m).expect("claim"), 103_200);
    }

    #[test]
    fn test_mapped_account_claims_collateral() {
        let store = seeded_store(true);
        let ics = ics_mapping(Some("osmo16qqhmsqcs4j6mfa92flnz4n8tj2s53jwwg8ujn"));
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OTHER_USER, "osmosis-1", ClaimType::Membrane, vec![position_proof()]);
        assert_eq!(MembraneModule.validate_claim(&ctx, &m).expect("claim"), 103_200);
    }

    #[test]
    fn test_unmapped_user_rejected() {
        let store = seeded_store(true);
        let ics = ics_mapping(None);
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OTHER_USER, "osmosis-1", ClaimType::Membrane, vec![position_proof()]);
        assert!(matches!(
            MembraneModule.validate_claim(&ctx, &m),
            Err(ClaimError::AtProof { index: 0, source }) if matches!(*source, ClaimError::NotUserProof)
        ));
    }

    #[test]
    fn test_wrongly_mapped_user_rejected() {
        let store = seeded_store(true);
        let ics = ics_mapping(Some("osmo18e8drgypatsw0skt5ywzeqhlk365hlul3pnasr"));
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OTHER_USER, "osmosis-1", ClaimType::Membrane, vec![position_proof()]);
        assert!(matches!(
            MembraneModule.validate_claim(&ctx, &m),
            Err(ClaimError::AtProof { index: 0, source }) if matches!(*source, ClaimError::NotUserOrMappedProof)
        ));
    }

    #[test]
    fn test_unlisted_collateral_is_zero() {
        let store = seeded_store(false);
        let ics = ics_mapping(None);
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OWNER_USER, "osmosis-1", ClaimType::Membrane, vec![position_proof()]);
        assert_eq!(MembraneModule.validate_claim(&ctx, &m).expect("claim"), 0);
    }

    #[test]
    fn test_src_zone_must_be_osmosis() {
        let store = seeded_store(true);
        let ics = ics_mapping(None);
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OWNER_USER, "juno-1", ClaimType::Membrane, vec![position_proof()]);
        assert!(matches!(
            MembraneModule.validate_claim(&ctx, &m),
            Err(ClaimError::SrcZoneMismatch)
        ));
    }

    #[test]
    fn test_other_contract_rejected() {
        let mut store = seeded_store(true);
        set_record(
            &mut store,
            &MembraneParamsProtocolData {
                contract_address: qs_types::address::encode_bech32("osmo", &[1u8; 32]).expect("contract"),
            },
        );
        let ics = ics_mapping(None);
        let ctx = ClaimContext { store: &store, ics: &ics };
        let m = msg(OWNER_USER, "osmosis-1", ClaimType::Membrane, vec![position_proof()]);
        assert!(matches!(
            MembraneModule.validate_claim(&ctx, &m),
            Err(ClaimError::AtProof { index: 0, source }) if matches!(*source, ClaimError::InvalidContract)
        ));
    }

    #[test]
    fn test_cw20_collateral_ignored() {
        let data = br#"[{"collateral_assets":[{"asset":{"info":{"token":{"address":"osmo1cw20"}},"amount":"5"}}]}]"#;
        let positions: Vec<Position> = serde_json::from_slice(data).expect("positions");
        assert!(matches!(
            positions[0].collateral_assets[0].asset.info,
            AssetInfo::Token { .. }
        ));
    }
}
