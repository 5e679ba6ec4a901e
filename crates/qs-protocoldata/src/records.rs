//! Connection, allow-list and parameter records.

use serde::{Deserialize, Serialize};

use qs_types::address::address_from_bech32;
use qs_types::coin::validate_denom;
use qs_types::validation::UNDEFINED_ATTRIBUTE;
use qs_types::FieldErrors;

use crate::types::{ProtocolDataRecord, ProtocolDataType};

pub const OSMOSIS_PARAMS_KEY: &str = "osmosisparams";
pub const UMEE_PARAMS_KEY: &str = "umeeparams";
pub const CRESCENT_PARAMS_KEY: &str = "crescentparams";
pub const MEMBRANE_PARAMS_KEY: &str = "membraneparams";

/// Chain IDs follow `{name}-{revision}`.
pub fn is_valid_chain_id(chain_id: &str) -> bool {
    !chain_id.is_empty() && chain_id.split('-').count() >= 2
}

pub(crate) fn require(errs: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        errs.insert(field, UNDEFINED_ATTRIBUTE);
    }
}

pub(crate) fn require_chain_id(errs: &mut FieldErrors, field: &str, value: &str) {
    if !is_valid_chain_id(value) {
        errs.insert(field, format!("invalid chain id {value:?}"));
    }
}

pub(crate) fn require_denom(errs: &mut FieldErrors, field: &str, value: &str) {
    if let Err(e) = validate_denom(value) {
        errs.insert(field, e);
    }
}

/// Connection metadata for a chain, including the height of the block at
/// the last epoch boundary (the height claims must be proven at).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProtocolData {
    #[serde(rename = "ConnectionID")]
    pub connection_id: String,
    #[serde(rename = "ChainID")]
    pub chain_id: String,
    #[serde(rename = "LastEpoch")]
    pub last_epoch: i64,
    /// Bech32 account prefix on the chain.
    #[serde(rename = "Prefix")]
    pub prefix: String,
    #[serde(rename = "TransferChannel")]
    pub transfer_channel: String,
}

impl ProtocolDataRecord for ConnectionProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::Connection;

    fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require(&mut errs, "ConnectionID", &self.connection_id);
        require(&mut errs, "ChainID", &self.chain_id);
        require(&mut errs, "Prefix", &self.prefix);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        self.chain_id.clone()
    }
}

/// Allow-list entry: `ibc_denom` on `chain_id` is the qAsset `qasset_denom`
/// of the zone `registered_zone_chain_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidAllowedDenomProtocolData {
    #[serde(rename = "ChainID")]
    pub chain_id: String,
    #[serde(rename = "RegisteredZoneChainID")]
    pub registered_zone_chain_id: String,
    #[serde(rename = "IbcDenom")]
    pub ibc_denom: String,
    #[serde(rename = "QAssetDenom")]
    pub qasset_denom: String,
}

impl LiquidAllowedDenomProtocolData {
    /// Allow-list key for `denom` held on `chain_id`.
    pub fn key_for(chain_id: &str, denom: &str) -> String {
        format!("{chain_id}_{denom}")
    }
}

impl ProtocolDataRecord for LiquidAllowedDenomProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::LiquidToken;

    fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require_chain_id(&mut errs, "ChainID", &self.chain_id);
        require_chain_id(&mut errs, "RegisteredZoneChainID", &self.registered_zone_chain_id);
        require_denom(&mut errs, "IbcDenom", &self.ibc_denom);
        require_denom(&mut errs, "QAssetDenom", &self.qasset_denom);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        Self::key_for(&self.chain_id, &self.ibc_denom)
    }
}

/// Osmosis chain and the pricing anchor for token values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmosisParamsProtocolData {
    #[serde(rename = "ChainID")]
    pub chain_id: String,
    /// Denom valued at 1.0.
    #[serde(rename = "BaseDenom")]
    pub base_denom: String,
    /// Chain the base denom is native to.
    #[serde(rename = "BaseChain")]
    pub base_chain: String,
}

impl ProtocolDataRecord for OsmosisParamsProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::OsmosisParams;

    fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require(&mut errs, "ChainID", &self.chain_id);
        require(&mut errs, "BaseChain", &self.base_chain);
        require(&mut errs, "BaseDenom", &self.base_denom);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        OSMOSIS_PARAMS_KEY.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmeeParamsProtocolData {
    #[serde(rename = "ChainID")]
    pub chain_id: String,
}

impl ProtocolDataRecord for UmeeParamsProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::UmeeParams;

    fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require(&mut errs, "ChainID", &self.chain_id);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        UMEE_PARAMS_KEY.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrescentParamsProtocolData {
    #[serde(rename = "ChainID")]
    pub chain_id: String,
}

impl ProtocolDataRecord for CrescentParamsProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::CrescentParams;

    fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require(&mut errs, "ChainID", &self.chain_id);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        CRESCENT_PARAMS_KEY.to_string()
    }
}

/// Membrane CDP contract whose positions are claimable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembraneParamsProtocolData {
    #[serde(rename = "ContractAddress")]
    pub contract_address: String,
}

impl ProtocolDataRecord for MembraneParamsProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::MembraneParams;

    fn validate_basic(&self) -> Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        if self.contract_address.is_empty() {
            errs.insert("ContractAddress", UNDEFINED_ATTRIBUTE);
        } else if let Err(e) = address_from_bech32(&self.contract_address, None) {
            errs.insert("ContractAddress", e);
        }
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        MEMBRANE_PARAMS_KEY.to_string()
    }
}
