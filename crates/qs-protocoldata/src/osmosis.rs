//! Osmosis pool records.
//!
//! `pool_data` holds the pool document last returned by the chain; it is
//! `null` until the first pool update callback lands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qs_types::FieldErrors;

use crate::pools::{ClPool, OsmosisPool};
use crate::records::{require, require_chain_id, require_denom};
use crate::types::{ProtocolDataRecord, ProtocolDataType};
use crate::Result;

/// A pool asset and the chain it originates from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenomWithZone {
    #[serde(rename = "Denom")]
    pub denom: String,
    #[serde(rename = "ChainID")]
    pub chain_id: String,
}

/// Validate a pool's IBC denom → origin map; an empty map is an error.
pub(crate) fn validate_denoms(errs: &mut FieldErrors, denoms: &BTreeMap<String, DenomWithZone>) {
    if denoms.is_empty() {
        errs.insert("Zones", qs_types::validation::UNDEFINED_ATTRIBUTE);
    }
    for (ibc_denom, dz) in denoms {
        let field = format!("Denoms[{ibc_denom}]");
        require_chain_id(errs, &format!("{field} key"), &dz.chain_id);
        require_denom(errs, &format!("{field} value"), &dz.denom);
    }
}

/// The pool denom whose origin is `chain_id`, if any.
pub fn denom_for_chain<'a>(denoms: &'a BTreeMap<String, DenomWithZone>, chain_id: &str) -> Option<&'a str> {
    denoms
        .iter()
        .find(|(_, dz)| dz.chain_id == chain_id)
        .map(|(ibc, _)| ibc.as_str())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmosisPoolProtocolData {
    #[serde(rename = "PoolID")]
    pub pool_id: u64,
    #[serde(rename = "PoolName")]
    pub pool_name: String,
    /// Block time (unix seconds) of the last pool update.
    #[serde(rename = "LastUpdated")]
    pub last_updated: i64,
    #[serde(rename = "PoolData")]
    pub pool_data: serde_json::Value,
    /// `balancer` or `stableswap`.
    #[serde(rename = "PoolType")]
    pub pool_type: String,
    /// IBC denom on Osmosis → native denom and origin chain.
    #[serde(rename = "Denoms")]
    pub denoms: BTreeMap<String, DenomWithZone>,
    #[serde(rename = "IsIncentivized")]
    pub is_incentivized: bool,
}

impl OsmosisPoolProtocolData {
    /// The decoded pool, or `None` while awaiting the first update.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProtocolDataError::Json`] for a malformed document.
    pub fn pool(&self) -> Result<Option<OsmosisPool>> {
        if self.pool_data.is_null() {
            return Ok(None);
        }
        OsmosisPool::decode(&self.pool_type, &self.pool_data).map(Some)
    }
}

impl ProtocolDataRecord for OsmosisPoolProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::OsmosisPool;

    fn validate_basic(&self) -> std::result::Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        if self.pool_id == 0 {
            errs.insert("PoolID", qs_types::validation::UNDEFINED_ATTRIBUTE);
        }
        require(&mut errs, "PoolName", &self.pool_name);
        require(&mut errs, "PoolType", &self.pool_type);
        validate_denoms(&mut errs, &self.denoms);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        self.pool_id.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmosisClPoolProtocolData {
    #[serde(rename = "PoolID")]
    pub pool_id: u64,
    #[serde(rename = "LastUpdated")]
    pub last_updated: i64,
    #[serde(rename = "PoolData")]
    pub pool_data: serde_json::Value,
    #[serde(rename = "Denoms")]
    pub denoms: BTreeMap<String, DenomWithZone>,
    #[serde(rename = "IsIncentivized")]
    pub is_incentivized: bool,
}

impl OsmosisClPoolProtocolData {
    /// # Errors
    ///
    /// Returns [`crate::ProtocolDataError::Json`] for a malformed document.
    pub fn pool(&self) -> Result<Option<ClPool>> {
        if self.pool_data.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.pool_data.clone())?))
    }
}

impl ProtocolDataRecord for OsmosisClPoolProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::OsmosisClPool;

    fn validate_basic(&self) -> std::result::Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        if self.pool_id == 0 {
            errs.insert("PoolID", qs_types::validation::UNDEFINED_ATTRIBUTE);
        }
        validate_denoms(&mut errs, &self.denoms);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        self.pool_id.to_string()
    }
}
