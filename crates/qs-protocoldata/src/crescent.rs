//! Crescent records: pools, reserve account balances and pool coin supply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qs_types::encoding::amount_string;
use qs_types::validation::UNDEFINED_ATTRIBUTE;
use qs_types::FieldErrors;

use crate::osmosis::{validate_denoms, DenomWithZone};
use crate::pools::CrescentPool;
use crate::records::{require, require_denom};
use crate::types::{ProtocolDataRecord, ProtocolDataType};
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrescentPoolProtocolData {
    #[serde(rename = "PoolID")]
    pub pool_id: u64,
    #[serde(rename = "Denoms")]
    pub denoms: BTreeMap<String, DenomWithZone>,
    #[serde(rename = "PoolData")]
    pub pool_data: serde_json::Value,
    #[serde(rename = "LastUpdated")]
    pub last_updated: i64,
}

impl CrescentPoolProtocolData {
    /// # Errors
    ///
    /// Returns [`crate::ProtocolDataError::Json`] for a malformed document.
    pub fn pool(&self) -> Result<Option<CrescentPool>> {
        if self.pool_data.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.pool_data.clone())?))
    }
}

impl ProtocolDataRecord for CrescentPoolProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::CrescentPool;

    fn validate_basic(&self) -> std::result::Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        if self.pool_id == 0 {
            errs.insert("PoolID", UNDEFINED_ATTRIBUTE);
        }
        validate_denoms(&mut errs, &self.denoms);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        self.pool_id.to_string()
    }
}

/// Balance of one denom held by a pool's reserve account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrescentReserveAddressBalanceProtocolData {
    #[serde(rename = "ReserveAddress")]
    pub reserve_address: String,
    #[serde(rename = "Denom")]
    pub denom: String,
    #[serde(rename = "Balance", with = "amount_string")]
    pub balance: u128,
}

impl CrescentReserveAddressBalanceProtocolData {
    pub fn key_for(reserve_address: &str, denom: &str) -> String {
        format!("{reserve_address}_{denom}")
    }
}

impl ProtocolDataRecord for CrescentReserveAddressBalanceProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::CrescentReserveAddressBalance;

    fn validate_basic(&self) -> std::result::Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require(&mut errs, "ReserveAddress", &self.reserve_address);
        require_denom(&mut errs, "Denom", &self.denom);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        Self::key_for(&self.reserve_address, &self.denom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrescentPoolCoinSupplyProtocolData {
    #[serde(rename = "PoolCoinDenom")]
    pub pool_coin_denom: String,
    #[serde(rename = "Supply", with = "amount_string")]
    pub supply: u128,
}

impl ProtocolDataRecord for CrescentPoolCoinSupplyProtocolData {
    const DATA_TYPE: ProtocolDataType = ProtocolDataType::CrescentPoolCoinSupply;

    fn validate_basic(&self) -> std::result::Result<(), FieldErrors> {
        let mut errs = FieldErrors::new();
        require_denom(&mut errs, "PoolCoinDenom", &self.pool_coin_denom);
        errs.into_result()
    }

    fn generate_key(&self) -> String {
        self.pool_coin_denom.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ProtocolData;

    #[test]
    fn test_reserve_balance_key_and_json() {
        let rb = CrescentReserveAddressBalanceProtocolData {
            reserve_address: "cre1reserve".into(),
            denom: "ibc/QATOM".into(),
            balance: 1_000_000,
        };
        assert_eq!(rb.generate_key(), "cre1reserve_ibc/QATOM");
        let pd = ProtocolData::from_record(&rb).expect("wrap");
        assert_eq!(pd.data["Balance"], json!("1000000"));
        let back = pd
            .decode_as::<CrescentReserveAddressBalanceProtocolData>()
            .expect("decode");
        assert_eq!(back, rb);
    }

    #[test]
    fn test_supply_validation() {
        let supply = CrescentPoolCoinSupplyProtocolData {
            pool_coin_denom: "pool5".into(),
            supply: 10,
        };
        supply.validate_basic().expect("valid");
        assert_eq!(supply.generate_key(), "pool5");
        assert!(CrescentPoolCoinSupplyProtocolData::default().validate_basic().is_err());
    }

    #[test]
    fn test_pool_document() {
        let pd = CrescentPoolProtocolData {
            pool_id: 5,
            pool_data: json!({"id": 5, "reserve_address": "cre1reserve", "pool_coin_denom": "pool5"}),
            ..Default::default()
        };
        let pool = pd.pool().expect("pool").expect("present");
        assert_eq!(pool.reserve_address, "cre1reserve");
        assert!(pd.validate_basic().expect_err("no denoms").contains("Zones"));
    }
}
