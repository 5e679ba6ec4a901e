//! Protocol data types and the stored envelope.
//!
//! A [`ProtocolData`] carries its type and an opaque JSON payload. Decoding
//! goes through [`ProtocolDataValue::decode`], which maps the type to the
//! concrete record and rejects payloads that decode to an all-default
//! record (an empty `{}` written by mistake would otherwise look valid).

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use qs_types::FieldErrors;

use crate::crescent::{
    CrescentPoolCoinSupplyProtocolData, CrescentPoolProtocolData, CrescentReserveAddressBalanceProtocolData,
};
use crate::osmosis::{OsmosisClPoolProtocolData, OsmosisPoolProtocolData};
use crate::records::{
    ConnectionProtocolData, CrescentParamsProtocolData, LiquidAllowedDenomProtocolData, MembraneParamsProtocolData,
    OsmosisParamsProtocolData, UmeeParamsProtocolData,
};
use crate::umee::{
    UmeeInterestScalarProtocolData, UmeeLeverageModuleBalanceProtocolData, UmeeReservesProtocolData,
    UmeeTotalBorrowsProtocolData, UmeeUTokenSupplyProtocolData,
};
use crate::{ProtocolDataError, Result};

/// Kind of external state a record describes. Tags are stable and used in
/// store keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtocolDataType {
    Connection,
    OsmosisParams,
    LiquidToken,
    OsmosisPool,
    CrescentPool,
    SifchainPool,
    UmeeParams,
    UmeeReserves,
    UmeeInterestScalar,
    UmeeTotalBorrows,
    UmeeUTokenSupply,
    UmeeLeverageModuleBalance,
    CrescentParams,
    CrescentReserveAddressBalance,
    CrescentPoolCoinSupply,
    MembraneParams,
    OsmosisClPool,
}

impl ProtocolDataType {
    pub const ALL: [ProtocolDataType; 17] = [
        ProtocolDataType::Connection,
        ProtocolDataType::OsmosisParams,
        ProtocolDataType::LiquidToken,
        ProtocolDataType::OsmosisPool,
        ProtocolDataType::CrescentPool,
        ProtocolDataType::SifchainPool,
        ProtocolDataType::UmeeParams,
        ProtocolDataType::UmeeReserves,
        ProtocolDataType::UmeeInterestScalar,
        ProtocolDataType::UmeeTotalBorrows,
        ProtocolDataType::UmeeUTokenSupply,
        ProtocolDataType::UmeeLeverageModuleBalance,
        ProtocolDataType::CrescentParams,
        ProtocolDataType::CrescentReserveAddressBalance,
        ProtocolDataType::CrescentPoolCoinSupply,
        ProtocolDataType::MembraneParams,
        ProtocolDataType::OsmosisClPool,
    ];

    /// Stable numeric tag; `0` is reserved for "undefined".
    pub fn tag(self) -> u8 {
        match self {
            ProtocolDataType::Connection => 1,
            ProtocolDataType::OsmosisParams => 2,
            ProtocolDataType::LiquidToken => 3,
            ProtocolDataType::OsmosisPool => 4,
            ProtocolDataType::CrescentPool => 5,
            ProtocolDataType::SifchainPool => 6,
            ProtocolDataType::UmeeParams => 7,
            ProtocolDataType::UmeeReserves => 8,
            ProtocolDataType::UmeeInterestScalar => 9,
            ProtocolDataType::UmeeTotalBorrows => 10,
            ProtocolDataType::UmeeUTokenSupply => 11,
            ProtocolDataType::UmeeLeverageModuleBalance => 12,
            ProtocolDataType::CrescentParams => 13,
            ProtocolDataType::CrescentReserveAddressBalance => 14,
            ProtocolDataType::CrescentPoolCoinSupply => 15,
            ProtocolDataType::MembraneParams => 16,
            ProtocolDataType::OsmosisClPool => 17,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Short name, e.g. `LiquidToken`.
    pub fn short_name(self) -> &'static str {
        match self {
            ProtocolDataType::Connection => "Connection",
            ProtocolDataType::OsmosisParams => "OsmosisParams",
            ProtocolDataType::LiquidToken => "LiquidToken",
            ProtocolDataType::OsmosisPool => "OsmosisPool",
            ProtocolDataType::CrescentPool => "CrescentPool",
            ProtocolDataType::SifchainPool => "SifchainPool",
            ProtocolDataType::UmeeParams => "UmeeParams",
            ProtocolDataType::UmeeReserves => "UmeeReserves",
            ProtocolDataType::UmeeInterestScalar => "UmeeInterestScalar",
            ProtocolDataType::UmeeTotalBorrows => "UmeeTotalBorrows",
            ProtocolDataType::UmeeUTokenSupply => "UmeeUTokenSupply",
            ProtocolDataType::UmeeLeverageModuleBalance => "UmeeLeverageModuleBalance",
            ProtocolDataType::CrescentParams => "CrescentParams",
            ProtocolDataType::CrescentReserveAddressBalance => "CrescentReserveAddressBalance",
            ProtocolDataType::CrescentPoolCoinSupply => "CrescentPoolCoinSupply",
            ProtocolDataType::MembraneParams => "MembraneParams",
            ProtocolDataType::OsmosisClPool => "OsmosisCLPool",
        }
    }

    /// Full name, e.g. `ProtocolDataTypeLiquidToken`.
    pub fn name(self) -> String {
        format!("ProtocolDataType{}", self.short_name())
    }

    /// Resolve a full or short name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::UnknownType`].
    pub fn from_name(name: &str) -> Result<Self> {
        let short = name.strip_prefix("ProtocolDataType").unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|t| t.short_name() == short)
            .ok_or_else(|| ProtocolDataError::UnknownType(name.to_string()))
    }
}

impl fmt::Display for ProtocolDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolDataType{}", self.short_name())
    }
}

impl TryFrom<String> for ProtocolDataType {
    type Error = ProtocolDataError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_name(&value)
    }
}

impl From<ProtocolDataType> for String {
    fn from(value: ProtocolDataType) -> Self {
        value.name()
    }
}

/// Stored envelope: a type and its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolData {
    #[serde(rename = "Type")]
    pub data_type: ProtocolDataType,
    #[serde(rename = "Data")]
    pub data: serde_json::Value,
}

impl ProtocolData {
    pub fn new(data_type: ProtocolDataType, data: serde_json::Value) -> Self {
        Self { data_type, data }
    }

    /// Wrap a record, serializing its payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::Json`] if the record does not serialize.
    pub fn from_record<T: ProtocolDataRecord>(record: &T) -> Result<Self> {
        Ok(Self::new(T::DATA_TYPE, serde_json::to_value(record)?))
    }

    /// Decode to the concrete record of this envelope's type.
    ///
    /// # Errors
    ///
    /// See [`ProtocolDataValue::decode`].
    pub fn decode(&self) -> Result<ProtocolDataValue> {
        ProtocolDataValue::decode(self.data_type, &self.data)
    }

    /// Decode as `T`, which must match the envelope's type.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolDataError::TypeMismatch`], or the decode error.
    pub fn decode_as<T: ProtocolDataRecord>(&self) -> Result<T> {
        if self.data_type != T::DATA_TYPE {
            return Err(ProtocolDataError::TypeMismatch {
                expected: T::DATA_TYPE,
                got: self.data_type,
            });
        }
        decode_record(&self.data)
    }

    /// Decode and run the record's stateless validation.
    ///
    /// # Errors
    ///
    /// Returns the decode error or [`ProtocolDataError::Validation`].
    pub fn validate_basic(&self) -> Result<()> {
        self.decode()?.validate_basic()?;
        Ok(())
    }
}

/// A concrete protocol data record.
pub trait ProtocolDataRecord: Serialize + DeserializeOwned + Default + PartialEq {
    const DATA_TYPE: ProtocolDataType;

    /// Stateless checks, reporting every failing field.
    ///
    /// # Errors
    ///
    /// Returns the collected [`FieldErrors`].
    fn validate_basic(&self) -> std::result::Result<(), FieldErrors>;

    /// Natural key the record is stored under within its type's prefix.
    fn generate_key(&self) -> String;
}

/// Deserialize a record, rejecting an all-default payload.
///
/// # Errors
///
/// Returns [`ProtocolDataError::Json`] or [`ProtocolDataError::EmptyPayload`].
pub fn decode_record<T: ProtocolDataRecord>(data: &serde_json::Value) -> Result<T> {
    let record: T = serde_json::from_value(data.clone())?;
    if record == T::default() {
        return Err(ProtocolDataError::EmptyPayload(T::DATA_TYPE.short_name()));
    }
    Ok(record)
}

/// A decoded record of any implemented type.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolDataValue {
    Connection(ConnectionProtocolData),
    OsmosisParams(OsmosisParamsProtocolData),
    LiquidToken(LiquidAllowedDenomProtocolData),
    OsmosisPool(OsmosisPoolProtocolData),
    OsmosisClPool(OsmosisClPoolProtocolData),
    CrescentPool(CrescentPoolProtocolData),
    CrescentParams(CrescentParamsProtocolData),
    CrescentReserveAddressBalance(CrescentReserveAddressBalanceProtocolData),
    CrescentPoolCoinSupply(CrescentPoolCoinSupplyProtocolData),
    UmeeParams(UmeeParamsProtocolData),
    UmeeReserves(UmeeReservesProtocolData),
    UmeeInterestScalar(UmeeInterestScalarProtocolData),
    UmeeTotalBorrows(UmeeTotalBorrowsProtocolData),
    UmeeUTokenSupply(UmeeUTokenSupplyProtocolData),
    UmeeLeverageModuleBalance(UmeeLeverageModuleBalanceProtocolData),
    MembraneParams(MembraneParamsProtocolData),
}

impl ProtocolDataValue {
    /// Decode `data` as the record for `data_type`.
    ///
    /// # Errors
    ///
    /// - [`ProtocolDataError::Unimplemented`] for reserved types
    /// - [`ProtocolDataError::Json`] for malformed payloads
    /// - [`ProtocolDataError::EmptyPayload`] for all-default payloads
    pub fn decode(data_type: ProtocolDataType, data: &serde_json::Value) -> Result<Self> {
        let value = match data_type {
            ProtocolDataType::Connection => Self::Connection(decode_record(data)?),
            ProtocolDataType::OsmosisParams => Self::OsmosisParams(decode_record(data)?),
            ProtocolDataType::LiquidToken => Self::LiquidToken(decode_record(data)?),
            ProtocolDataType::OsmosisPool => Self::OsmosisPool(decode_record(data)?),
            ProtocolDataType::OsmosisClPool => Self::OsmosisClPool(decode_record(data)?),
            ProtocolDataType::CrescentPool => Self::CrescentPool(decode_record(data)?),
            ProtocolDataType::CrescentParams => Self::CrescentParams(decode_record(data)?),
            ProtocolDataType::CrescentReserveAddressBalance => {
                Self::CrescentReserveAddressBalance(decode_record(data)?)
            }
            ProtocolDataType::CrescentPoolCoinSupply => Self::CrescentPoolCoinSupply(decode_record(data)?),
            ProtocolDataType::UmeeParams => Self::UmeeParams(decode_record(data)?),
            ProtocolDataType::UmeeReserves => Self::UmeeReserves(decode_record(data)?),
            ProtocolDataType::UmeeInterestScalar => Self::UmeeInterestScalar(decode_record(data)?),
            ProtocolDataType::UmeeTotalBorrows => Self::UmeeTotalBorrows(decode_record(data)?),
            ProtocolDataType::UmeeUTokenSupply => Self::UmeeUTokenSupply(decode_record(data)?),
            ProtocolDataType::UmeeLeverageModuleBalance => Self::UmeeLeverageModuleBalance(decode_record(data)?),
            ProtocolDataType::MembraneParams => Self::MembraneParams(decode_record(data)?),
            ProtocolDataType::SifchainPool => return Err(ProtocolDataError::Unimplemented(data_type)),
        };
        Ok(value)
    }

    pub fn data_type(&self) -> ProtocolDataType {
        match self {
            Self::Connection(_) => ProtocolDataType::Connection,
            Self::OsmosisParams(_) => ProtocolDataType::OsmosisParams,
            Self::LiquidToken(_) => ProtocolDataType::LiquidToken,
            Self::OsmosisPool(_) => ProtocolDataType::OsmosisPool,
            Self::OsmosisClPool(_) => ProtocolDataType::OsmosisClPool,
            Self::CrescentPool(_) => ProtocolDataType::CrescentPool,
            Self::CrescentParams(_) => ProtocolDataType::CrescentParams,
            Self::CrescentReserveAddressBalance(_) => ProtocolDataType::CrescentReserveAddressBalance,
            Self::CrescentPoolCoinSupply(_) => ProtocolDataType::CrescentPoolCoinSupply,
            Self::UmeeParams(_) => ProtocolDataType::UmeeParams,
            Self::UmeeReserves(_) => ProtocolDataType::UmeeReserves,
            Self::UmeeInterestScalar(_) => ProtocolDataType::UmeeInterestScalar,
            Self::UmeeTotalBorrows(_) => ProtocolDataType::UmeeTotalBorrows,
            Self::UmeeUTokenSupply(_) => ProtocolDataType::UmeeUTokenSupply,
            Self::UmeeLeverageModuleBalance(_) => ProtocolDataType::UmeeLeverageModuleBalance,
            Self::MembraneParams(_) => ProtocolDataType::MembraneParams,
        }
    }

    /// # Errors
    ///
    /// Returns the record's [`FieldErrors`].
    pub fn validate_basic(&self) -> std::result::Result<(), FieldErrors> {
        match self {
            Self::Connection(r) => r.validate_basic(),
            Self::OsmosisParams(r) => r.validate_basic(),
            Self::LiquidToken(r) => r.validate_basic(),
            Self::OsmosisPool(r) => r.validate_basic(),
            Self::OsmosisClPool(r) => r.validate_basic(),
            Self::CrescentPool(r) => r.validate_basic(),
            Self::CrescentParams(r) => r.validate_basic(),
            Self::CrescentReserveAddressBalance(r) => r.validate_basic(),
            Self::CrescentPoolCoinSupply(r) => r.validate_basic(),
            Self::UmeeParams(r) => r.validate_basic(),
            Self::UmeeReserves(r) => r.validate_basic(),
            Self::UmeeInterestScalar(r) => r.validate_basic(),
            Self::UmeeTotalBorrows(r) => r.validate_basic(),
            Self::UmeeUTokenSupply(r) => r.validate_basic(),
            Self::UmeeLeverageModuleBalance(r) => r.validate_basic(),
            Self::MembraneParams(r) => r.validate_basic(),
        }
    }

    pub fn generate_key(&self) -> String {
        match self {
            Self::Connection(r) => r.generate_key(),
            Self::OsmosisParams(r) => r.generate_key(),
            Self::LiquidToken(r) => r.generate_key(),
            Self::OsmosisPool(r) => r.generate_key(),
            Self::OsmosisClPool(r) => r.generate_key(),
            Self::CrescentPool(r) => r.generate_key(),
            Self::CrescentParams(r) => r.generate_key(),
            Self::CrescentReserveAddressBalance(r) => r.generate_key(),
            Self::CrescentPoolCoinSupply(r) => r.generate_key(),
            Self::UmeeParams(r) => r.generate_key(),
            Self::UmeeReserves(r) => r.generate_key(),
            Self::UmeeInterestScalar(r) => r.generate_key(),
            Self::UmeeTotalBorrows(r) => r.generate_key(),
            Self::UmeeUTokenSupply(r) => r.generate_key(),
            Self::UmeeLeverageModuleBalance(r) => r.generate_key(),
            Self::MembraneParams(r) => r.generate_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tags_stable_and_unique() {
        for (i, t) in ProtocolDataType::ALL.iter().enumerate() {
            assert_eq!(usize::from(t.tag()), i + 1);
            assert_eq!(ProtocolDataType::from_tag(t.tag()), Some(*t));
        }
        assert_eq!(ProtocolDataType::from_tag(0), None);
        assert_eq!(ProtocolDataType::from_tag(18), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(ProtocolDataType::LiquidToken.to_string(), "ProtocolDataTypeLiquidToken");
        assert_eq!(
            ProtocolDataType::from_name("ProtocolDataTypeOsmosisCLPool").expect("full"),
            ProtocolDataType::OsmosisClPool
        );
        assert_eq!(
            ProtocolDataType::from_name("UmeeReserves").expect("short"),
            ProtocolDataType::UmeeReserves
        );
        assert!(matches!(
            ProtocolDataType::from_name("ProtocolDataTypeBogus"),
            Err(ProtocolDataError::UnknownType(_))
        ));
    }

    #[test]
    fn test_envelope_json() {
        let pd = ProtocolData::new(ProtocolDataType::MembraneParams, json!({"ContractAddress": "x"}));
        let text = serde_json::to_string(&pd).expect("serialize");
        assert_eq!(
            text,
            r#"{"Type":"ProtocolDataTypeMembraneParams","Data":{"ContractAddress":"x"}}"#
        );
        let back: ProtocolData = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, pd);
        assert!(serde_json::from_str::<ProtocolData>(r#"{"Type":"nope","Data":{}}"#).is_err());
    }

    #[test]
    fn test_empty_payload_rejected() {
        for t in ProtocolDataType::ALL {
            let err = ProtocolDataValue::decode(t, &json!({})).expect_err("empty");
            match t {
                ProtocolDataType::SifchainPool => {
                    assert!(matches!(err, ProtocolDataError::Unimplemented(_)))
                }
                _ => assert!(matches!(err, ProtocolDataError::EmptyPayload(_)), "{t}: {err}"),
            }
        }
        let err = ProtocolDataValue::decode(ProtocolDataType::Connection, &json!({})).expect_err("empty");
        assert_eq!(
            err.to_string(),
            "unable to unmarshal Connection protocol data from empty JSON object"
        );
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let err = ProtocolDataValue::decode(ProtocolDataType::Connection, &json!({"ChainID": 12}))
            .expect_err("malformed");
        assert!(matches!(err, ProtocolDataError::Json(_)));
    }

    #[test]
    fn test_decode_as_checks_type() {
        let pd = ProtocolData::new(
            ProtocolDataType::CrescentParams,
            json!({"ChainID": "mooncat-1-1"}),
        );
        let err = pd.decode_as::<UmeeParamsProtocolData>().expect_err("mismatch");
        assert!(matches!(err, ProtocolDataError::TypeMismatch { .. }));
        let params = pd.decode_as::<CrescentParamsProtocolData>().expect("decode");
        assert_eq!(params.chain_id, "mooncat-1-1");
    }

    #[test]
    fn test_validate_idempotent() {
        let pd = ProtocolData::new(
            ProtocolDataType::LiquidToken,
            json!({"ChainID": "somechain", "RegisteredZoneChainID": "", "IbcDenom": "ibc/x", "QAssetDenom": ""}),
        );
        let first = pd.validate_basic().expect_err("invalid").to_string();
        let second = pd.validate_basic().expect_err("invalid").to_string();
        assert_eq!(first, second);
    }
}
