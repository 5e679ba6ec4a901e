//! Umee leverage module records.
//!
//! Every record is keyed by its denom. The uToken supply record carries the
//! uToken denom (`u/{denom}`); the others carry the token denom.

use serde::{Deserialize, Serialize};

use qs_types::encoding::amount_string;
use qs_types::{Dec, FieldErrors};

use crate::records::require_denom;
use crate::types::{ProtocolDataRecord, ProtocolDataType};

/// uToken denom prefix.
pub const UTOKEN_PREFIX: &str = "u/";

/// Token denom a uToken denom redeems to.
pub fn to_token_denom(denom: &str) -> &str {
    denom.strip_prefix(UTOKEN_PREFIX).unwrap_or(denom)
}

pub fn to_utoken_denom(denom: &str) -> String {
    format!("{UTOKEN_PREFIX}{denom}")
}

macro_rules! umee_record {
    ($(#[$doc:meta])* $name:ident, $data_type:expr, $value:ty $(, $with:literal)?) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            #[serde(rename = "Denom")]
            pub denom: String,
            #[serde(rename = "LastUpdated")]
            pub last_updated: i64,
            #[serde(rename = "Data" $(, with = $with)?)]
            pub data: $value,
        }

        impl ProtocolDataRecord for $name {
            const DATA_TYPE: ProtocolDataType = $data_type;

            fn validate_basic(&self) -> Result<(), FieldErrors> {
                let mut errs = FieldErrors::new();
                require_denom(&mut errs, "Denom", &self.denom);
                errs.into_result()
            }

            fn generate_key(&self) -> String {
                self.denom.clone()
            }
        }
    };
}

umee_record!(
    /// Reserved amount of a token, excluded from supplier redemptions.
    UmeeReservesProtocolData,
    ProtocolDataType::UmeeReserves,
    u128,
    "amount_string"
);

umee_record!(
    /// Interest scalar that converts adjusted borrows to token amounts.
    UmeeInterestScalarProtocolData,
    ProtocolDataType::UmeeInterestScalar,
    Dec
);

umee_record!(
    /// Adjusted total borrowed amount of a token.
    UmeeTotalBorrowsProtocolData,
    ProtocolDataType::UmeeTotalBorrows,
    Dec
);

umee_record!(
    /// Outstanding supply of a uToken.
    UmeeUTokenSupplyProtocolData,
    ProtocolDataType::UmeeUTokenSupply,
    u128,
    "amount_string"
);

umee_record!(
    /// Token balance of the leverage module account.
    UmeeLeverageModuleBalanceProtocolData,
    ProtocolDataType::UmeeLeverageModuleBalance,
    u128,
    "amount_string"
);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{ProtocolData, ProtocolDataValue};

    #[test]
    fn test_utoken_denoms() {
        assert_eq!(to_token_denom("u/uumee"), "uumee");
        assert_eq!(to_token_denom("uumee"), "uumee");
        assert_eq!(to_utoken_denom("uatom"), "u/uatom");
    }

    #[test]
    fn test_amount_and_dec_payloads() {
        let reserves = ProtocolDataValue::decode(
            ProtocolDataType::UmeeReserves,
            &json!({"Denom": "uumee", "LastUpdated": 10, "Data": "1500"}),
        )
        .expect("reserves");
        let ProtocolDataValue::UmeeReserves(r) = reserves else {
            unreachable!("decoded to {reserves:?}")
        };
        assert_eq!(r.data, 1500);
        assert_eq!(r.generate_key(), "uumee");

        let scalar = UmeeInterestScalarProtocolData {
            denom: "uumee".into(),
            last_updated: 10,
            data: Dec::new(1_05, 2),
        };
        let pd = ProtocolData::from_record(&scalar).expect("wrap");
        assert_eq!(pd.data["Data"], json!("1.05"));
        assert_eq!(
            pd.decode_as::<UmeeInterestScalarProtocolData>().expect("decode"),
            scalar
        );
    }

    #[test]
    fn test_denom_required() {
        let supply = UmeeUTokenSupplyProtocolData {
            denom: String::new(),
            last_updated: 1,
            data: 5,
        };
        assert!(supply.validate_basic().expect_err("no denom").contains("Denom"));
    }
}
