//! Serde helpers for chain JSON conventions.
//!
//! Integer amounts travel as decimal strings (`"24307"`) and raw bytes as
//! standard base64, as emitted by the chain's JSON codec and Tendermint RPC.

/// `u128` amounts serialized as strings; numbers are accepted on input.
pub mod amount_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.trim().parse().map_err(D::Error::custom),
            Raw::Number(n) => Ok(u128::from(n)),
        }
    }
}

/// `u64` identifiers accepted as either numbers or strings; written as
/// numbers.
pub mod u64_lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.trim().parse().map_err(D::Error::custom),
            Raw::Number(n) => Ok(n),
        }
    }
}

/// `Vec<u8>` serialized as standard base64.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super::amount_string")]
        amount: u128,
        #[serde(with = "super::base64_bytes", default)]
        data: Vec<u8>,
    }

    #[test]
    fn test_amount_accepts_string_and_number() {
        let a: Sample = serde_json::from_str(r#"{"amount":"24307","data":"MjQzMDc="}"#).expect("string");
        let b: Sample = serde_json::from_str(r#"{"amount":24307,"data":null}"#).expect("number");
        assert_eq!(a.amount, 24307);
        assert_eq!(a.data, b"24307".to_vec());
        assert_eq!(b.amount, 24307);
        assert!(b.data.is_empty());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Pool {
        #[serde(with = "super::u64_lenient")]
        id: u64,
    }

    #[test]
    fn test_u64_lenient() {
        let a: Pool = serde_json::from_str(r#"{"id":"952"}"#).expect("string");
        let b: Pool = serde_json::from_str(r#"{"id":952}"#).expect("number");
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).expect("serialize"), r#"{"id":952}"#);
    }

    #[test]
    fn test_serializes_as_strings() {
        let s = Sample { amount: 7, data: vec![0xff] };
        let json = serde_json::to_string(&s).expect("serialize");
        assert_eq!(json, r#"{"amount":"7","data":"/w=="}"#);
    }
}
