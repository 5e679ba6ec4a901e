//! Protocol data persistence.
//!
//! Records live under `0x00 | type tag | key` as JSON envelopes. Writes
//! return errors; callers that ingest untrusted callback data decide
//! whether to log and continue.

use qs_store::KvStore;

use crate::types::{ProtocolData, ProtocolDataRecord, ProtocolDataType};
use crate::{ProtocolDataError, Result, PROTOCOL_DATA_PREFIX};

/// `0x00 | tag`.
pub fn type_prefix(data_type: ProtocolDataType) -> Vec<u8> {
    vec![PROTOCOL_DATA_PREFIX, data_type.tag()]
}

/// `0x00 | tag | key`.
pub fn protocol_data_key(data_type: ProtocolDataType, key: &str) -> Vec<u8> {
    let mut full = type_prefix(data_type);
    full.extend_from_slice(key.as_bytes());
    full
}

/// Split a full store key into its type and natural key.
///
/// # Errors
///
/// Returns [`ProtocolDataError::InvalidKey`] for keys outside the protocol
/// data namespace or with an unknown tag.
pub fn split_key(full: &[u8]) -> Result<(ProtocolDataType, String)> {
    match full {
        [PROTOCOL_DATA_PREFIX, tag, rest @ ..] => {
            let data_type = ProtocolDataType::from_tag(*tag)
                .ok_or_else(|| ProtocolDataError::InvalidKey(format!("unknown protocol data tag {tag}")))?;
            let key = String::from_utf8(rest.to_vec())
                .map_err(|_| ProtocolDataError::InvalidKey("key is not valid utf-8".to_string()))?;
            Ok((data_type, key))
        }
        _ => Err(ProtocolDataError::InvalidKey(
            "not a protocol data key".to_string(),
        )),
    }
}

/// Store `data` under `key` within its type's namespace.
///
/// # Errors
///
/// - [`ProtocolDataError::Unimplemented`] for reserved types
/// - [`ProtocolDataError::EmptyPayload`] for a null or empty payload
/// - [`ProtocolDataError::Json`] / [`ProtocolDataError::Store`] on failure
pub fn set(store: &mut dyn KvStore, key: &str, data: &ProtocolData) -> Result<()> {
    if data.data_type == ProtocolDataType::SifchainPool {
        return Err(ProtocolDataError::Unimplemented(data.data_type));
    }
    if data.data.is_null() {
        return Err(ProtocolDataError::EmptyPayload(data.data_type.short_name()));
    }
    let bytes = serde_json::to_vec(data)?;
    store.set(&protocol_data_key(data.data_type, key), &bytes)?;
    tracing::debug!(data_type = %data.data_type, key, "protocol data stored");
    Ok(())
}

/// Wrap and store a record under its natural key.
///
/// # Errors
///
/// See [`set`].
pub fn set_record<T: ProtocolDataRecord>(store: &mut dyn KvStore, record: &T) -> Result<()> {
    set(store, &record.generate_key(), &ProtocolData::from_record(record)?)
}

/// # Errors
///
/// Returns [`ProtocolDataError::Store`] or [`ProtocolDataError::Json`].
pub fn get(store: &dyn KvStore, data_type: ProtocolDataType, key: &str) -> Result<Option<ProtocolData>> {
    match store.get(&protocol_data_key(data_type, key))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Fetch and decode a record of type `T`.
///
/// # Errors
///
/// Returns store, JSON or decode errors.
pub fn get_record<T: ProtocolDataRecord>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    get(store, T::DATA_TYPE, key)?.map(|pd| pd.decode_as::<T>()).transpose()
}

/// Delete by full store key.
///
/// # Errors
///
/// Returns [`ProtocolDataError::Store`].
pub fn delete_raw(store: &mut dyn KvStore, full_key: &[u8]) -> Result<()> {
    store.delete(full_key)?;
    Ok(())
}

/// # Errors
///
/// Returns [`ProtocolDataError::Store`].
pub fn delete(store: &mut dyn KvStore, data_type: ProtocolDataType, key: &str) -> Result<()> {
    delete_raw(store, &protocol_data_key(data_type, key))
}

/// Visit every record of `data_type` in key order until `f` returns `true`.
///
/// # Errors
///
/// Returns store or JSON errors, or the first error from `f`.
pub fn iterate_prefixed<F>(store: &dyn KvStore, data_type: ProtocolDataType, mut f: F) -> Result<()>
where
    F: FnMut(&str, &ProtocolData) -> Result<bool>,
{
    for (full, bytes) in store.iter_prefix(&type_prefix(data_type))? {
        let (_, key) = split_key(&full)?;
        let pd: ProtocolData = serde_json::from_slice(&bytes)?;
        if f(&key, &pd)? {
            break;
        }
    }
    Ok(())
}

/// Visit every record of every type in key order until `f` returns `true`.
///
/// # Errors
///
/// See [`iterate_prefixed`].
pub fn iterate_all<F>(store: &dyn KvStore, mut f: F) -> Result<()>
where
    F: FnMut(&[u8], &ProtocolData) -> Result<bool>,
{
    for (full, bytes) in store.iter_prefix(&[PROTOCOL_DATA_PREFIX])? {
        let pd: ProtocolData = serde_json::from_slice(&bytes)?;
        if f(&full, &pd)? {
            break;
        }
    }
    Ok(())
}

/// Decoded records of `T`, in key order.
///
/// # Errors
///
/// Fails on the first record that does not decode.
pub fn records<T: ProtocolDataRecord>(store: &dyn KvStore) -> Result<Vec<(String, T)>> {
    let mut out = Vec::new();
    iterate_prefixed(store, T::DATA_TYPE, |key, pd| {
        out.push((key.to_string(), pd.decode_as::<T>()?));
        Ok(false)
    })?;
    Ok(out)
}

/// Raw envelopes whose full key starts with `0x00 | tag | key_prefix`.
///
/// # Errors
///
/// Returns store or JSON errors.
pub fn prefixed(store: &dyn KvStore, data_type: ProtocolDataType, key_prefix: &str) -> Result<Vec<ProtocolData>> {
    store
        .iter_prefix(&protocol_data_key(data_type, key_prefix))?
        .into_iter()
        .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(ProtocolDataError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use qs_store::MemStore;
    use serde_json::json;

    use super::*;
    use crate::records::{ConnectionProtocolData, LiquidAllowedDenomProtocolData};

    fn liquid(chain: &str, denom: &str) -> LiquidAllowedDenomProtocolData {
        LiquidAllowedDenomProtocolData {
            chain_id: chain.into(),
            registered_zone_chain_id: "cosmoshub-4".into(),
            ibc_denom: denom.into(),
            qasset_denom: "uqatom".into(),
        }
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut store = MemStore::new();
        let record = liquid("osmosis-1", "ibc/QATOM");
        set_record(&mut store, &record).expect("set");

        let raw = store
            .get(&protocol_data_key(ProtocolDataType::LiquidToken, "osmosis-1_ibc/QATOM"))
            .expect("get")
            .expect("present");
        assert_eq!(raw.first(), Some(&b'{'));

        let back: LiquidAllowedDenomProtocolData = get_record(&store, "osmosis-1_ibc/QATOM")
            .expect("get")
            .expect("present");
        assert_eq!(back, record);
        assert!(get_record::<LiquidAllowedDenomProtocolData>(&store, "missing")
            .expect("get")
            .is_none());
    }

    #[test]
    fn test_null_and_reserved_writes_rejected() {
        let mut store = MemStore::new();
        let null = ProtocolData::new(ProtocolDataType::Connection, serde_json::Value::Null);
        assert!(matches!(
            set(&mut store, "k", &null),
            Err(ProtocolDataError::EmptyPayload(_))
        ));
        let sif = ProtocolData::new(ProtocolDataType::SifchainPool, json!({"a": 1}));
        assert!(matches!(
            set(&mut store, "k", &sif),
            Err(ProtocolDataError::Unimplemented(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_iteration_is_ordered_and_scoped() {
        let mut store = MemStore::new();
        for (chain, denom) in [("osmosis-1", "ibc/B"), ("osmosis-1", "ibc/A"), ("juno-1", "ibc/C")] {
            set_record(&mut store, &liquid(chain, denom)).expect("set");
        }
        set_record(
            &mut store,
            &ConnectionProtocolData {
                connection_id: "connection-0".into(),
                chain_id: "cosmoshub-4".into(),
                prefix: "cosmos".into(),
                ..Default::default()
            },
        )
        .expect("set");

        let keys: Vec<String> = records::<LiquidAllowedDenomProtocolData>(&store)
            .expect("records")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["juno-1_ibc/C", "osmosis-1_ibc/A", "osmosis-1_ibc/B"]);

        let mut seen = 0;
        iterate_all(&store, |_, _| {
            seen += 1;
            Ok(false)
        })
        .expect("iterate");
        assert_eq!(seen, 4);

        let mut first = Vec::new();
        iterate_prefixed(&store, ProtocolDataType::LiquidToken, |k, _| {
            first.push(k.to_string());
            Ok(true)
        })
        .expect("iterate");
        assert_eq!(first, vec!["juno-1_ibc/C"]);

        assert_eq!(
            prefixed(&store, ProtocolDataType::LiquidToken, "osmosis-1")
                .expect("prefixed")
                .len(),
            2
        );
    }

    #[test]
    fn test_delete_and_split_key() {
        let mut store = MemStore::new();
        set_record(&mut store, &liquid("osmosis-1", "ibc/A")).expect("set");
        let full = protocol_data_key(ProtocolDataType::LiquidToken, "osmosis-1_ibc/A");
        assert_eq!(
            split_key(&full).expect("split"),
            (ProtocolDataType::LiquidToken, "osmosis-1_ibc/A".to_string())
        );
        delete_raw(&mut store, &full).expect("delete");
        assert!(get(&store, ProtocolDataType::LiquidToken, "osmosis-1_ibc/A")
            .expect("get")
            .is_none());
        assert!(split_key(&[0x01, 3]).is_err());
        assert!(split_key(&[0x00, 99]).is_err());
    }
}
