//! Governance additions and removals of protocol data.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use qs_protocoldata::store;
use qs_protocoldata::{ProtocolData, ProtocolDataType, ProtocolDataValue};
use qs_store::KvStore;
use qs_types::validation::UNDEFINED_ATTRIBUTE;
use qs_types::{FieldErrors, MsgGovRemoveProtocolData};

use crate::{Keeper, KeeperError, Result};

/// Injects or replaces a protocol data record by governance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddProtocolDataProposal {
    pub title: String,
    pub description: String,
    /// Full or short protocol data type name.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Natural key. When set it must match the key derived from `data`.
    #[serde(default)]
    pub key: String,
    pub data: serde_json::Value,
}

impl AddProtocolDataProposal {
    /// Resolve and validate the payload, returning it with its store key.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::Validation`] listing missing fields, a payload
    /// that fails its type's validation, or a mismatched key.
    pub fn validate_basic(&self) -> Result<(ProtocolDataValue, String)> {
        let mut errs = FieldErrors::new();
        if self.title.is_empty() {
            errs.insert("Title", UNDEFINED_ATTRIBUTE);
        }
        if self.description.is_empty() {
            errs.insert("Description", UNDEFINED_ATTRIBUTE);
        }
        let value = match ProtocolDataType::from_name(&self.data_type)
            .and_then(|t| ProtocolDataValue::decode(t, &self.data))
        {
            Ok(value) => value,
            Err(e) => {
                errs.insert("Data", e);
                return Err(errs.into());
            }
        };
        if let Err(data_errs) = value.validate_basic() {
            errs.nest("Data", data_errs);
        }
        let key = value.generate_key();
        if !self.key.is_empty() && self.key != key {
            errs.insert("Key", format!("expected {key:?}, got {:?}", self.key));
        }
        errs.into_result()?;
        Ok((value, key))
    }
}

impl<S: KvStore> Keeper<S> {
    /// Store the proposal's record under its natural key, replacing any
    /// existing record.
    ///
    /// # Errors
    ///
    /// See [`AddProtocolDataProposal::validate_basic`]; store errors.
    pub fn add_protocol_data(&mut self, proposal: &AddProtocolDataProposal) -> Result<String> {
        let (value, key) = proposal.validate_basic()?;
        let data = ProtocolData::new(value.data_type(), proposal.data.clone());
        store::set(&mut self.store, &key, &data)?;
        tracing::info!(
            data_type = %data.data_type,
            %key,
            title = %proposal.title,
            "protocol data added by governance"
        );
        Ok(key)
    }

    /// Delete the record named by `msg.key`.
    ///
    /// # Errors
    ///
    /// - [`KeeperError::InvalidAuthority`] unless sent by the configured
    ///   governance authority
    /// - [`KeeperError::InvalidKeyEncoding`] for a key that is not base64
    /// - [`KeeperError::ProtocolData`] for a key outside the protocol data
    ///   namespace
    pub fn gov_remove_protocol_data(&mut self, msg: &MsgGovRemoveProtocolData) -> Result<()> {
        if msg.authority != self.config.gov_authority {
            return Err(KeeperError::InvalidAuthority {
                expected: self.config.gov_authority.clone(),
                got: msg.authority.clone(),
            });
        }
        msg.validate_basic()?;
        let full_key = STANDARD.decode(&msg.key)?;
        let (data_type, key) = store::split_key(&full_key)?;
        store::delete_raw(&mut self.store, &full_key)?;
        tracing::info!(%data_type, %key, title = %msg.title, "protocol data removed by governance");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use qs_protocoldata::records::ConnectionProtocolData;
    use qs_store::MemStore;
    use serde_json::json;

    use super::*;
    use crate::ModuleConfig;

    fn keeper() -> Keeper<MemStore> {
        Keeper::new(MemStore::new(), ModuleConfig::default())
    }

    fn connection_proposal() -> AddProtocolDataProposal {
        AddProtocolDataProposal {
            title: "Add osmosis connection".into(),
            description: "bootstrap".into(),
            data_type: "ProtocolDataTypeConnection".into(),
            key: String::new(),
            data: json!({
                "ConnectionID": "connection-2",
                "ChainID": "osmosis-1",
                "LastEpoch": 0,
                "Prefix": "osmo",
                "TransferChannel": "channel-2"
            }),
        }
    }

    fn remove_msg(keeper: &Keeper<MemStore>, full_key: &[u8]) -> MsgGovRemoveProtocolData {
        MsgGovRemoveProtocolData {
            title: "remove".into(),
            description: "stale".into(),
            key: STANDARD.encode(full_key),
            authority: keeper.config().gov_authority.clone(),
        }
    }

    #[test]
    fn test_add_protocol_data() {
        let mut k = keeper();
        let key = k.add_protocol_data(&connection_proposal()).expect("add");
        assert_eq!(key, "osmosis-1");
        let record = store::get_record::<ConnectionProtocolData>(k.store(), "osmosis-1")
            .expect("get")
            .expect("present");
        assert_eq!(record.connection_id, "connection-2");
    }

    #[test]
    fn test_short_type_name_accepted() {
        let mut k = keeper();
        let mut proposal = connection_proposal();
        proposal.data_type = "Connection".into();
        proposal.key = "osmosis-1".into();
        assert_eq!(k.add_protocol_data(&proposal).expect("add"), "osmosis-1");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut proposal = connection_proposal();
        proposal.data_type = "ProtocolDataTypeNope".into();
        let Err(KeeperError::Validation(errs)) = proposal.validate_basic() else {
            unreachable!("expected validation error")
        };
        assert!(errs.contains("Data"));
    }

    #[test]
    fn test_invalid_payload_and_key_reported_together() {
        let mut proposal = connection_proposal();
        proposal.title.clear();
        proposal.key = "juno-1".into();
        proposal.data["ConnectionID"] = json!("");
        let Err(KeeperError::Validation(errs)) = proposal.validate_basic() else {
            unreachable!("expected validation error")
        };
        assert!(errs.contains("Title"));
        assert!(errs.contains("Key"));
        assert!(errs.len() >= 3);
    }

    #[test]
    fn test_remove_protocol_data() {
        let mut k = keeper();
        k.add_protocol_data(&connection_proposal()).expect("add");
        let full_key = store::protocol_data_key(ProtocolDataType::Connection, "osmosis-1");
        let msg = remove_msg(&k, &full_key);
        k.gov_remove_protocol_data(&msg).expect("remove");
        assert!(store::get(k.store(), ProtocolDataType::Connection, "osmosis-1")
            .expect("get")
            .is_none());
    }

    #[test]
    fn test_remove_requires_authority() {
        let mut k = keeper();
        let full_key = store::protocol_data_key(ProtocolDataType::Connection, "osmosis-1");
        let mut msg = remove_msg(&k, &full_key);
        msg.authority = "quick1jc24kwznud9m3mwqmcz3xw33ndjuufngu5m0y6".into();
        let err = k.gov_remove_protocol_data(&msg).expect_err("authority");
        assert!(err.to_string().starts_with("invalid authority: expected quick10d07y"));
    }

    #[test]
    fn test_remove_rejects_bad_keys() {
        let mut k = keeper();
        let mut msg = remove_msg(&k, b"x");
        msg.key = "not base64!".into();
        assert!(matches!(
            k.gov_remove_protocol_data(&msg),
            Err(KeeperError::InvalidKeyEncoding(_))
        ));

        let msg = remove_msg(&k, &[0x01, 0x02]);
        assert!(matches!(
            k.gov_remove_protocol_data(&msg),
            Err(KeeperError::ProtocolData(_))
        ));
    }
}
