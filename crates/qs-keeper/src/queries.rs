//! Params and protocol data queries.

use qs_protocoldata::{store, ProtocolDataType};
use qs_store::KvStore;

use crate::{Keeper, Params, Result};

impl<S: KvStore> Keeper<S> {
    /// # Errors
    ///
    /// See [`Keeper::params`].
    pub fn query_params(&self) -> Result<Params> {
        self.params()
    }

    /// Payloads of every record of `type_name` whose key starts with
    /// `key_prefix`, in key order. An empty prefix returns the whole type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KeeperError::ProtocolData`] for an unknown type
    /// name or an unreadable record.
    pub fn query_protocol_data(&self, type_name: &str, key_prefix: &str) -> Result<Vec<serde_json::Value>> {
        let data_type = ProtocolDataType::from_name(type_name)?;
        let found = store::prefixed(&self.store, data_type, key_prefix)?;
        Ok(found.into_iter().map(|pd| pd.data).collect())
    }
}
