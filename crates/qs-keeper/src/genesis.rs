//! Genesis import and export.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use qs_protocoldata::{store, ProtocolData};
use qs_store::KvStore;

use crate::{Keeper, KeeperError, Params, Result};

/// A protocol data record with its natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedProtocolData {
    pub key: String,
    pub protocol_data: ProtocolData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub params: Params,
    pub protocol_data: Vec<KeyedProtocolData>,
}

impl GenesisState {
    /// Read a JSON genesis file.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::Io`] or [`KeeperError::Json`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// # Errors
    ///
    /// Returns [`KeeperError::Genesis`] for invalid params, an invalid or
    /// duplicated record, or a key that does not match its record.
    pub fn validate(&self) -> Result<()> {
        self.params
            .validate()
            .map_err(|e| KeeperError::Genesis(format!("params: {e}")))?;
        let mut seen = BTreeSet::new();
        for (i, kpd) in self.protocol_data.iter().enumerate() {
            let value = kpd
                .protocol_data
                .decode()
                .map_err(|e| KeeperError::Genesis(format!("protocol data [{i}]: {e}")))?;
            if let Err(errs) = value.validate_basic() {
                return Err(KeeperError::Genesis(format!("protocol data [{i}]: {errs}")));
            }
            let expected = value.generate_key();
            if kpd.key != expected {
                return Err(KeeperError::Genesis(format!(
                    "protocol data [{i}]: key {:?} does not match {expected:?}",
                    kpd.key
                )));
            }
            if !seen.insert((kpd.protocol_data.data_type, expected)) {
                return Err(KeeperError::Genesis(format!(
                    "protocol data [{i}]: duplicate {} {:?}",
                    kpd.protocol_data.data_type, kpd.key
                )));
            }
        }
        Ok(())
    }
}

impl<S: KvStore> Keeper<S> {
    /// # Errors
    ///
    /// See [`GenesisState::validate`]; store errors.
    pub fn init_genesis(&mut self, genesis: &GenesisState) -> Result<()> {
        genesis.validate()?;
        self.set_params(&genesis.params)?;
        for kpd in &genesis.protocol_data {
            store::set(&mut self.store, &kpd.key, &kpd.protocol_data)?;
        }
        tracing::info!(records = genesis.protocol_data.len(), "genesis imported");
        Ok(())
    }

    /// Params and every protocol data record, in store key order.
    ///
    /// # Errors
    ///
    /// Returns store or JSON errors.
    pub fn export_genesis(&self) -> Result<GenesisState> {
        let mut protocol_data = Vec::new();
        store::iterate_all(&self.store, |full, pd| {
            let (_, key) = store::split_key(full)?;
            protocol_data.push(KeyedProtocolData {
                key,
                protocol_data: pd.clone(),
            });
            Ok(false)
        })?;
        Ok(GenesisState {
            params: self.params()?,
            protocol_data,
        })
    }
}
