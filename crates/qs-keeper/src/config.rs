//! Module configuration and params.
//!
//! [`ModuleConfig`] is node-local and read from TOML at startup. [`Params`]
//! is chain state: stored in the module store and carried in genesis.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use qs_rewards::holdings::default_holdings_cap;
use qs_rewards::DistributionProportions;
use qs_types::math::parse_dec;
use qs_types::{Dec, MODULE_NAME};

use crate::{KeeperError, Result};

/// Environment variable overriding the config file path.
pub const CONFIG_ENV: &str = "QS_CONFIG";

/// Node-local keeper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Chain ID of the local chain; claims from it are verified against
    /// the self-consensus root.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Bech32 prefix of local accounts.
    #[serde(default = "default_bech32_prefix")]
    pub bech32_prefix: String,
    #[serde(default = "default_module_name")]
    pub module_name: String,
    #[serde(default = "default_fee_collector_name")]
    pub fee_collector_name: String,
    /// Only this address may remove protocol data.
    #[serde(default = "default_gov_authority")]
    pub gov_authority: String,
    #[serde(default = "default_epoch_identifier")]
    pub epoch_identifier: String,
    /// Epochs below this number snapshot intents instead of paying out.
    #[serde(default = "default_epochs_deferred")]
    pub epochs_deferred: i64,
    /// Share of a qAsset's supply a single user is counted for.
    #[serde(default = "default_holdings_cap_text")]
    pub holdings_cap: String,
    /// TTL for interchain queries; 0 uses the query module default.
    #[serde(default)]
    pub icq_ttl: u64,
}

fn default_chain_id() -> String {
    "quicksilver-2".to_string()
}

fn default_bech32_prefix() -> String {
    "quick".to_string()
}

fn default_module_name() -> String {
    MODULE_NAME.to_string()
}

fn default_fee_collector_name() -> String {
    "fee_collector".to_string()
}

fn default_gov_authority() -> String {
    "quick10d07y265gmmuvt4z0w9aw880jnsr700j3xrh0p".to_string()
}

fn default_epoch_identifier() -> String {
    "epoch".to_string()
}

fn default_epochs_deferred() -> i64 {
    3
}

fn default_holdings_cap_text() -> String {
    default_holdings_cap().to_string()
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            bech32_prefix: default_bech32_prefix(),
            module_name: default_module_name(),
            fee_collector_name: default_fee_collector_name(),
            gov_authority: default_gov_authority(),
            epoch_identifier: default_epoch_identifier(),
            epochs_deferred: default_epochs_deferred(),
            holdings_cap: default_holdings_cap_text(),
            icq_ttl: 0,
        }
    }
}

impl ModuleConfig {
    /// Load from `path`, or from `$QS_CONFIG` when set.
    ///
    /// Falls back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::Io`] if the file cannot be read, or
    /// [`KeeperError::Config`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).map(PathBuf::from).unwrap_or_else(|_| path.to_path_buf());
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// # Errors
    ///
    /// Returns [`KeeperError::Config`] for invalid TOML or an unparseable
    /// holdings cap.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| KeeperError::Config(e.to_string()))?;
        config.holdings_cap()?;
        Ok(config)
    }

    /// Holdings cap as a decimal.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::Config`] unless the cap is in `(0, 1]`.
    pub fn holdings_cap(&self) -> Result<Dec> {
        let cap = parse_dec(&self.holdings_cap)
            .map_err(|e| KeeperError::Config(format!("holdings_cap {:?}: {e}", self.holdings_cap)))?;
        if cap <= Dec::ZERO || cap > Dec::ONE {
            return Err(KeeperError::Config(format!("holdings_cap must be in (0, 1], got {cap}")));
        }
        Ok(cap)
    }
}

/// Module params.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub distribution_proportions: DistributionProportions,
    pub claims_enabled: bool,
}

impl Params {
    /// # Errors
    ///
    /// Returns the proportions' validation error.
    pub fn validate(&self) -> qs_rewards::Result<()> {
        self.distribution_proportions.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModuleConfig::default();
        assert_eq!(config.chain_id, "quicksilver-2");
        assert_eq!(config.module_name, "participationrewards");
        assert_eq!(config.epochs_deferred, 3);
        assert_eq!(config.holdings_cap().expect("cap"), Dec::new(2, 2));
        assert_eq!(config.icq_ttl, 0);
    }

    #[test]
    fn test_config_serialization() {
        let config = ModuleConfig {
            chain_id: "quicktest-1".into(),
            icq_ttl: 600,
            ..ModuleConfig::default()
        };
        let toml_str = toml::to_string(&config).expect("serialize");
        let back = ModuleConfig::from_toml(&toml_str).expect("parse");
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = ModuleConfig::from_toml("chain_id = \"quicktest-1\"\n").expect("parse");
        assert_eq!(config.chain_id, "quicktest-1");
        assert_eq!(config.bech32_prefix, "quick");
        assert_eq!(config.fee_collector_name, "fee_collector");
    }

    #[test]
    fn test_invalid_holdings_cap() {
        assert!(matches!(
            ModuleConfig::from_toml("holdings_cap = \"1.5\"\n"),
            Err(KeeperError::Config(_))
        ));
        assert!(matches!(
            ModuleConfig::from_toml("holdings_cap = \"abc\"\n"),
            Err(KeeperError::Config(_))
        ));
    }

    #[test]
    fn test_params_json_defaults() {
        let params: Params = serde_json::from_str(r#"{"claims_enabled": true}"#).expect("params");
        assert!(params.claims_enabled);
        assert_eq!(params.distribution_proportions, DistributionProportions::default());
        params.validate().expect("valid");
    }
}
