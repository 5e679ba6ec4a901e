//! Simulation daemon configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use qs_keeper::config::CONFIG_ENV;
use qs_keeper::ModuleConfig;

/// Complete daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimdConfig {
    /// Directory holding the SQLite store. Empty = `./.qs-simd`.
    #[serde(default)]
    pub data_dir: String,
    /// Log level for the `qs` crates: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Wall-clock time between simulated epochs.
    #[serde(default = "default_epoch_interval_ms")]
    pub epoch_interval_ms: u64,
    /// Epochs to run before exiting. 0 = until interrupted.
    #[serde(default = "default_epochs")]
    pub epochs: u64,
    /// JSON genesis file. Empty = built-in example.
    #[serde(default)]
    pub genesis_file: String,
    /// TOML scenario file. Empty = built-in example.
    #[serde(default)]
    pub scenario_file: String,
    #[serde(default)]
    pub keeper: ModuleConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_epoch_interval_ms() -> u64 {
    1000
}

fn default_epochs() -> u64 {
    6
}

impl Default for SimdConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            log_level: default_log_level(),
            epoch_interval_ms: default_epoch_interval_ms(),
            epochs: default_epochs(),
            genesis_file: String::new(),
            scenario_file: String::new(),
            keeper: ModuleConfig::default(),
        }
    }
}

impl SimdConfig {
    /// Load from `path`, or from `$QS_CONFIG` when set.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).map(PathBuf::from).unwrap_or_else(|_| path.to_path_buf());
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: SimdConfig = toml::from_str(&content)?;
        config.keeper.holdings_cap()?;
        Ok(config)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.data_dir.is_empty() {
            PathBuf::from(".qs-simd")
        } else {
            PathBuf::from(&self.data_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimdConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.epochs, 6);
        assert_eq!(config.data_dir(), PathBuf::from(".qs-simd"));
        assert_eq!(config.keeper.epoch_identifier, "epoch");
    }

    #[test]
    fn test_config_serialization() {
        let config = SimdConfig {
            epochs: 0,
            data_dir: "/tmp/qs".into(),
            ..SimdConfig::default()
        };
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: SimdConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_nested_keeper_section() {
        let parsed: SimdConfig = toml::from_str(
            "epochs = 2\n\n[keeper]\nchain_id = \"quicktest-1\"\nepochs_deferred = 1\n",
        )
        .expect("parse");
        assert_eq!(parsed.epochs, 2);
        assert_eq!(parsed.keeper.chain_id, "quicktest-1");
        assert_eq!(parsed.keeper.epochs_deferred, 1);
        assert_eq!(parsed.keeper.bech32_prefix, "quick");
    }
}
