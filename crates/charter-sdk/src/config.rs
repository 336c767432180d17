use std::path::Path;

use charter_export::ExportConfig;
use charter_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Automatic checkpoint cadence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Publish a checkpoint once this many events are pending. `0` disables
    /// automatic checkpoints.
    pub every_events: u64,
}

/// Top-level configuration, usually read from `charter.toml`.
///
/// ```toml
/// [ledger]
/// data_dir = ".charter"
///
/// [export]
/// batch_size = 500
///
/// [checkpoint]
/// every_events = 1000
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharterConfig {
    pub ledger: LedgerConfig,
    pub export: ExportConfig,
    pub checkpoint: CheckpointConfig,
}

impl CharterConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SdkResult<()> {
        self.export
            .validate()
            .map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Read a TOML file. Missing sections and keys take their defaults.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
