use std::path::PathBuf;

use charter_types::{HASH_ALGORITHM_VERSION, SIGNATURE_ALGORITHM_VERSION};
use serde::{Deserialize, Serialize};

/// Event type prefixes rejected by default. These categories belong to
/// operational telemetry, which the ledger never stores.
pub const DEFAULT_DISALLOWED_PREFIXES: &[&str] =
    &["metric.", "metrics.", "telemetry.", "health.", "uptime.", "ops."];

/// Store configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the journal file.
    pub data_dir: PathBuf,
    pub disallowed_type_prefixes: Vec<String>,
    pub hash_algorithm_version: String,
    pub signature_algorithm_version: String,
    /// `fsync` the journal after every record.
    pub sync_on_write: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".charter"),
            disallowed_type_prefixes: DEFAULT_DISALLOWED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            hash_algorithm_version: HASH_ALGORITHM_VERSION.to_string(),
            signature_algorithm_version: SIGNATURE_ALGORITHM_VERSION.to_string(),
            sync_on_write: true,
        }
    }
}

impl LedgerConfig {
    /// Returns `true` if `event_type` falls in an operational-metric category.
    pub fn is_disallowed(&self, event_type: &str) -> bool {
        self.disallowed_type_prefixes
            .iter()
            .any(|prefix| event_type.starts_with(prefix.as_str()))
    }

    /// Path of the journal file inside `data_dir`.
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("ledger.journal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rejects_metric_namespaces() {
        let config = LedgerConfig::default();
        assert!(config.is_disallowed("metrics.cpu.load"));
        assert!(config.is_disallowed("health.ping"));
        assert!(config.is_disallowed("ops.deploy"));
        assert!(!config.is_disallowed("executive.task.activated"));
        assert!(!config.is_disallowed("operations.review.opened"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"sync_on_write": false}"#).unwrap();
        assert!(!config.sync_on_write);
        assert_eq!(config.hash_algorithm_version, HASH_ALGORITHM_VERSION);
        assert_eq!(config.disallowed_type_prefixes.len(), 6);
    }
}
