use serde::{Deserialize, Serialize};

use charter_types::EXPORT_FORMAT_VERSION;

use crate::error::{ExportError, ExportResult};

/// Export settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Sequences read per stream batch. Must be at least 1.
    pub batch_size: usize,
    pub format_version: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            format_version: EXPORT_FORMAT_VERSION.to_string(),
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> ExportResult<()> {
        if self.batch_size == 0 {
            return Err(ExportError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(ExportConfig::default().validate().is_ok());
        let config = ExportConfig {
            batch_size: 0,
            ..ExportConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExportError::Config(_))));
        let config = ExportConfig {
            batch_size: usize::MAX,
            ..ExportConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
