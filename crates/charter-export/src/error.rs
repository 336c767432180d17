use charter_ledger::LedgerError;

/// Which personal-data rule an export tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiKind {
    /// An attribution field holds something other than a UUID or `"system"`.
    FreeFormAttribution,
    EmailAddress,
    PersonName,
}

impl std::fmt::Display for PiiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeFormAttribution => f.write_str("free-form attribution"),
            Self::EmailAddress => f.write_str("e-mail address"),
            Self::PersonName => f.write_str("personal name"),
        }
    }
}

/// Errors produced while exporting.
///
/// `PiiDetected` never carries the offending text, only where it was found.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("personal data detected ({kind}) in {field}{}", event_suffix(.sequence))]
    PiiDetected {
        sequence: Option<u64>,
        field: String,
        kind: PiiKind,
    },

    #[error("invalid export configuration: {0}")]
    Config(String),

    #[error("export is incomplete: {0}")]
    PartialExport(String),

    #[error("invalid attestation range: start={start}, end={end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("signing error: {0}")]
    Signing(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<charter_types::TypeError> for ExportError {
    fn from(err: charter_types::TypeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<charter_crypto::SignatureError> for ExportError {
    fn from(err: charter_crypto::SignatureError) -> Self {
        Self::Signing(err.to_string())
    }
}

fn event_suffix(sequence: &Option<u64>) -> String {
    sequence.map(|s| format!(" of event {s}")).unwrap_or_default()
}

/// Result alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
