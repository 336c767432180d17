use charter_types::Event;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("ledger is halted: {0}")]
    Halted(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("key file error: {0}")]
    Keys(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] charter_ledger::LedgerError),

    #[error("proof error: {0}")]
    Proof(#[from] charter_proof::ProofError),

    #[error("export error: {0}")]
    Export(#[from] charter_export::ExportError),

    #[error("verification error: {0}")]
    Verify(#[from] charter_verify::VerifyError),

    /// The event is committed; only the cadence checkpoint after it failed.
    #[error("event #{seq} appended but automatic checkpoint failed: {source}", seq = .event.sequence)]
    CheckpointAfterAppend {
        event: Box<Event>,
        source: Box<SdkError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SdkError {
    /// The event that was durably written before this error, if any.
    pub fn committed_event(&self) -> Option<&Event> {
        match self {
            SdkError::CheckpointAfterAppend { event, .. } => Some(event),
            _ => None,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
