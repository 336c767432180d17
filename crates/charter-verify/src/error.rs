/// Errors that stop verification before any check can run.
///
/// A document that parses always yields a full `VerificationResult`, however
/// broken its contents; these errors only cover input that is not an export
/// at all.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("export document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read export: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure raised by a state reducer while replaying an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("replay failed at sequence {sequence:?}: {reason}")]
pub struct ReplayError {
    pub sequence: Option<u64>,
    pub reason: String,
}

impl ReplayError {
    pub fn at(sequence: u64, reason: impl Into<String>) -> Self {
        Self {
            sequence: Some(sequence),
            reason: reason.into(),
        }
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
