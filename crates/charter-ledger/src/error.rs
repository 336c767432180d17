use charter_types::EventHash;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("event type {0:?} is an operational metric; the ledger only accepts constitutional events")]
    DisallowedEventType(String),

    #[error("invalid event type {event_type:?}: {reason}")]
    InvalidEventType { event_type: String, reason: String },

    #[error("invalid attribution {0:?}: expected a UUID or \"system\"")]
    InvalidAttribution(String),

    #[error("invalid sequence range: start={start}, end={end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("event not found at sequence {0}")]
    NotFound(u64),

    #[error("cannot move HEAD to {target}: {reason}")]
    InvalidHead { target: u64, reason: String },

    #[error("cannot orphan {start}..={end}: valid event {valid_above} lies above the range")]
    OrphanRangeNotTail { start: u64, end: u64, valid_above: u64 },

    #[error("integrity violation at sequence {sequence}: {reason}")]
    IntegrityViolation { sequence: u64, reason: String },

    #[error("content hash mismatch at sequence {sequence}: stored {stored}, computed {computed}")]
    HashMismatch {
        sequence: u64,
        stored: EventHash,
        computed: EventHash,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<charter_crypto::HasherError> for LedgerError {
    fn from(err: charter_crypto::HasherError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<charter_crypto::SignatureError> for LedgerError {
    fn from(err: charter_crypto::SignatureError) -> Self {
        Self::Signing(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
