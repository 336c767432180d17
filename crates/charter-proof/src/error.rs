use charter_ledger::LedgerError;
use charter_types::EventHash;

/// Errors from checkpointing, proof construction, and proof checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("no checkpoint covers sequence {0}; it is in the pending interval")]
    CheckpointNotFound(u64),

    #[error("no valid event at sequence {0}")]
    EventNotFound(u64),

    #[error("cannot checkpoint at {requested}: {reason}")]
    InvalidCheckpointSequence { requested: u64, reason: String },

    #[error("rebuilt root {computed} for checkpoint {checkpoint_sequence} differs from recorded {recorded}")]
    InvalidComputedRoot {
        checkpoint_sequence: u64,
        recorded: EventHash,
        computed: EventHash,
    },

    #[error("malformed Merkle path: {0}")]
    MalformedPath(String),

    #[error("Merkle root mismatch: expected {expected}, computed {computed}")]
    RootMismatch {
        expected: EventHash,
        computed: EventHash,
    },

    #[error("incomplete hash chain: {0}")]
    IncompleteChain(String),

    #[error("broken link at sequence {sequence}: expected prev_hash {expected}, found {actual}")]
    BrokenLink {
        sequence: u64,
        expected: EventHash,
        actual: EventHash,
    },

    #[error("chain ends at {actual} but HEAD hash is {expected}")]
    HeadMismatch {
        expected: EventHash,
        actual: EventHash,
    },

    #[error("checkpoint registry lock poisoned")]
    LockPoisoned,
}

/// Result alias for proof operations.
pub type ProofResult<T> = Result<T, ProofError>;
