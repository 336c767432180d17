//! High-level SDK for the Charter ledger.
//!
//! [`LedgerContext`] is the single entry point for applications: it owns one
//! store, its checkpoint registry, and its exporter, and applies the halt
//! check to every write. Contexts are built explicitly with
//! [`ContextBuilder`]; nothing here is global.

pub mod config;
pub mod context;
pub mod error;
pub mod halt;
pub mod keys;
pub mod store;

pub use config::{CharterConfig, CheckpointConfig};
pub use context::{ContextBuilder, LedgerContext};
pub use error::{SdkError, SdkResult};
pub use halt::{HaltChecker, HaltSwitch, NeverHalted};
pub use keys::{KeyFile, KEY_FILE};
pub use store::{CheckpointFile, CHECKPOINT_FILE};

// Re-export key types
pub use charter_ledger::{EventQuery, LedgerStats, StoredEvent, TimeAuthority};
pub use charter_types::{
    AnchorType, AttestationMetadata, Checkpoint, Event, EventDraft, InclusionProof, LedgerExport, Payload,
    VerificationResult, VerificationStatus,
};
