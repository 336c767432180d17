//! Foundation types for the Charter ledger.
//!
//! Every other Charter crate depends on `charter-types`. The verification
//! engine depends on nothing else, so every shape an external auditor needs
//! (events, checkpoints, proofs, exports, results) lives here.
//!
//! # Key Types
//!
//! - [`Event`]: immutable, hash-chained ledger entry
//! - [`EventHash`]: BLAKE3 digest, hex-encoded everywhere; [`GENESIS_HASH`] is all zeros
//! - [`Checkpoint`]: Merkle-rooted snapshot of a ledger prefix
//! - [`MerkleProof`] / [`HashChainProof`]: inclusion proofs
//! - [`LedgerExport`]: complete export document
//! - [`VerificationResult`]: structured outcome of offline verification

pub mod checkpoint;
pub mod error;
pub mod event;
pub mod export;
pub mod hash;
pub mod proof;
pub mod verification;

pub use checkpoint::{AnchorType, Checkpoint};
pub use error::TypeError;
pub use event::{
    is_valid_attribution, validate_event_type, CanonicalContent, Event, EventDraft, Payload, HASH_ALGORITHM_VERSION,
    SIGNATURE_ALGORITHM_VERSION, SYSTEM_AGENT,
};
pub use export::{
    AttestationMetadata, ExportMetadata, ExportVerification, LedgerExport, SequenceRange,
    EXPORT_FORMAT_VERSION,
};
pub use hash::{EventHash, GENESIS_HASH, GENESIS_HASH_HEX};
pub use proof::{ChainLink, HashChainProof, InclusionProof, MerkleProof, ProofStep, Side};
pub use verification::{DetectedIssue, IssueKind, VerificationResult, VerificationStatus};
