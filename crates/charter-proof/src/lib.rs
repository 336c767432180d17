//! Checkpoints and inclusion proofs.
//!
//! Events covered by a checkpoint are proven with a logarithmic Merkle path
//! against the checkpoint root. Events in the pending interval after the
//! latest checkpoint are proven with a linear hash chain running to HEAD.
//! The `check` module verifies either kind without access to a ledger.

pub mod check;
pub mod error;
pub mod service;

pub use check::{verify_hash_chain_proof, verify_inclusion_proof, verify_merkle_proof};
pub use error::{ProofError, ProofResult};
pub use service::CheckpointService;
