//! Offline verification of Charter ledger exports and proofs.
//!
//! Depends only on `charter-types` and `charter-crypto`: everything here runs
//! against exported bytes with no access to, or trust in, the producing
//! system. Four independent checks (hash chain, sequence completeness,
//! Merkle root, state replay) are aggregated into a [`VerificationResult`]
//! that always carries the full issue list.
//!
//! [`VerificationResult`]: charter_types::VerificationResult

pub mod checks;
pub mod engine;
pub mod error;
pub mod reducer;

pub use checks::{
    check_hash_chain, check_merkle, check_sequence_completeness, check_state_replay, CheckOutcome,
};
pub use engine::{
    status_for, verify_complete, verify_complete_with, verify_hash_chain_proof,
    verify_merkle_proof, verify_offline, verify_offline_reader,
};
pub use error::{ReplayError, VerifyError, VerifyResult};
pub use reducer::{EventTallyReducer, StateReducer, TallyState};
