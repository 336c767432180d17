//! Cryptographic primitives for the Charter ledger.
//!
//! Provides domain-separated BLAKE3 hashing, binary Merkle trees with
//! inclusion paths, hash chain link verification, and Ed25519
//! signing/verification.
//!
//! All crypto operations wrap established libraries.

pub mod chain;
pub mod hasher;
pub mod merkle;
pub mod signer;

pub use chain::{ChainError, Chained, HashChainVerifier};
pub use hasher::{content_hash, ContentHasher, HasherError};
pub use merkle::{
    compute_root, generate_proof, merkle_root, path_is_well_formed, tree_height, verify_path,
    MerkleTree,
};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
