use serde::{Deserialize, Serialize};

use crate::hash::EventHash;

/// Side a sibling hash sits on relative to the running node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One step of a Merkle inclusion path, from leaf towards root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Tree level of the running node (0 = leaves).
    pub level: u32,
    /// Side of `sibling_hash`.
    pub position: Side,
    pub sibling_hash: EventHash,
}

/// Inclusion proof for a checkpointed event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub event_sequence: u64,
    pub event_hash: EventHash,
    pub checkpoint_sequence: u64,
    pub checkpoint_root: EventHash,
    pub path: Vec<ProofStep>,
    pub tree_size: u64,
}

/// A single link of a hash chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub sequence: u64,
    pub content_hash: EventHash,
    pub prev_hash: EventHash,
}

/// Linear proof for the pending (not yet checkpointed) tail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChainProof {
    pub from_sequence: u64,
    pub to_sequence: u64,
    pub chain: Vec<ChainLink>,
    pub current_head_hash: EventHash,
}

impl HashChainProof {
    /// Number of links in the proof.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if the proof contains no links.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Either kind of inclusion proof, depending on whether the event has been
/// checkpointed yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "proof_type", content = "proof", rename_all = "snake_case")]
pub enum InclusionProof {
    Merkle(MerkleProof),
    HashChain(HashChainProof),
}

impl InclusionProof {
    /// The sequence this proof is about.
    pub fn event_sequence(&self) -> u64 {
        match self {
            Self::Merkle(p) => p.event_sequence,
            Self::HashChain(p) => p.from_sequence,
        }
    }
}
