//! Stateless proof checks. Nothing here touches a ledger.

use charter_crypto::{compute_root, path_is_well_formed, ChainError, HashChainVerifier};
use charter_types::{HashChainProof, InclusionProof, MerkleProof};

use crate::error::{ProofError, ProofResult};

/// Check a Merkle inclusion proof against the root it names.
///
/// A path whose shape cannot belong to a tree of `tree_size` leaves is
/// [`ProofError::MalformedPath`]; a well-formed path that folds to a
/// different root is [`ProofError::RootMismatch`].
pub fn verify_merkle_proof(proof: &MerkleProof) -> ProofResult<()> {
    if proof.tree_size == 0 {
        return Err(ProofError::MalformedPath("tree_size is zero".into()));
    }
    if proof.event_sequence == 0 || proof.event_sequence > proof.checkpoint_sequence {
        return Err(ProofError::MalformedPath(format!(
            "event {} is outside checkpoint 1..={}",
            proof.event_sequence, proof.checkpoint_sequence
        )));
    }
    if !path_is_well_formed(&proof.path, proof.tree_size) {
        return Err(ProofError::MalformedPath(format!(
            "{} steps do not fit a tree of {} leaves",
            proof.path.len(),
            proof.tree_size
        )));
    }

    let computed = compute_root(&proof.event_hash, &proof.path);
    if computed != proof.checkpoint_root {
        return Err(ProofError::RootMismatch {
            expected: proof.checkpoint_root,
            computed,
        });
    }
    Ok(())
}

/// Replay the link invariant across a hash-chain proof.
pub fn verify_hash_chain_proof(proof: &HashChainProof) -> ProofResult<()> {
    let (Some(first), Some(last)) = (proof.chain.first(), proof.chain.last()) else {
        return Err(ProofError::IncompleteChain("proof has no links".into()));
    };
    if first.sequence != proof.from_sequence {
        return Err(ProofError::IncompleteChain(format!(
            "chain starts at {} but proof claims {}",
            first.sequence, proof.from_sequence
        )));
    }
    if last.sequence != proof.to_sequence {
        return Err(ProofError::IncompleteChain(format!(
            "chain ends at {} but proof claims {}",
            last.sequence, proof.to_sequence
        )));
    }

    if let Some(err) = HashChainVerifier::find_breaks(&proof.chain, first.prev_hash)
        .into_iter()
        .next()
    {
        return Err(match err {
            ChainError::BrokenLink {
                sequence,
                expected,
                actual,
            } => ProofError::BrokenLink {
                sequence,
                expected,
                actual,
            },
            ChainError::OutOfOrder { sequence, previous } => ProofError::IncompleteChain(
                format!("sequence {sequence} does not follow {previous}"),
            ),
        });
    }

    if last.content_hash != proof.current_head_hash {
        return Err(ProofError::HeadMismatch {
            expected: proof.current_head_hash,
            actual: last.content_hash,
        });
    }
    Ok(())
}

/// Dispatch on the proof kind.
pub fn verify_inclusion_proof(proof: &InclusionProof) -> ProofResult<()> {
    match proof {
        InclusionProof::Merkle(p) => verify_merkle_proof(p),
        InclusionProof::HashChain(p) => verify_hash_chain_proof(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_crypto::{generate_proof, merkle_root, ContentHasher};
    use charter_types::{ChainLink, EventHash, GENESIS_HASH};
    use proptest::prelude::*;

    fn leaves(n: u64) -> Vec<EventHash> {
        (0..n)
            .map(|i| ContentHasher::EVENT.hash(&i.to_le_bytes()))
            .collect()
    }

    fn merkle_proof(n: u64, index: usize) -> MerkleProof {
        let leaves = leaves(n);
        MerkleProof {
            event_sequence: index as u64 + 1,
            event_hash: leaves[index],
            checkpoint_sequence: n,
            checkpoint_root: merkle_root(&leaves),
            path: generate_proof(&leaves, index).unwrap(),
            tree_size: n,
        }
    }

    fn chain(n: u64) -> HashChainProof {
        let mut links = Vec::new();
        let mut prev = GENESIS_HASH;
        for sequence in 1..=n {
            let content_hash = ContentHasher::EVENT.hash(&sequence.to_le_bytes());
            links.push(ChainLink {
                sequence,
                content_hash,
                prev_hash: prev,
            });
            prev = content_hash;
        }
        HashChainProof {
            from_sequence: 1,
            to_sequence: n,
            current_head_hash: prev,
            chain: links,
        }
    }

    #[test]
    fn valid_merkle_proof_passes() {
        assert!(verify_merkle_proof(&merkle_proof(4, 2)).is_ok());
        assert!(verify_merkle_proof(&merkle_proof(1, 0)).is_ok());
    }

    #[test]
    fn swapped_leaf_is_root_mismatch() {
        let mut proof = merkle_proof(5, 1);
        proof.event_hash = ContentHasher::EVENT.hash(b"forged");
        assert!(matches!(
            verify_merkle_proof(&proof),
            Err(ProofError::RootMismatch { .. })
        ));
    }

    #[test]
    fn truncated_path_is_malformed() {
        let mut proof = merkle_proof(8, 3);
        proof.path.pop();
        assert!(matches!(
            verify_merkle_proof(&proof),
            Err(ProofError::MalformedPath(_))
        ));
    }

    #[test]
    fn misnumbered_levels_are_malformed() {
        let mut proof = merkle_proof(8, 3);
        proof.path[1].level = 5;
        assert!(matches!(
            verify_merkle_proof(&proof),
            Err(ProofError::MalformedPath(_))
        ));
    }

    #[test]
    fn valid_chain_passes() {
        assert!(verify_hash_chain_proof(&chain(6)).is_ok());
    }

    #[test]
    fn empty_chain_is_incomplete() {
        let mut proof = chain(3);
        proof.chain.clear();
        assert!(matches!(
            verify_hash_chain_proof(&proof),
            Err(ProofError::IncompleteChain(_))
        ));
    }

    #[test]
    fn dropped_link_is_broken() {
        let mut proof = chain(5);
        proof.chain.remove(2);
        assert!(matches!(
            verify_hash_chain_proof(&proof),
            Err(ProofError::BrokenLink { sequence: 4, .. })
        ));
    }

    #[test]
    fn stale_head_is_mismatch() {
        let mut proof = chain(3);
        proof.current_head_hash = ContentHasher::EVENT.hash(b"newer head");
        assert!(matches!(
            verify_hash_chain_proof(&proof),
            Err(ProofError::HeadMismatch { .. })
        ));
    }

    #[test]
    fn truncated_tail_is_incomplete() {
        let mut proof = chain(4);
        proof.chain.pop();
        assert!(matches!(
            verify_hash_chain_proof(&proof),
            Err(ProofError::IncompleteChain(_))
        ));
    }

    proptest! {
        #[test]
        fn every_leaf_proves_and_any_flip_fails(n in 1u64..40, pick in 0usize..40, byte in 0usize..32) {
            let index = pick % n as usize;
            let proof = merkle_proof(n, index);
            prop_assert!(verify_merkle_proof(&proof).is_ok());

            let mut bytes = *proof.event_hash.as_bytes();
            bytes[byte] ^= 0x01;
            let mut forged = proof.clone();
            forged.event_hash = EventHash::from_bytes(bytes);
            prop_assert!(verify_merkle_proof(&forged).is_err());
        }
    }
}
