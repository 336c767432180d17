use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use charter_crypto::MerkleTree;
use charter_ledger::{LedgerReader, TimeAuthority};
use charter_types::{
    AnchorType, ChainLink, Checkpoint, Event, EventHash, HashChainProof, InclusionProof,
    MerkleProof,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ProofError, ProofResult};

/// Publishes Merkle checkpoints over ledger prefixes and builds inclusion
/// proofs against them.
///
/// Checkpoints are kept in ascending `event_sequence` order. Each one is
/// computed from the fixed prefix `1..=up_to`, so appends racing with
/// checkpoint creation never change its leaves.
pub struct CheckpointService {
    ledger: Arc<dyn LedgerReader>,
    authority: Arc<dyn TimeAuthority>,
    checkpoints: RwLock<Vec<Checkpoint>>,
}

impl CheckpointService {
    pub fn new(ledger: Arc<dyn LedgerReader>, authority: Arc<dyn TimeAuthority>) -> Self {
        Self::with_checkpoints(ledger, authority, Vec::new())
    }

    /// Resume with previously published checkpoints.
    pub fn with_checkpoints(
        ledger: Arc<dyn LedgerReader>,
        authority: Arc<dyn TimeAuthority>,
        mut checkpoints: Vec<Checkpoint>,
    ) -> Self {
        checkpoints.sort_by_key(|c| c.event_sequence);
        Self {
            ledger,
            authority,
            checkpoints: RwLock::new(checkpoints),
        }
    }

    fn read(&self) -> ProofResult<RwLockReadGuard<'_, Vec<Checkpoint>>> {
        self.checkpoints.read().map_err(|_| ProofError::LockPoisoned)
    }

    fn write(&self) -> ProofResult<RwLockWriteGuard<'_, Vec<Checkpoint>>> {
        self.checkpoints.write().map_err(|_| ProofError::LockPoisoned)
    }

    /// Publish a checkpoint over `1..=up_to_sequence`, awaiting external
    /// anchoring.
    pub fn create_checkpoint(&self, up_to_sequence: u64) -> ProofResult<Checkpoint> {
        self.create_anchored_checkpoint(up_to_sequence, AnchorType::Pending)
    }

    pub fn create_anchored_checkpoint(
        &self,
        up_to_sequence: u64,
        anchor_type: AnchorType,
    ) -> ProofResult<Checkpoint> {
        let mut checkpoints = self.write()?;
        let invalid = |reason: String| ProofError::InvalidCheckpointSequence {
            requested: up_to_sequence,
            reason,
        };

        let (head, prefix) = self.ledger.valid_prefix(up_to_sequence)?;
        if up_to_sequence == 0 || up_to_sequence > head {
            return Err(invalid(format!("must lie in 1..={head}")));
        }
        if let Some(last) = checkpoints.last() {
            if up_to_sequence <= last.event_sequence {
                return Err(invalid(format!(
                    "latest checkpoint already covers 1..={}",
                    last.event_sequence
                )));
            }
        }

        let leaves: Vec<EventHash> = prefix.iter().map(|e| e.content_hash).collect();
        if leaves.is_empty() {
            return Err(invalid("no valid events in range".into()));
        }
        let tree = MerkleTree::from_leaves(leaves);

        let checkpoint = Checkpoint {
            checkpoint_id: Uuid::now_v7(),
            event_sequence: up_to_sequence,
            anchor_hash: tree.root(),
            anchor_type,
            timestamp: self.authority.now(),
            leaf_count: tree.leaf_count() as u64,
        };
        checkpoints.push(checkpoint.clone());

        info!(
            event_sequence = up_to_sequence,
            leaves = checkpoint.leaf_count,
            root = %checkpoint.anchor_hash.short_hex(),
            anchor = %anchor_type,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Smallest checkpoint whose prefix includes `sequence`. `None` means the
    /// sequence is in the pending interval.
    pub fn get_checkpoint_for_sequence(&self, sequence: u64) -> ProofResult<Option<Checkpoint>> {
        Ok(self.read()?.iter().find(|c| c.covers(sequence)).cloned())
    }

    pub fn list_checkpoints(&self) -> ProofResult<Vec<Checkpoint>> {
        Ok(self.read()?.clone())
    }

    pub fn latest_checkpoint(&self) -> ProofResult<Option<Checkpoint>> {
        Ok(self.read()?.last().cloned())
    }

    /// Sequences appended since the latest checkpoint.
    pub fn pending_count(&self) -> ProofResult<u64> {
        let covered = self.latest_checkpoint()?.map_or(0, |c| c.event_sequence);
        Ok(self.ledger.head()?.saturating_sub(covered))
    }

    pub fn build_merkle_proof(&self, sequence: u64) -> ProofResult<MerkleProof> {
        let event = self
            .ledger
            .get_by_sequence(sequence, false)?
            .ok_or(ProofError::EventNotFound(sequence))?
            .into_event();
        let checkpoint = self
            .get_checkpoint_for_sequence(sequence)?
            .ok_or(ProofError::CheckpointNotFound(sequence))?;

        let events = self.ledger.read_events(1, checkpoint.event_sequence)?;
        let index = events
            .iter()
            .position(|e| e.sequence == sequence)
            .ok_or(ProofError::EventNotFound(sequence))?;
        let tree = MerkleTree::from_leaves(events.iter().map(|e| e.content_hash).collect());

        if tree.root() != checkpoint.anchor_hash {
            return Err(ProofError::InvalidComputedRoot {
                checkpoint_sequence: checkpoint.event_sequence,
                recorded: checkpoint.anchor_hash,
                computed: tree.root(),
            });
        }

        let path = tree
            .proof(index)
            .ok_or(ProofError::EventNotFound(sequence))?;
        debug!(sequence, checkpoint = checkpoint.event_sequence, steps = path.len(), "merkle proof built");

        Ok(MerkleProof {
            event_sequence: sequence,
            event_hash: event.content_hash,
            checkpoint_sequence: checkpoint.event_sequence,
            checkpoint_root: checkpoint.anchor_hash,
            path,
            tree_size: tree.leaf_count() as u64,
        })
    }

    /// Every valid link from `from_sequence` through HEAD.
    pub fn build_hash_chain_proof(&self, from_sequence: u64) -> ProofResult<HashChainProof> {
        let head = self.ledger.head()?;
        if from_sequence == 0 || from_sequence > head {
            return Err(ProofError::EventNotFound(from_sequence));
        }
        if self.ledger.get_by_sequence(from_sequence, false)?.is_none() {
            return Err(ProofError::EventNotFound(from_sequence));
        }

        let chain: Vec<ChainLink> = self
            .ledger
            .read_events(from_sequence, head)?
            .iter()
            .map(link)
            .collect();
        let current_head_hash = chain.last().map_or(EventHash::genesis(), |l| l.content_hash);
        debug!(from_sequence, to_sequence = head, links = chain.len(), "hash chain proof built");

        Ok(HashChainProof {
            from_sequence,
            to_sequence: head,
            chain,
            current_head_hash,
        })
    }

    /// Merkle proof when a checkpoint covers `sequence`, hash-chain proof
    /// otherwise.
    pub fn prove_inclusion(&self, sequence: u64) -> ProofResult<InclusionProof> {
        match self.get_checkpoint_for_sequence(sequence)? {
            Some(_) => self.build_merkle_proof(sequence).map(InclusionProof::Merkle),
            None => self
                .build_hash_chain_proof(sequence)
                .map(InclusionProof::HashChain),
        }
    }
}

fn link(event: &Event) -> ChainLink {
    ChainLink {
        sequence: event.sequence,
        content_hash: event.content_hash,
        prev_hash: event.prev_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{verify_hash_chain_proof, verify_inclusion_proof, verify_merkle_proof};
    use charter_ledger::{
        EventSealer, EventSigner, FixedTimeAuthority, InMemoryLedger, LedgerConfig, LedgerWriter,
        RollbackControl, SystemTimeAuthority,
    };
    use charter_types::{EventDraft, Payload};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ledger_with(n: u64) -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new(EventSealer::new(
            LedgerConfig::default(),
            EventSigner::ephemeral(),
            Arc::new(SystemTimeAuthority),
        )));
        append(&ledger, n);
        ledger
    }

    fn append(ledger: &InMemoryLedger, n: u64) {
        for i in 0..n {
            let mut payload = Payload::new();
            payload.insert("i".into(), json!(i));
            ledger
                .append(EventDraft::system("judicial.ruling.issued", payload))
                .unwrap();
        }
    }

    fn service(ledger: &Arc<InMemoryLedger>) -> CheckpointService {
        let authority = FixedTimeAuthority::new(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
        CheckpointService::new(ledger.clone(), Arc::new(authority))
    }

    #[test]
    fn checkpoint_racing_rollback_is_consistent() {
        for _ in 0..25 {
            let ledger = ledger_with(40);
            let full: Vec<EventHash> = ledger
                .read_events(1, 40)
                .unwrap()
                .iter()
                .map(|e| e.content_hash)
                .collect();
            let service = service(&ledger);

            let result = std::thread::scope(|scope| {
                let rolled = scope.spawn(|| ledger.rollback_to(20).unwrap());
                let result = service.create_checkpoint(40);
                rolled.join().unwrap();
                result
            });

            match result {
                Ok(checkpoint) => {
                    assert_eq!(checkpoint.leaf_count, 40);
                    assert_eq!(checkpoint.anchor_hash, charter_crypto::merkle_root(&full));
                }
                Err(err) => assert!(
                    matches!(err, ProofError::InvalidCheckpointSequence { requested: 40, .. }),
                    "{err}"
                ),
            }
        }
    }

    #[test]
    fn checkpoint_then_prove_every_covered_event() {
        let ledger = ledger_with(4);
        let service = service(&ledger);
        let cp = service.create_checkpoint(4).unwrap();
        assert_eq!(cp.anchor_type, AnchorType::Pending);
        assert_eq!(cp.leaf_count, 4);

        for seq in 1..=4 {
            let proof = service.build_merkle_proof(seq).unwrap();
            assert_eq!(proof.checkpoint_root, cp.anchor_hash);
            assert_eq!(proof.tree_size, 4);
            verify_merkle_proof(&proof).unwrap();
        }

        let proof = service.build_merkle_proof(3).unwrap();
        assert_eq!(proof.path.len(), 2);
    }

    #[test]
    fn odd_sized_checkpoint_proves() {
        let ledger = ledger_with(7);
        let service = service(&ledger);
        service.create_checkpoint(7).unwrap();
        for seq in 1..=7 {
            verify_merkle_proof(&service.build_merkle_proof(seq).unwrap()).unwrap();
        }
    }

    #[test]
    fn checkpoint_ignores_later_appends() {
        let ledger = ledger_with(5);
        let service = service(&ledger);
        let cp = service.create_checkpoint(3).unwrap();
        append(&ledger, 4);
        let proof = service.build_merkle_proof(2).unwrap();
        assert_eq!(proof.checkpoint_root, cp.anchor_hash);
        assert_eq!(proof.tree_size, 3);
    }

    #[test]
    fn smallest_covering_checkpoint_wins() {
        let ledger = ledger_with(10);
        let service = service(&ledger);
        service.create_checkpoint(4).unwrap();
        service
            .create_anchored_checkpoint(8, AnchorType::ExternallyTimestamped)
            .unwrap();

        assert_eq!(
            service.get_checkpoint_for_sequence(3).unwrap().unwrap().event_sequence,
            4
        );
        assert_eq!(
            service.get_checkpoint_for_sequence(6).unwrap().unwrap().event_sequence,
            8
        );
        assert!(service.get_checkpoint_for_sequence(9).unwrap().is_none());
        assert_eq!(service.list_checkpoints().unwrap().len(), 2);
        assert_eq!(service.latest_checkpoint().unwrap().unwrap().event_sequence, 8);
        assert_eq!(service.pending_count().unwrap(), 2);
    }

    #[test]
    fn checkpoint_bounds_are_enforced() {
        let ledger = ledger_with(5);
        let service = service(&ledger);
        assert!(matches!(
            service.create_checkpoint(0),
            Err(ProofError::InvalidCheckpointSequence { .. })
        ));
        assert!(matches!(
            service.create_checkpoint(6),
            Err(ProofError::InvalidCheckpointSequence { .. })
        ));
        service.create_checkpoint(3).unwrap();
        assert!(matches!(
            service.create_checkpoint(3),
            Err(ProofError::InvalidCheckpointSequence { .. })
        ));
    }

    #[test]
    fn pending_sequence_has_no_merkle_proof() {
        let ledger = ledger_with(6);
        let service = service(&ledger);
        service.create_checkpoint(4).unwrap();
        assert!(matches!(
            service.build_merkle_proof(5),
            Err(ProofError::CheckpointNotFound(5))
        ));
        assert!(matches!(
            service.build_merkle_proof(40),
            Err(ProofError::EventNotFound(40))
        ));
    }

    #[test]
    fn hash_chain_proof_covers_tail_to_head() {
        let ledger = ledger_with(6);
        let service = service(&ledger);
        let proof = service.build_hash_chain_proof(4).unwrap();
        assert_eq!(proof.from_sequence, 4);
        assert_eq!(proof.to_sequence, 6);
        assert_eq!(proof.len(), 3);
        assert_eq!(
            proof.current_head_hash,
            ledger.get_latest().unwrap().unwrap().content_hash
        );
        verify_hash_chain_proof(&proof).unwrap();
    }

    #[test]
    fn hash_chain_proof_spans_rollback_gap() {
        let ledger = ledger_with(5);
        ledger.rollback_to(3).unwrap();
        append(&ledger, 2);
        let service = service(&ledger);
        let proof = service.build_hash_chain_proof(2).unwrap();
        let sequences: Vec<u64> = proof.chain.iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![2, 3, 6, 7]);
        verify_hash_chain_proof(&proof).unwrap();
    }

    #[test]
    fn prove_inclusion_picks_proof_kind() {
        let ledger = ledger_with(6);
        let service = service(&ledger);
        service.create_checkpoint(4).unwrap();

        let covered = service.prove_inclusion(2).unwrap();
        assert!(matches!(covered, InclusionProof::Merkle(_)));
        verify_inclusion_proof(&covered).unwrap();

        let pending = service.prove_inclusion(5).unwrap();
        assert!(matches!(pending, InclusionProof::HashChain(_)));
        verify_inclusion_proof(&pending).unwrap();
    }

    #[test]
    fn rollback_below_checkpoint_invalidates_its_root() {
        let ledger = ledger_with(6);
        let service = service(&ledger);
        service.create_checkpoint(6).unwrap();
        ledger.rollback_to(4).unwrap();
        append(&ledger, 3);
        assert!(matches!(
            service.build_merkle_proof(2),
            Err(ProofError::InvalidComputedRoot { .. })
        ));
    }
}
