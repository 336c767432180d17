use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use charter_types::{Event, EventDraft, SequenceRange};
use tracing::{debug, info};
use uuid::Uuid;

use crate::authority::SystemTimeAuthority;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::query::EventQuery;
use crate::sealer::EventSealer;
use crate::signer::EventSigner;
use crate::state::LedgerState;
use crate::traits::{LedgerReader, LedgerStats, LedgerWriter, RollbackControl, StoredEvent};

/// In-memory ledger for tests, local demos, and embedding.
///
/// One `RwLock` guards the arena and the index together, so sequence
/// assignment, hash linking, and the HEAD move happen as one unit and readers
/// never observe a half-applied append.
pub struct InMemoryLedger {
    sealer: EventSealer,
    inner: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(sealer: EventSealer) -> Self {
        Self {
            sealer,
            inner: RwLock::new(LedgerState::default()),
        }
    }

    pub fn sealer(&self) -> &EventSealer {
        &self.sealer
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(EventSealer::new(
            LedgerConfig::default(),
            EventSigner::ephemeral(),
            Arc::new(SystemTimeAuthority),
        ))
    }
}

impl LedgerWriter for InMemoryLedger {
    fn append(&self, draft: EventDraft) -> LedgerResult<Event> {
        self.sealer.check_draft(&draft)?;

        let mut state = self.write()?;
        let (sequence, prev_hash) = state.next_position()?;
        let event = self.sealer.seal(draft, sequence, prev_hash)?;
        state.check_append(&event)?;
        state.apply_append(event.clone());

        debug!(
            sequence,
            event_type = %event.event_type,
            hash = %event.content_hash.short_hex(),
            "event appended"
        );
        Ok(event)
    }
}

impl LedgerReader for InMemoryLedger {
    fn get_by_sequence(&self, sequence: u64, include_orphaned: bool) -> LedgerResult<Option<StoredEvent>> {
        Ok(self.read()?.get(sequence, include_orphaned))
    }

    fn get_by_id(&self, event_id: &Uuid, include_orphaned: bool) -> LedgerResult<Option<StoredEvent>> {
        Ok(self.read()?.get_by_id(event_id, include_orphaned))
    }

    fn get_latest(&self) -> LedgerResult<Option<Event>> {
        Ok(self.read()?.latest())
    }

    fn get_max_sequence(&self) -> LedgerResult<u64> {
        Ok(self.read()?.max_sequence())
    }

    fn head(&self) -> LedgerResult<u64> {
        Ok(self.read()?.head())
    }

    fn read_range(&self, start: u64, end: u64, include_orphaned: bool) -> LedgerResult<Vec<StoredEvent>> {
        self.read()?.range(start, end, include_orphaned)
    }

    fn query(&self, query: &EventQuery) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self.read()?.query(query))
    }

    fn authorized_gaps(&self) -> LedgerResult<Vec<SequenceRange>> {
        Ok(self.read()?.gaps())
    }

    fn verify_sequence_continuity(&self, start: u64, end: u64) -> LedgerResult<(bool, Vec<u64>)> {
        self.read()?.continuity(start, end)
    }

    fn stats(&self) -> LedgerResult<LedgerStats> {
        Ok(self.read()?.stats())
    }

    fn valid_prefix(&self, up_to: u64) -> LedgerResult<(u64, Vec<Event>)> {
        Ok(self.read()?.valid_prefix(up_to))
    }
}

impl RollbackControl for InMemoryLedger {
    fn mark_orphaned(&self, start: u64, end: u64) -> LedgerResult<u64> {
        let mut state = self.write()?;
        state.check_orphan(start, end)?;
        let count = state.apply_orphan(start, end);
        info!(start, end, count, "events orphaned");
        Ok(count)
    }

    fn set_head(&self, sequence: u64) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.check_set_head(sequence)?;
        state.apply_set_head(sequence);
        info!(head = sequence, "HEAD moved");
        Ok(())
    }

    fn rollback_to(&self, sequence: u64) -> LedgerResult<u64> {
        let mut state = self.write()?;
        let range = state.check_rollback(sequence)?;
        let count = state.apply_rollback(range, sequence);
        info!(head = sequence, orphaned = count, "rolled back");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_crypto::{content_hash, HashChainVerifier};
    use charter_types::{Payload, GENESIS_HASH};
    use serde_json::json;

    fn payload(n: u64) -> Payload {
        let mut p = Payload::new();
        p.insert("n".into(), json!(n));
        p
    }

    fn filled(count: u64) -> InMemoryLedger {
        let ledger = InMemoryLedger::default();
        for n in 1..=count {
            ledger
                .append(EventDraft::system("executive.task.activated", payload(n)))
                .unwrap();
        }
        ledger
    }

    #[test]
    fn first_event_links_to_genesis() {
        let ledger = filled(1);
        let first = ledger.get_latest().unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(first.content_hash, content_hash(&first).unwrap());
    }

    #[test]
    fn appends_form_a_chain() {
        let ledger = filled(5);
        let events = ledger.read_events(1, 5).unwrap();
        assert_eq!(events.len(), 5);
        assert!(HashChainVerifier::verify_from_genesis(&events).is_ok());
        for pair in events.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].content_hash);
        }
    }

    #[test]
    fn disallowed_type_assigns_no_sequence() {
        let ledger = filled(2);
        let err = ledger
            .append(EventDraft::system("telemetry.heartbeat", Payload::new()))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DisallowedEventType(_)));
        assert_eq!(ledger.get_max_sequence().unwrap(), 2);
        let next = ledger
            .append(EventDraft::system("motion.filed", Payload::new()))
            .unwrap();
        assert_eq!(next.sequence, 3);
    }

    #[test]
    fn get_by_id_and_sequence_agree() {
        let ledger = filled(3);
        let second = ledger.get_by_sequence(2, false).unwrap().unwrap();
        let by_id = ledger
            .get_by_id(&second.event.event_id, false)
            .unwrap()
            .unwrap();
        assert_eq!(second, by_id);
        assert!(ledger.get_by_sequence(4, true).unwrap().is_none());
    }

    #[test]
    fn concurrent_appends_are_gapless() {
        let ledger = Arc::new(InMemoryLedger::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        ledger
                            .append(EventDraft::system("motion.filed", payload(t * 100 + n)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ledger.get_max_sequence().unwrap(), 200);
        assert_eq!(
            ledger.verify_sequence_continuity(1, 200).unwrap(),
            (true, vec![])
        );
        let events = ledger.read_events(1, 200).unwrap();
        assert!(HashChainVerifier::verify_from_genesis(&events).is_ok());
    }

    #[test]
    fn orphan_then_set_head_hides_tail() {
        let ledger = filled(10);
        assert_eq!(ledger.mark_orphaned(6, 10).unwrap(), 5);
        ledger.set_head(5).unwrap();

        let visible = ledger.read_range(1, 10, false).unwrap();
        assert_eq!(visible.len(), 5);
        assert!(visible.iter().all(|s| !s.orphaned));

        let audit = ledger.read_range(1, 10, true).unwrap();
        assert_eq!(audit.len(), 10);
        for stored in &audit {
            assert_eq!(stored.orphaned, stored.sequence() > 5);
        }
        assert_eq!(ledger.get_latest().unwrap().unwrap().sequence, 5);
        assert_eq!(ledger.authorized_gaps().unwrap(), vec![SequenceRange::new(6, 10)]);
    }

    #[test]
    fn orphaned_events_are_returned_unchanged() {
        let ledger = filled(4);
        let before = ledger.read_events(3, 4).unwrap();
        ledger.rollback_to(2).unwrap();
        let after: Vec<Event> = ledger
            .read_range(3, 4, true)
            .unwrap()
            .into_iter()
            .map(StoredEvent::into_event)
            .collect();
        assert_eq!(before, after);
        assert!(ledger.read_range(3, 4, false).unwrap().is_empty());
    }

    #[test]
    fn orphaning_must_cover_the_tail() {
        let ledger = filled(10);
        let err = ledger.mark_orphaned(3, 5).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OrphanRangeNotTail { valid_above: 6, .. }
        ));
        assert!(matches!(
            ledger.mark_orphaned(0, 3).unwrap_err(),
            LedgerError::InvalidRange { .. }
        ));
    }

    #[test]
    fn set_head_rejects_targets_below_valid_events() {
        let ledger = filled(5);
        assert!(matches!(
            ledger.set_head(3).unwrap_err(),
            LedgerError::InvalidHead { target: 3, .. }
        ));
        ledger.mark_orphaned(4, 5).unwrap();
        ledger.set_head(3).unwrap();
    }

    #[test]
    fn append_refuses_while_head_is_orphaned() {
        let ledger = filled(3);
        ledger.mark_orphaned(3, 3).unwrap();
        assert!(matches!(
            ledger
                .append(EventDraft::system("motion.filed", Payload::new()))
                .unwrap_err(),
            LedgerError::InvalidHead { .. }
        ));
    }

    #[test]
    fn appends_after_rollback_skip_orphaned_sequences() {
        let ledger = filled(5);
        assert_eq!(ledger.rollback_to(3).unwrap(), 2);
        let head_hash = ledger.get_latest().unwrap().unwrap().content_hash;

        let next = ledger
            .append(EventDraft::system("motion.filed", Payload::new()))
            .unwrap();
        assert_eq!(next.sequence, 6);
        assert_eq!(next.prev_hash, head_hash);

        let valid = ledger.read_events(1, 6).unwrap();
        assert!(HashChainVerifier::verify_from_genesis(&valid).is_ok());
        assert_eq!(
            ledger.verify_sequence_continuity(1, 6).unwrap(),
            (false, vec![4, 5])
        );
    }

    #[test]
    fn rollback_to_zero_empties_the_valid_chain() {
        let ledger = filled(3);
        assert_eq!(ledger.rollback_to(0).unwrap(), 3);
        assert_eq!(ledger.head().unwrap(), 0);
        assert!(ledger.get_latest().unwrap().is_none());
        let next = ledger
            .append(EventDraft::system("motion.filed", Payload::new()))
            .unwrap();
        assert_eq!(next.sequence, 4);
        assert_eq!(next.prev_hash, GENESIS_HASH);
    }

    #[test]
    fn continuity_on_intact_store() {
        let ledger = filled(5);
        assert_eq!(ledger.verify_sequence_continuity(1, 5).unwrap(), (true, vec![]));
        assert_eq!(
            ledger.verify_sequence_continuity(4, 7).unwrap(),
            (false, vec![6, 7])
        );
    }

    #[test]
    fn query_filters_by_type() {
        let ledger = InMemoryLedger::default();
        for event_type in ["motion.filed", "motion.passed", "motion.filed", "breach.declared"] {
            ledger.append(EventDraft::system(event_type, Payload::new())).unwrap();
        }
        let hits = ledger
            .query(&EventQuery::new().with_types(["motion.filed", "breach.declared"]))
            .unwrap();
        let sequences: Vec<u64> = hits.iter().map(StoredEvent::sequence).collect();
        assert_eq!(sequences, vec![1, 3, 4]);

        let limited = ledger.query(&EventQuery::new().limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn query_respects_orphan_flag() {
        let ledger = filled(4);
        ledger.rollback_to(2).unwrap();
        assert_eq!(ledger.query(&EventQuery::new()).unwrap().len(), 2);
        assert_eq!(
            ledger
                .query(&EventQuery::new().including_orphaned())
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn stream_reads_every_valid_event_in_batches() {
        let ledger = filled(23);
        ledger.rollback_to(20).unwrap();
        let streamed: Vec<u64> = ledger
            .stream_events(7)
            .unwrap()
            .map(|e| e.unwrap().sequence)
            .collect();
        assert_eq!(streamed, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn stream_ignores_appends_after_creation() {
        let ledger = filled(3);
        let stream = ledger.stream_events(2).unwrap();
        ledger
            .append(EventDraft::system("motion.filed", Payload::new()))
            .unwrap();
        assert_eq!(stream.count(), 3);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let ledger = InMemoryLedger::default();
        assert_eq!(ledger.stream_events(10).unwrap().count(), 0);
    }

    #[test]
    fn stats_track_orphans() {
        let ledger = filled(6);
        ledger.rollback_to(4).unwrap();
        let stats = ledger.stats().unwrap();
        assert_eq!(stats.total_events, 6);
        assert_eq!(stats.valid_events, 4);
        assert_eq!(stats.orphaned_events, 2);
        assert_eq!(stats.head, 4);
        assert!(ledger.is_orphaned(5).unwrap());
        assert!(!ledger.is_orphaned(4).unwrap());
    }
}
