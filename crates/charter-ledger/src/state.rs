//! Arena plus index shared by every store implementation.
//!
//! The arena is the sequence space: slot `i` holds the event with sequence
//! `i + 1`, and slots are never freed or overwritten. Rollback only touches
//! the index (HEAD and the orphan set). Mutations come in `check_*` /
//! `apply_*` pairs so a durable store can persist a mutation between the
//! two halves.

use std::collections::{BTreeSet, HashMap};

use charter_crypto::content_hash;
use charter_types::{Event, EventHash, SequenceRange, GENESIS_HASH};
use uuid::Uuid;

use crate::continuity::continuity_in_range;
use crate::error::{LedgerError, LedgerResult};
use crate::query::EventQuery;
use crate::traits::{LedgerStats, StoredEvent};

#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    events: Vec<Event>,
    orphaned: BTreeSet<u64>,
    head: u64,
    id_index: HashMap<Uuid, u64>,
    gaps: Vec<SequenceRange>,
}

impl LedgerState {
    pub fn max_sequence(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    /// Content hash of HEAD, or the genesis sentinel on an empty chain.
    pub fn head_hash(&self) -> EventHash {
        self.slot(self.head)
            .map(|e| e.content_hash)
            .unwrap_or(GENESIS_HASH)
    }

    fn slot(&self, sequence: u64) -> Option<&Event> {
        if sequence == 0 {
            return None;
        }
        self.events.get((sequence - 1) as usize)
    }

    fn is_valid(&self, sequence: u64) -> bool {
        sequence >= 1 && sequence <= self.max_sequence() && !self.orphaned.contains(&sequence)
    }

    /// Highest non-orphaned sequence, or `0`.
    pub fn highest_valid(&self) -> u64 {
        (1..=self.max_sequence())
            .rev()
            .find(|s| !self.orphaned.contains(s))
            .unwrap_or(0)
    }

    // ---- append ----------------------------------------------------------

    /// Position and link for the next append.
    pub fn next_position(&self) -> LedgerResult<(u64, EventHash)> {
        if self.head != 0 && self.orphaned.contains(&self.head) {
            return Err(LedgerError::InvalidHead {
                target: self.head,
                reason: "HEAD points at an orphaned event; finish the rollback with set_head"
                    .into(),
            });
        }
        Ok((self.max_sequence() + 1, self.head_hash()))
    }

    pub fn check_append(&self, event: &Event) -> LedgerResult<()> {
        let (sequence, prev_hash) = self.next_position()?;
        if event.sequence != sequence {
            return Err(LedgerError::IntegrityViolation {
                sequence: event.sequence,
                reason: format!("expected sequence {sequence}"),
            });
        }
        if event.prev_hash != prev_hash {
            return Err(LedgerError::IntegrityViolation {
                sequence: event.sequence,
                reason: format!("prev_hash does not match HEAD hash {}", prev_hash.short_hex()),
            });
        }
        let computed = content_hash(event)?;
        if computed != event.content_hash {
            return Err(LedgerError::HashMismatch {
                sequence: event.sequence,
                stored: event.content_hash,
                computed,
            });
        }
        if self.id_index.contains_key(&event.event_id) {
            return Err(LedgerError::IntegrityViolation {
                sequence: event.sequence,
                reason: format!("duplicate event id {}", event.event_id),
            });
        }
        Ok(())
    }

    pub fn apply_append(&mut self, event: Event) {
        self.id_index.insert(event.event_id, event.sequence);
        self.head = event.sequence;
        self.events.push(event);
    }

    // ---- rollback --------------------------------------------------------

    pub fn check_orphan(&self, start: u64, end: u64) -> LedgerResult<()> {
        if start == 0 || end < start || end > self.max_sequence() {
            return Err(LedgerError::InvalidRange { start, end });
        }
        if let Some(above) = ((end + 1)..=self.max_sequence()).find(|s| self.is_valid(*s)) {
            return Err(LedgerError::OrphanRangeNotTail {
                start,
                end,
                valid_above: above,
            });
        }
        Ok(())
    }

    /// Flag `start..=end`. Returns the number of events newly flagged; the
    /// range is logged as an authorized gap when anything changed.
    pub fn apply_orphan(&mut self, start: u64, end: u64) -> u64 {
        let newly = (start..=end)
            .filter(|s| self.orphaned.insert(*s))
            .count() as u64;
        if newly > 0 {
            self.gaps.push(SequenceRange::new(start, end));
        }
        newly
    }

    pub fn check_set_head(&self, target: u64) -> LedgerResult<()> {
        if target > self.max_sequence() {
            return Err(LedgerError::NotFound(target));
        }
        if target != 0 && self.orphaned.contains(&target) {
            return Err(LedgerError::InvalidHead {
                target,
                reason: "target event is orphaned".into(),
            });
        }
        let highest = self.highest_valid();
        if highest != target {
            return Err(LedgerError::InvalidHead {
                target,
                reason: format!("highest valid event is {highest}; orphan the events above first"),
            });
        }
        Ok(())
    }

    pub fn apply_set_head(&mut self, target: u64) {
        self.head = target;
    }

    /// Range that `rollback_to(target)` would orphan, if any.
    pub fn check_rollback(&self, target: u64) -> LedgerResult<Option<SequenceRange>> {
        if target > self.max_sequence() {
            return Err(LedgerError::NotFound(target));
        }
        if target != 0 && self.orphaned.contains(&target) {
            return Err(LedgerError::InvalidHead {
                target,
                reason: "target event is orphaned".into(),
            });
        }
        let range = SequenceRange::new(target + 1, self.max_sequence());
        let has_valid = (range.start..=range.end).any(|s| self.is_valid(s));
        Ok(has_valid.then_some(range))
    }

    pub fn apply_rollback(&mut self, orphaned: Option<SequenceRange>, head: u64) -> u64 {
        let count = orphaned
            .map(|r| self.apply_orphan(r.start, r.end))
            .unwrap_or(0);
        self.head = head;
        count
    }

    // ---- reads -----------------------------------------------------------

    fn stored(&self, event: &Event) -> StoredEvent {
        StoredEvent {
            event: event.clone(),
            orphaned: self.orphaned.contains(&event.sequence),
        }
    }

    pub fn get(&self, sequence: u64, include_orphaned: bool) -> Option<StoredEvent> {
        self.slot(sequence)
            .map(|e| self.stored(e))
            .filter(|s| include_orphaned || !s.orphaned)
    }

    pub fn get_by_id(&self, event_id: &Uuid, include_orphaned: bool) -> Option<StoredEvent> {
        self.id_index
            .get(event_id)
            .and_then(|seq| self.get(*seq, include_orphaned))
    }

    pub fn latest(&self) -> Option<Event> {
        self.slot(self.head).cloned()
    }

    pub fn range(&self, start: u64, end: u64, include_orphaned: bool) -> LedgerResult<Vec<StoredEvent>> {
        if start == 0 || end < start {
            return Err(LedgerError::InvalidRange { start, end });
        }
        let end = end.min(self.max_sequence());
        Ok((start..=end)
            .filter_map(|s| self.get(s, include_orphaned))
            .collect())
    }

    /// HEAD together with the valid events in `1..=up_to.min(HEAD)`.
    pub fn valid_prefix(&self, up_to: u64) -> (u64, Vec<Event>) {
        let end = up_to.min(self.head);
        let events = (1..=end)
            .filter_map(|s| self.get(s, false))
            .map(StoredEvent::into_event)
            .collect();
        (self.head, events)
    }

    pub fn query(&self, query: &EventQuery) -> Vec<StoredEvent> {
        let matching = self
            .events
            .iter()
            .filter(|e| query.include_orphaned || !self.orphaned.contains(&e.sequence))
            .filter(|e| query.matches(e))
            .map(|e| self.stored(e));
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn gaps(&self) -> Vec<SequenceRange> {
        self.gaps.clone()
    }

    pub fn continuity(&self, start: u64, end: u64) -> LedgerResult<(bool, Vec<u64>)> {
        if start == 0 || end < start {
            return Err(LedgerError::InvalidRange { start, end });
        }
        let present: Vec<u64> = (start..=end.min(self.max_sequence()))
            .filter(|s| self.is_valid(*s))
            .collect();
        Ok(continuity_in_range(&present, start, end))
    }

    pub fn stats(&self) -> LedgerStats {
        let total = self.max_sequence();
        let orphaned = self.orphaned.len() as u64;
        LedgerStats {
            total_events: total,
            valid_events: total - orphaned,
            orphaned_events: orphaned,
            head: self.head,
            max_sequence: total,
        }
    }
}
