use charter_types::{Event, EventDraft, SequenceRange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::query::EventQuery;
use crate::stream::EventStream;

/// An event as read back from the store, with its orphan flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event: Event,
    pub orphaned: bool,
}

impl StoredEvent {
    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn sequence(&self) -> u64 {
        self.event.sequence
    }
}

/// Counters describing the arena and its index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_events: u64,
    pub valid_events: u64,
    pub orphaned_events: u64,
    pub head: u64,
    pub max_sequence: u64,
}

/// Write boundary of the ledger.
///
/// This trait is the entire write surface available to event producers. It
/// declares no update or delete operation; events can only be added.
pub trait LedgerWriter: Send + Sync {
    /// Seal and append an event at the next sequence, advancing HEAD.
    fn append(&self, draft: EventDraft) -> LedgerResult<Event>;
}

/// Read boundary of the ledger. Every result is ordered by sequence.
pub trait LedgerReader: Send + Sync {
    fn get_by_sequence(
        &self,
        sequence: u64,
        include_orphaned: bool,
    ) -> LedgerResult<Option<StoredEvent>>;

    fn get_by_id(&self, event_id: &Uuid, include_orphaned: bool)
        -> LedgerResult<Option<StoredEvent>>;

    /// The event at HEAD, if any.
    fn get_latest(&self) -> LedgerResult<Option<Event>>;

    /// Highest sequence ever assigned, orphaned or not. `0` when empty.
    fn get_max_sequence(&self) -> LedgerResult<u64>;

    /// Latest valid sequence. `0` when no valid event exists.
    fn head(&self) -> LedgerResult<u64>;

    /// Events in `start..=end`.
    fn read_range(
        &self,
        start: u64,
        end: u64,
        include_orphaned: bool,
    ) -> LedgerResult<Vec<StoredEvent>>;

    /// Events matching a date range and/or type set.
    fn query(&self, query: &EventQuery) -> LedgerResult<Vec<StoredEvent>>;

    /// Ranges orphaned by rollbacks, in the order they were recorded.
    fn authorized_gaps(&self) -> LedgerResult<Vec<SequenceRange>>;

    /// Compare the valid sequences present in `start..=end` with the
    /// contiguous range. Returns `(complete, missing)`.
    ///
    /// Gaps left by an authorized rollback are reported like any other
    /// missing sequence; interpreting them is up to the caller.
    fn verify_sequence_continuity(&self, start: u64, end: u64) -> LedgerResult<(bool, Vec<u64>)>;

    fn stats(&self) -> LedgerResult<LedgerStats>;

    /// HEAD and the valid events in `1..=up_to.min(HEAD)`, read as one
    /// snapshot so no rollback can land between the two.
    fn valid_prefix(&self, up_to: u64) -> LedgerResult<(u64, Vec<Event>)>;

    /// Valid events in `start..=end`, without orphan flags.
    fn read_events(&self, start: u64, end: u64) -> LedgerResult<Vec<Event>> {
        Ok(self
            .read_range(start, end, false)?
            .into_iter()
            .map(StoredEvent::into_event)
            .collect())
    }

    /// Whether `sequence` exists and carries the orphan marker.
    fn is_orphaned(&self, sequence: u64) -> LedgerResult<bool> {
        Ok(self
            .get_by_sequence(sequence, true)?
            .is_some_and(|stored| stored.orphaned))
    }

    /// Lazily read every valid event, `batch_size` at a time.
    fn stream_events(&self, batch_size: usize) -> LedgerResult<EventStream<'_, Self>>
    where
        Self: Sized,
    {
        EventStream::new(self, batch_size)
    }
}

/// Rollback boundary. Only moves the index (HEAD and the orphan set); never
/// touches stored events.
pub trait RollbackControl: Send + Sync {
    /// Flag `start..=end` (inclusive on both ends) as orphaned. Returns the
    /// number of events newly flagged.
    fn mark_orphaned(&self, start: u64, end: u64) -> LedgerResult<u64>;

    /// Move HEAD to `sequence`, which must be the highest valid event (or `0`
    /// when none remain).
    fn set_head(&self, sequence: u64) -> LedgerResult<()>;

    /// Orphan everything above `sequence` and move HEAD there, atomically.
    /// Returns the number of events orphaned.
    fn rollback_to(&self, sequence: u64) -> LedgerResult<u64>;
}
