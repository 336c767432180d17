use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;
use crate::event::Event;
use crate::hash::EventHash;

/// Current version of the export document layout.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// An inclusive range of sequence numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceRange {
    pub start: u64,
    pub end: u64,
}

impl SequenceRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `sequence` lies in `start..=end`.
    pub fn contains(&self, sequence: u64) -> bool {
        sequence >= self.start && sequence <= self.end
    }

    /// Number of sequences covered.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Descriptive header of a complete export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_id: Uuid,
    pub exported_at: DateTime<Utc>,
    pub format_version: String,
    pub total_events: u64,
    pub genesis_hash: EventHash,
    pub latest_hash: EventHash,
    /// `(first, last)` sequence present, or `(0, 0)` for an empty ledger.
    pub sequence_range: (u64, u64),
    /// Ranges orphaned by authorized rollbacks. Their absence is not a gap.
    #[serde(default)]
    pub authorized_gaps: Vec<SequenceRange>,
    pub requested_by: String,
}

impl ExportMetadata {
    /// Returns `true` if `sequence` was removed from the valid chain by an
    /// authorized rollback.
    pub fn is_authorized_gap(&self, sequence: u64) -> bool {
        self.authorized_gaps.iter().any(|gap| gap.contains(sequence))
    }

    /// Authorized gaps clipped to `1..=last`, sorted and merged.
    pub fn normalized_gaps(&self) -> Vec<SequenceRange> {
        let (_, last) = self.sequence_range;
        let mut gaps: Vec<SequenceRange> = self
            .authorized_gaps
            .iter()
            .filter(|gap| gap.start <= gap.end && gap.end >= 1 && gap.start <= last)
            .map(|gap| SequenceRange::new(gap.start.max(1), gap.end.min(last)))
            .collect();
        merge_ranges(&mut gaps);
        gaps
    }

    /// How many sequences a complete export holds: `last` minus the width of
    /// the authorized gaps.
    pub fn expected_count(&self) -> u64 {
        let (_, last) = self.sequence_range;
        let gap_width: u64 = self.normalized_gaps().iter().map(SequenceRange::len).sum();
        last.saturating_sub(gap_width)
    }

    /// Ranges inside `1..=last` covered by neither a present sequence nor an
    /// authorized gap. Work is bounded by `present.len()` plus the gap count,
    /// never by the width of `sequence_range`.
    pub fn missing_ranges(&self, present: &[u64]) -> Vec<SequenceRange> {
        let (_, last) = self.sequence_range;
        if last == 0 {
            return Vec::new();
        }

        let mut covered = self.normalized_gaps();
        let mut sorted: Vec<u64> = present.iter().copied().filter(|s| (1..=last).contains(s)).collect();
        sorted.sort_unstable();
        sorted.dedup();
        covered.extend(runs(&sorted));
        merge_ranges(&mut covered);

        let mut missing = Vec::new();
        let mut cursor = 1u64;
        for range in covered {
            if range.start > cursor {
                missing.push(SequenceRange::new(cursor, range.start - 1));
            }
            if range.end == u64::MAX {
                return missing;
            }
            cursor = cursor.max(range.end + 1);
        }
        if cursor <= last {
            missing.push(SequenceRange::new(cursor, last));
        }
        missing
    }
}

/// Collapse sorted, deduplicated sequences into contiguous ranges.
fn runs(sorted: &[u64]) -> Vec<SequenceRange> {
    let mut out: Vec<SequenceRange> = Vec::new();
    for &sequence in sorted {
        match out.last_mut() {
            Some(run) if run.end.checked_add(1) == Some(sequence) => run.end = sequence,
            _ => out.push(SequenceRange::new(sequence, sequence)),
        }
    }
    out
}

/// Sort and merge overlapping or adjacent ranges in place.
fn merge_ranges(ranges: &mut Vec<SequenceRange>) {
    ranges.sort_unstable();
    let mut merged: Vec<SequenceRange> = Vec::with_capacity(ranges.len());
    for range in ranges.drain(..) {
        match merged.last_mut() {
            Some(prev) if range.start <= prev.end.saturating_add(1) => {
                prev.end = prev.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    *ranges = merged;
}

/// Producer-side verification summary, re-checked by any consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportVerification {
    pub hash_algorithm: String,
    pub chain_valid: bool,
    pub genesis_to_latest: bool,
    /// Merkle root over every exported content hash, in sequence order.
    pub merkle_root: EventHash,
}

/// A complete, immutable snapshot of every valid ledger event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerExport {
    pub metadata: ExportMetadata,
    pub events: Vec<Event>,
    pub verification: ExportVerification,
}

impl LedgerExport {
    /// Content hashes in sequence order: the Merkle leaves of the export.
    pub fn leaves(&self) -> Vec<EventHash> {
        self.events.iter().map(|e| e.content_hash).collect()
    }
}

/// Signable summary tying an export to an exact range and chain state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationMetadata {
    pub export_id: Uuid,
    pub exported_at: DateTime<Utc>,
    pub sequence_start: u64,
    pub sequence_end: u64,
    pub event_count: u64,
    pub chain_hash_at_export: EventHash,
    pub exporter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_signature: Option<String>,
}

impl AttestationMetadata {
    /// Canonical bytes covered by `export_signature`: the JSON encoding of
    /// the attestation with the signature field cleared.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TypeError> {
        let mut unsigned = self.clone();
        unsigned.export_signature = None;
        serde_json::to_vec(&unsigned).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
