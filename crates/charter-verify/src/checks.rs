//! The four independent verification checks.
//!
//! Each check is pure, takes only data, and reports every problem it finds
//! rather than stopping at the first.

use std::collections::BTreeMap;

use charter_crypto::{content_hash, merkle_root, ChainError, HashChainVerifier};
use charter_types::{DetectedIssue, Event, EventHash, ExportMetadata, IssueKind, GENESIS_HASH};

use crate::reducer::StateReducer;

/// Outcome of a single check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub issues: Vec<DetectedIssue>,
}

impl CheckOutcome {
    fn from_issues(issues: Vec<DetectedIssue>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }
}

/// Links between consecutive events, the genesis sentinel on the first, and
/// each stored content hash against a recomputed one.
pub fn check_hash_chain(events: &[Event]) -> CheckOutcome {
    let mut issues = Vec::new();

    for event in events {
        match content_hash(event) {
            Ok(computed) if computed != event.content_hash => issues.push(DetectedIssue::new(
                IssueKind::HashMismatch,
                Some(event.sequence),
                computed.to_hex(),
                event.content_hash.to_hex(),
                "stored content hash does not match recomputed canonical content",
            )),
            Ok(_) => {}
            Err(e) => issues.push(DetectedIssue::new(
                IssueKind::HashMismatch,
                Some(event.sequence),
                "canonical content",
                "unserializable event",
                e.to_string(),
            )),
        }
    }

    for err in HashChainVerifier::find_breaks(events, GENESIS_HASH) {
        issues.push(match err {
            ChainError::BrokenLink {
                sequence,
                expected,
                actual,
            } => DetectedIssue::new(
                IssueKind::BrokenLink,
                Some(sequence),
                expected.to_hex(),
                actual.to_hex(),
                if expected.is_genesis() {
                    "first event does not link to GENESIS_HASH"
                } else {
                    "prev_hash does not match the previous event's content hash"
                },
            ),
            ChainError::OutOfOrder { sequence, previous } => DetectedIssue::new(
                IssueKind::BrokenLink,
                Some(sequence),
                format!("> {previous}"),
                sequence.to_string(),
                "events are not in ascending sequence order",
            ),
        });
    }

    CheckOutcome::from_issues(issues)
}

/// The sequences present against those the metadata declares: `1..=end`
/// minus authorized gaps, with count and range agreeing. Holes are reported
/// as ranges so a forged `sequence_range` costs no more than the events and
/// gaps actually in the document.
pub fn check_sequence_completeness(events: &[Event], metadata: &ExportMetadata) -> CheckOutcome {
    let mut issues = Vec::new();
    let gap = |sequence: Option<u64>, expected: String, actual: String, message: String| {
        DetectedIssue::new(IssueKind::SequenceGap, sequence, expected, actual, message)
    };

    let mut seen: BTreeMap<u64, usize> = BTreeMap::new();
    for event in events {
        *seen.entry(event.sequence).or_default() += 1;
    }
    for (sequence, count) in seen.iter().filter(|(_, c)| **c > 1) {
        issues.push(gap(
            Some(*sequence),
            "1".into(),
            count.to_string(),
            "sequence appears more than once".into(),
        ));
    }

    let present: Vec<u64> = seen.keys().copied().collect();
    for missing in metadata.missing_ranges(&present) {
        issues.push(gap(
            Some(missing.start),
            "present".into(),
            "missing".into(),
            format!(
                "{} sequence(s) missing from export: {}..={}",
                missing.len(),
                missing.start,
                missing.end
            ),
        ));
    }

    let (_, last) = metadata.sequence_range;
    let gaps = metadata.normalized_gaps();
    let in_gap = |sequence: u64| {
        let idx = gaps.partition_point(|g| g.end < sequence);
        gaps.get(idx).is_some_and(|g| g.contains(sequence))
    };
    for extra in present.iter().filter(|s| **s == 0 || **s > last || in_gap(**s)) {
        issues.push(gap(
            Some(*extra),
            "absent".into(),
            "present".into(),
            "sequence outside the declared range or inside an authorized gap".into(),
        ));
    }

    if metadata.total_events != events.len() as u64 {
        issues.push(gap(
            None,
            metadata.total_events.to_string(),
            events.len().to_string(),
            "declared total_events does not match event count".into(),
        ));
    }

    let actual_range = match (events.first(), events.last()) {
        (Some(first), Some(last)) => (first.sequence, last.sequence),
        _ => (0, 0),
    };
    if metadata.sequence_range != actual_range {
        issues.push(gap(
            None,
            format!("{:?}", metadata.sequence_range),
            format!("{actual_range:?}"),
            "declared sequence_range does not match events".into(),
        ));
    }

    CheckOutcome::from_issues(issues)
}

/// Recompute the Merkle root over `leaves` and compare.
pub fn check_merkle(leaves: &[EventHash], expected_root: &EventHash) -> CheckOutcome {
    let computed = merkle_root(leaves);
    if computed == *expected_root {
        return CheckOutcome::from_issues(vec![]);
    }
    CheckOutcome::from_issues(vec![DetectedIssue::new(
        IssueKind::MerkleMismatch,
        None,
        expected_root.to_hex(),
        computed.to_hex(),
        format!("root over {} leaves does not match", leaves.len()),
    )])
}

/// Replay the events twice from the initial state. Either replay failing,
/// or the two final digests differing, is a state mismatch.
pub fn check_state_replay<R: StateReducer>(events: &[Event], reducer: &R) -> CheckOutcome {
    let replay = || -> Result<EventHash, DetectedIssue> {
        let mut state = reducer.initial_state();
        for event in events {
            reducer.apply(&mut state, event).map_err(|e| {
                DetectedIssue::new(
                    IssueKind::StateMismatch,
                    e.sequence.or(Some(event.sequence)),
                    "event applies",
                    "reducer error",
                    e.reason,
                )
            })?;
        }
        reducer.digest(&state).map_err(|e| {
            DetectedIssue::new(
                IssueKind::StateMismatch,
                e.sequence,
                "state digest",
                "reducer error",
                e.reason,
            )
        })
    };

    let issues = match (replay(), replay()) {
        (Ok(first), Ok(second)) if first == second => vec![],
        (Ok(first), Ok(second)) => vec![DetectedIssue::new(
            IssueKind::StateMismatch,
            None,
            first.to_hex(),
            second.to_hex(),
            "replay is not deterministic",
        )],
        (Err(issue), _) | (_, Err(issue)) => vec![issue],
    };
    CheckOutcome::from_issues(issues)
}
