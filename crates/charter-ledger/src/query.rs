use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use charter_types::Event;

/// Filter for ledger queries.
///
/// Criteria are AND-combined; `event_types` matches if the event's type is
/// any one of the listed types. Dates compare against
/// `authority_timestamp` (inclusive on both ends). Results are always in
/// sequence order regardless of timestamps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub event_types: Option<Vec<String>>,
    pub include_orphaned: bool,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to events stamped within `start..=end`.
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Restrict to any of the given event types.
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn including_orphaned(mut self) -> Self {
        self.include_orphaned = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if the event satisfies the date and type criteria.
    /// The orphan flag is applied by the store.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(start) = self.start_date {
            if event.authority_timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if event.authority_timestamp > end {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == &event.event_type) {
                return false;
            }
        }
        true
    }

    /// Attestation filter summary for exports scoped by this query.
    pub fn describe(&self) -> std::collections::BTreeMap<String, String> {
        let mut filters = std::collections::BTreeMap::new();
        if let Some(start) = self.start_date {
            filters.insert("start_date".to_string(), start.to_rfc3339());
        }
        if let Some(end) = self.end_date {
            filters.insert("end_date".to_string(), end.to_rfc3339());
        }
        if let Some(ref types) = self.event_types {
            filters.insert("event_types".to_string(), types.join(","));
        }
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_types::{EventHash, Payload, GENESIS_HASH};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event_at(event_type: &str, day: u32) -> Event {
        let ts = Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap();
        Event {
            event_id: Uuid::now_v7(),
            sequence: day as u64,
            event_type: event_type.into(),
            payload: Payload::new(),
            content_hash: EventHash::from_bytes([day as u8; 32]),
            prev_hash: GENESIS_HASH,
            signature: String::new(),
            agent_id: "system".into(),
            witness_id: "system".into(),
            witness_signature: String::new(),
            local_timestamp: ts,
            authority_timestamp: ts,
            hash_algorithm_version: "blake3-v1".into(),
            signature_algorithm_version: "ed25519-v1".into(),
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(EventQuery::new().matches(&event_at("motion.filed", 1)));
    }

    #[test]
    fn types_are_or_combined() {
        let q = EventQuery::new().with_types(["motion.filed", "motion.passed"]);
        assert!(q.matches(&event_at("motion.filed", 1)));
        assert!(q.matches(&event_at("motion.passed", 1)));
        assert!(!q.matches(&event_at("motion.vetoed", 1)));
    }

    #[test]
    fn date_and_type_are_and_combined() {
        let q = EventQuery::new()
            .between(
                Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 3, 4, 23, 59, 59).unwrap(),
            )
            .with_types(["motion.filed"]);
        assert!(q.matches(&event_at("motion.filed", 3)));
        assert!(!q.matches(&event_at("motion.filed", 5)));
        assert!(!q.matches(&event_at("motion.passed", 3)));
    }

    #[test]
    fn describe_lists_active_filters() {
        let q = EventQuery::new().with_types(["a.b", "c.d"]);
        let filters = q.describe();
        assert_eq!(filters.get("event_types").unwrap(), "a.b,c.d");
        assert!(!filters.contains_key("start_date"));
    }
}
