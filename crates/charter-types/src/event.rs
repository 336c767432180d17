use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::TypeError;
use crate::hash::EventHash;

/// Attribution token for events written by the platform itself.
pub const SYSTEM_AGENT: &str = "system";

/// Hash algorithm tag stamped on every event.
pub const HASH_ALGORITHM_VERSION: &str = "blake3-v1";

/// Signature algorithm tag stamped on every event.
pub const SIGNATURE_ALGORITHM_VERSION: &str = "ed25519-v1";

/// Ordered key/value payload. Opaque to the ledger.
pub type Payload = BTreeMap<String, Value>;

/// The writer-supplied part of an event.
///
/// Sequence, hashes, signatures, and the authority timestamp are assigned by
/// the ledger at append time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub event_type: String,
    pub payload: Payload,
    pub agent_id: String,
    pub local_timestamp: DateTime<Utc>,
}

impl EventDraft {
    /// Draft attributed to the `"system"` agent, stamped with the current
    /// wall-clock time.
    pub fn system(event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            agent_id: SYSTEM_AGENT.to_string(),
            local_timestamp: Utc::now(),
        }
    }

    /// Draft attributed to an agent identified by UUID.
    pub fn by_agent(agent: Uuid, event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            agent_id: agent.to_string(),
            local_timestamp: Utc::now(),
        }
    }
}

/// An immutable ledger event.
///
/// `sequence` is the sole authoritative order. The two timestamps are
/// informational only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub sequence: u64,
    pub event_type: String,
    pub payload: Payload,
    pub content_hash: EventHash,
    pub prev_hash: EventHash,
    pub signature: String,
    pub agent_id: String,
    pub witness_id: String,
    pub witness_signature: String,
    pub local_timestamp: DateTime<Utc>,
    pub authority_timestamp: DateTime<Utc>,
    pub hash_algorithm_version: String,
    #[serde(rename = "sig_alg_version")]
    pub signature_algorithm_version: String,
}

/// The hashed portion of an event: every field except the content hash and
/// the two signatures over it.
#[derive(Serialize)]
pub struct CanonicalContent<'a> {
    pub event_id: &'a Uuid,
    pub sequence: u64,
    pub event_type: &'a str,
    pub payload: &'a Payload,
    pub prev_hash: &'a EventHash,
    pub agent_id: &'a str,
    pub witness_id: &'a str,
    pub local_timestamp: &'a DateTime<Utc>,
    pub authority_timestamp: &'a DateTime<Utc>,
    pub hash_algorithm_version: &'a str,
    pub sig_alg_version: &'a str,
}

impl Event {
    /// Borrowed view of the fields covered by `content_hash`.
    pub fn canonical_content(&self) -> CanonicalContent<'_> {
        CanonicalContent {
            event_id: &self.event_id,
            sequence: self.sequence,
            event_type: &self.event_type,
            payload: &self.payload,
            prev_hash: &self.prev_hash,
            agent_id: &self.agent_id,
            witness_id: &self.witness_id,
            local_timestamp: &self.local_timestamp,
            authority_timestamp: &self.authority_timestamp,
            hash_algorithm_version: &self.hash_algorithm_version,
            sig_alg_version: &self.signature_algorithm_version,
        }
    }

    /// Canonical bytes fed to the content hasher.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(&self.canonical_content())
            .map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// The namespace of the event type (the first dot-separated segment).
    pub fn namespace(&self) -> &str {
        self.event_type
            .split('.')
            .next()
            .unwrap_or(self.event_type.as_str())
    }
}

/// Check that an event type is namespaced: at least two dot-separated
/// segments of lowercase ASCII letters, digits, `_` or `-`.
pub fn validate_event_type(event_type: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidEventType {
        event_type: event_type.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = event_type.split('.').collect();
    if segments.len() < 2 {
        return Err(invalid("expected a namespaced type such as `domain.action`"));
    }
    for segment in segments {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(invalid("segments must be lowercase ascii"));
        }
    }
    Ok(())
}

/// Attribution must be a UUID or the `"system"` token, never a free-form
/// name.
pub fn is_valid_attribution(id: &str) -> bool {
    id == SYSTEM_AGENT || Uuid::parse_str(id).is_ok()
}
