use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::EventHash;

/// How a checkpoint's root has been anchored outside the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorType {
    /// The first checkpoint of a ledger, anchored by the ledger itself.
    Genesis,
    /// The root has been stamped by an external timestamping authority.
    ExternallyTimestamped,
    /// Published but not yet externally anchored.
    Pending,
}

impl fmt::Display for AnchorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Genesis => "genesis",
            Self::ExternallyTimestamped => "externally-timestamped",
            Self::Pending => "pending",
        };
        write!(f, "{s}")
    }
}

/// An immutable Merkle-rooted snapshot of the ledger prefix `1..=event_sequence`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: Uuid,
    /// Inclusive upper bound of the covered prefix.
    pub event_sequence: u64,
    /// Merkle root over the content hashes of the covered valid events.
    pub anchor_hash: EventHash,
    pub anchor_type: AnchorType,
    pub timestamp: DateTime<Utc>,
    /// Number of leaves the root was built over.
    #[serde(default)]
    pub leaf_count: u64,
}

impl Checkpoint {
    /// Returns `true` if `sequence` falls inside the covered prefix.
    pub fn covers(&self, sequence: u64) -> bool {
        sequence >= 1 && sequence <= self.event_sequence
    }
}
