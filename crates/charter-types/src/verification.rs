use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregate outcome of a verification run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    /// Every check passed.
    Valid,
    /// The hash chain or a Merkle root failed: the data cannot be trusted.
    Invalid,
    /// Integrity holds but the data is incomplete or cannot be replayed.
    Partial,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Partial => "PARTIAL",
        };
        write!(f, "{s}")
    }
}

/// Classification of a detected problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    HashMismatch,
    SequenceGap,
    BrokenLink,
    MerkleMismatch,
    StateMismatch,
}

/// A single problem found by a verification check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedIssue {
    pub kind: IssueKind,
    /// Sequence where the problem was found, if it has a location.
    pub sequence: Option<u64>,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl DetectedIssue {
    pub fn new(
        kind: IssueKind,
        sequence: Option<u64>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            sequence,
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }
}

/// Structured result of verifying an export or a proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub hash_chain_valid: bool,
    pub merkle_valid: bool,
    pub sequence_complete: bool,
    pub state_replay_valid: bool,
    pub issues: Vec<DetectedIssue>,
    pub events_verified: u64,
}

impl VerificationResult {
    /// Returns `true` if the status is `VALID`.
    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Valid
    }

    /// Issues of a single kind.
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &DetectedIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Partial).unwrap(),
            "\"PARTIAL\""
        );
        assert_eq!(VerificationStatus::Invalid.to_string(), "INVALID");
    }

    #[test]
    fn issue_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&IssueKind::MerkleMismatch).unwrap(),
            "\"merkle_mismatch\""
        );
    }
}
