//! Personal-data screening for exports.
//!
//! Attribution fields must be opaque identifiers. Payload text is scanned for
//! e-mail addresses and capitalized two-word sequences that look like a
//! person's name. A short allow-list of technical terms is masked out before
//! the name pattern runs.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use charter_types::{is_valid_attribution, Event};

use crate::error::{ExportError, ExportResult, PiiKind};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex compiles")
});

static PERSON_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").expect("name regex compiles")
});

/// Capitalized phrases that are vocabulary, not names.
pub const TECHNICAL_TERMS: &[&str] = &[
    "Merkle Tree",
    "Merkle Root",
    "Merkle Proof",
    "Hash Chain",
    "Content Hash",
    "Genesis Hash",
    "Event Store",
    "Event Ledger",
    "State Replay",
    "Sequence Number",
    "Time Authority",
    "Witness Signature",
    "Agent Signature",
    "Export Attestation",
];

/// Screens events and requesters before anything leaves the ledger.
#[derive(Clone, Debug)]
pub struct PiiGuard {
    allowed: Vec<String>,
}

impl Default for PiiGuard {
    fn default() -> Self {
        Self {
            allowed: TECHNICAL_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl PiiGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the allow-list with additional capitalized terms.
    pub fn with_allowed_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn check_attribution(
        &self,
        field: &str,
        value: &str,
        sequence: Option<u64>,
    ) -> ExportResult<()> {
        if is_valid_attribution(value) {
            Ok(())
        } else {
            Err(ExportError::PiiDetected {
                sequence,
                field: field.to_string(),
                kind: PiiKind::FreeFormAttribution,
            })
        }
    }

    /// Returns the first rule `text` trips, if any.
    pub fn scan_text(&self, text: &str) -> Option<PiiKind> {
        if EMAIL.is_match(text) {
            return Some(PiiKind::EmailAddress);
        }
        let mut masked = text.to_string();
        for term in &self.allowed {
            masked = masked.replace(term.as_str(), "_");
        }
        if PERSON_NAME.is_match(&masked) {
            return Some(PiiKind::PersonName);
        }
        None
    }

    /// Recursively scan keys and string values. `path` names the location
    /// reported on a hit.
    pub fn scan_value(&self, path: &str, value: &Value, sequence: Option<u64>) -> ExportResult<()> {
        let hit = |field: String, kind| ExportError::PiiDetected {
            sequence,
            field,
            kind,
        };
        match value {
            Value::String(s) => match self.scan_text(s) {
                Some(kind) => Err(hit(path.to_string(), kind)),
                None => Ok(()),
            },
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| self.scan_value(&format!("{path}[{i}]"), item, sequence)),
            Value::Object(map) => map.iter().try_for_each(|(key, item)| {
                let child = format!("{path}.{key}");
                if let Some(kind) = self.scan_text(key) {
                    return Err(hit(child, kind));
                }
                self.scan_value(&child, item, sequence)
            }),
            _ => Ok(()),
        }
    }

    /// Check both attributions and the whole payload of one event.
    pub fn check_event(&self, event: &Event) -> ExportResult<()> {
        let seq = Some(event.sequence);
        self.check_attribution("agent_id", &event.agent_id, seq)?;
        self.check_attribution("witness_id", &event.witness_id, seq)?;
        for (key, value) in &event.payload {
            let path = format!("payload.{key}");
            if let Some(kind) = self.scan_text(key) {
                return Err(ExportError::PiiDetected {
                    sequence: seq,
                    field: path,
                    kind,
                });
            }
            self.scan_value(&path, value, seq)?;
        }
        Ok(())
    }
}
