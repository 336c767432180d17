//! Complete ledger exports.
//!
//! An export is every valid event, in sequence order, with no filtering or
//! paging. Before anything is returned the exporter screens each event for
//! personal data and cross-checks the collected sequences against the
//! ledger's authorized rollback gaps; either failure aborts the whole export.
//!
//! Writers cover the JSON document, JSON Lines, and RFC 4180 CSV. Attestation
//! metadata summarizes a range and chain state and can be Ed25519-signed.

pub mod attestation;
pub mod config;
pub mod error;
pub mod exporter;
pub mod formats;
pub mod pii;

pub use attestation::{sign_attestation, verify_signature};
pub use config::ExportConfig;
pub use error::{ExportError, ExportResult, PiiKind};
pub use exporter::{check_completeness, Exporter};
pub use formats::{write_csv, write_json, write_jsonl, EVENT_FIELDS};
pub use pii::{PiiGuard, TECHNICAL_TERMS};
