//! Serialized export layouts.
//!
//! JSON Lines and CSV share one column order, the field order of
//! [`Event`]. Hashes are plain lowercase hex; timestamps are RFC 3339.

use std::io::Write;

use charter_types::{Event, LedgerExport};

use crate::error::ExportResult;

/// Column order shared by JSON Lines objects and CSV rows.
pub const EVENT_FIELDS: [&str; 14] = [
    "event_id",
    "sequence",
    "event_type",
    "payload",
    "content_hash",
    "prev_hash",
    "signature",
    "agent_id",
    "witness_id",
    "witness_signature",
    "local_timestamp",
    "authority_timestamp",
    "hash_algorithm_version",
    "sig_alg_version",
];

/// The whole export document, pretty-printed.
pub fn write_json<W: Write>(export: &LedgerExport, mut writer: W) -> ExportResult<()> {
    serde_json::to_writer_pretty(&mut writer, export)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// One compact JSON object per event, one event per line.
pub fn write_jsonl<W: Write>(events: &[Event], mut writer: W) -> ExportResult<()> {
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// RFC 4180 CSV with a header row. The payload column holds the payload's
/// compact JSON encoding.
pub fn write_csv<W: Write>(events: &[Event], writer: W) -> ExportResult<()> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);
    csv.write_record(EVENT_FIELDS)?;
    for event in events {
        csv.write_record(csv_row(event)?)?;
    }
    csv.flush()?;
    Ok(())
}

fn csv_row(event: &Event) -> ExportResult<[String; 14]> {
    Ok([
        event.event_id.to_string(),
        event.sequence.to_string(),
        event.event_type.clone(),
        serde_json::to_string(&event.payload)?,
        event.content_hash.to_hex(),
        event.prev_hash.to_hex(),
        event.signature.clone(),
        event.agent_id.clone(),
        event.witness_id.clone(),
        event.witness_signature.clone(),
        event.local_timestamp.to_rfc3339(),
        event.authority_timestamp.to_rfc3339(),
        event.hash_algorithm_version.clone(),
        event.signature_algorithm_version.clone(),
    ])
}
