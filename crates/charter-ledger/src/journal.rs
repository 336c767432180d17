use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use charter_types::{Event, EventDraft, SequenceRange};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::query::EventQuery;
use crate::sealer::EventSealer;
use crate::state::LedgerState;
use crate::traits::{LedgerReader, LedgerStats, LedgerWriter, RollbackControl, StoredEvent};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// One durable mutation.
///
/// On-disk frame:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (JSON-serialized JournalRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum JournalRecord {
    Event(Event),
    Orphaned(SequenceRange),
    Head(u64),
    Rollback {
        orphaned: Option<SequenceRange>,
        head: u64,
    },
}

struct JournalInner {
    state: LedgerState,
    writer: BufWriter<JournalFile>,
    offset: u64,
    /// Set when a failed write could not be rolled back. The file may hold
    /// a partial frame past `offset`, so further writes are refused.
    wedged: bool,
}

/// Append handle for the journal file.
struct JournalFile {
    file: File,
    /// Bytes left before writes start failing.
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl JournalFile {
    fn open_append(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: OpenOptions::new().append(true).open(path)?,
            #[cfg(test)]
            fail_after: None,
        })
    }
}

impl Write for JournalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        #[cfg(test)]
        if let Some(budget) = self.fail_after.as_mut() {
            if *budget == 0 {
                return Err(io::Error::other("write failed"));
            }
            let n = buf.len().min(*budget);
            *budget -= n;
            return self.file.write(&buf[..n]);
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Durable ledger backed by an append-only journal file.
///
/// Every mutation is validated against the in-memory state, framed, written,
/// and flushed before the state changes, so a failed write leaves the ledger
/// exactly as it was. On open the journal is replayed front-to-back and every
/// event is re-hashed and re-linked. A torn record at the very end (a crash
/// mid-write) is dropped with a warning and the file truncated; damage
/// anywhere else is a hard error, since skipping a record would break the
/// chain. A write that fails part-way is cut back to the last good frame
/// before the error is returned.
pub struct JournalLedger {
    path: PathBuf,
    sealer: EventSealer,
    inner: RwLock<JournalInner>,
}

impl JournalLedger {
    /// Open (or create) the journal at `path` and replay it.
    pub fn open(path: &Path, sealer: EventSealer) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let (records, valid_len) = read_frames(path)?;
        let mut state = LedgerState::default();
        for record in records {
            replay(&mut state, record)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "dropping torn journal tail"
            );
            file.set_len(valid_len)?;
        }
        drop(file);

        let file = JournalFile::open_append(path)?;
        let stats = state.stats();
        info!(
            path = %path.display(),
            events = stats.total_events,
            orphaned = stats.orphaned_events,
            head = stats.head,
            "journal recovered"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sealer,
            inner: RwLock::new(JournalInner {
                state,
                writer: BufWriter::new(file),
                offset: valid_len,
                wedged: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sealer(&self) -> &EventSealer {
        &self.sealer
    }

    /// Bytes of valid journal written so far.
    pub fn offset(&self) -> LedgerResult<u64> {
        Ok(self.read()?.offset)
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, JournalInner>> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, JournalInner>> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn persist(&self, inner: &mut JournalInner, record: &JournalRecord) -> LedgerResult<()> {
        if inner.wedged {
            return Err(LedgerError::Storage(format!(
                "journal {} has an unrecovered partial write",
                self.path.display()
            )));
        }
        let frame = encode_frame(record)?;
        if let Err(e) = self.write_frame(inner, &frame) {
            warn!(offset = inner.offset, error = %e, "journal write failed, discarding partial frame");
            if let Err(reset) = self.discard_partial(inner) {
                warn!(error = %reset, "could not cut journal back to last good frame");
                inner.wedged = true;
            }
            return Err(e.into());
        }
        debug!(offset = inner.offset, len = frame.len(), "journal append");
        inner.offset += frame.len() as u64;
        Ok(())
    }

    fn write_frame(&self, inner: &mut JournalInner, frame: &[u8]) -> io::Result<()> {
        inner.writer.write_all(frame)?;
        inner.writer.flush()?;
        if self.sealer.config().sync_on_write {
            inner.writer.get_ref().file.sync_data()?;
        }
        Ok(())
    }

    /// Drop buffered bytes, truncate to the last good frame, and reopen the
    /// append handle.
    fn discard_partial(&self, inner: &mut JournalInner) -> io::Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(inner.offset)?;
        file.sync_data()?;
        let fresh = BufWriter::new(JournalFile::open_append(&self.path)?);
        let (_, _unwritten) = std::mem::replace(&mut inner.writer, fresh).into_parts();
        Ok(())
    }
}

impl LedgerWriter for JournalLedger {
    fn append(&self, draft: EventDraft) -> LedgerResult<Event> {
        self.sealer.check_draft(&draft)?;

        let mut inner = self.write()?;
        let (sequence, prev_hash) = inner.state.next_position()?;
        let event = self.sealer.seal(draft, sequence, prev_hash)?;
        inner.state.check_append(&event)?;

        self.persist(&mut inner, &JournalRecord::Event(event.clone()))?;
        inner.state.apply_append(event.clone());

        debug!(
            sequence,
            event_type = %event.event_type,
            hash = %event.content_hash.short_hex(),
            "event appended"
        );
        Ok(event)
    }
}

impl LedgerReader for JournalLedger {
    fn get_by_sequence(&self, sequence: u64, include_orphaned: bool) -> LedgerResult<Option<StoredEvent>> {
        Ok(self.read()?.state.get(sequence, include_orphaned))
    }

    fn get_by_id(&self, event_id: &Uuid, include_orphaned: bool) -> LedgerResult<Option<StoredEvent>> {
        Ok(self.read()?.state.get_by_id(event_id, include_orphaned))
    }

    fn get_latest(&self) -> LedgerResult<Option<Event>> {
        Ok(self.read()?.state.latest())
    }

    fn get_max_sequence(&self) -> LedgerResult<u64> {
        Ok(self.read()?.state.max_sequence())
    }

    fn head(&self) -> LedgerResult<u64> {
        Ok(self.read()?.state.head())
    }

    fn read_range(&self, start: u64, end: u64, include_orphaned: bool) -> LedgerResult<Vec<StoredEvent>> {
        self.read()?.state.range(start, end, include_orphaned)
    }

    fn query(&self, query: &EventQuery) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self.read()?.state.query(query))
    }

    fn authorized_gaps(&self) -> LedgerResult<Vec<SequenceRange>> {
        Ok(self.read()?.state.gaps())
    }

    fn verify_sequence_continuity(&self, start: u64, end: u64) -> LedgerResult<(bool, Vec<u64>)> {
        self.read()?.state.continuity(start, end)
    }

    fn stats(&self) -> LedgerResult<LedgerStats> {
        Ok(self.read()?.state.stats())
    }

    fn valid_prefix(&self, up_to: u64) -> LedgerResult<(u64, Vec<Event>)> {
        Ok(self.read()?.state.valid_prefix(up_to))
    }
}

impl RollbackControl for JournalLedger {
    fn mark_orphaned(&self, start: u64, end: u64) -> LedgerResult<u64> {
        let mut inner = self.write()?;
        inner.state.check_orphan(start, end)?;
        self.persist(&mut inner, &JournalRecord::Orphaned(SequenceRange::new(start, end)))?;
        let count = inner.state.apply_orphan(start, end);
        info!(start, end, count, "events orphaned");
        Ok(count)
    }

    fn set_head(&self, sequence: u64) -> LedgerResult<()> {
        let mut inner = self.write()?;
        inner.state.check_set_head(sequence)?;
        self.persist(&mut inner, &JournalRecord::Head(sequence))?;
        inner.state.apply_set_head(sequence);
        info!(head = sequence, "HEAD moved");
        Ok(())
    }

    fn rollback_to(&self, sequence: u64) -> LedgerResult<u64> {
        let mut inner = self.write()?;
        let orphaned = inner.state.check_rollback(sequence)?;
        self.persist(
            &mut inner,
            &JournalRecord::Rollback {
                orphaned,
                head: sequence,
            },
        )?;
        let count = inner.state.apply_rollback(orphaned, sequence);
        info!(head = sequence, orphaned = count, "rolled back");
        Ok(count)
    }
}

fn encode_frame(record: &JournalRecord) -> LedgerResult<Vec<u8>> {
    let payload = serde_json::to_vec(record)?;
    let length = u32::try_from(payload.len())
        .map_err(|_| LedgerError::Serialization("journal record exceeds 4 GiB".into()))?;
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode every intact frame. Returns the records and the byte length they
/// occupy; anything after that length is a torn tail.
///
/// Only the final frame can be torn: a short header, a zero-filled tail, a
/// length running past EOF with no intact frame after it, or a CRC failure
/// on a frame ending exactly at EOF. Anything else is corruption.
fn read_frames(path: &Path) -> LedgerResult<(Vec<JournalRecord>, u64)> {
    let mut bytes = Vec::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_end(&mut bytes)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((vec![], 0)),
        Err(e) => return Err(e.into()),
    }

    let corrupt = |offset: usize, reason: &str| {
        LedgerError::Storage(format!("journal {} corrupt at offset {offset}: {reason}", path.display()))
    };

    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < HEADER_SIZE {
            warn!(offset, remaining, "truncated journal header");
            break;
        }
        let header = &bytes[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let end = offset + HEADER_SIZE + length;

        if length == 0 {
            if bytes[offset..].iter().all(|b| *b == 0) {
                warn!(offset, remaining, "zero-filled journal tail");
                break;
            }
            return Err(corrupt(offset, "zero-length record"));
        }

        if end > bytes.len() {
            if has_intact_frame_after(&bytes, offset + HEADER_SIZE) {
                return Err(corrupt(offset, "record length runs past later records"));
            }
            warn!(offset, length, file_len = bytes.len(), "truncated journal record");
            break;
        }

        let payload = &bytes[offset + HEADER_SIZE..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            if end == bytes.len() {
                warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch in final journal record");
                break;
            }
            return Err(corrupt(offset, "CRC mismatch"));
        }

        let record: JournalRecord = serde_json::from_slice(payload).map_err(|e| {
            LedgerError::Serialization(format!("journal record at offset {offset}: {e}"))
        })?;
        records.push(record);
        offset = end;
    }

    Ok((records, offset as u64))
}

/// Returns `true` if a complete, CRC-valid frame starts anywhere at or
/// after `from`.
fn has_intact_frame_after(bytes: &[u8], from: usize) -> bool {
    (from..bytes.len().saturating_sub(HEADER_SIZE)).any(|start| {
        let header = &bytes[start..start + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let body = start + HEADER_SIZE;
        if length == 0 || bytes.len() - body < length || bytes[body] != b'{' {
            return false;
        }
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        crc32fast::hash(&bytes[body..body + length]) == crc
    })
}

/// Re-apply a recovered record through the same checks a live mutation
/// passes.
fn replay(state: &mut LedgerState, record: JournalRecord) -> LedgerResult<()> {
    match record {
        JournalRecord::Event(event) => {
            state.check_append(&event)?;
            state.apply_append(event);
        }
        JournalRecord::Orphaned(range) => {
            state.check_orphan(range.start, range.end)?;
            state.apply_orphan(range.start, range.end);
        }
        JournalRecord::Head(sequence) => {
            state.check_set_head(sequence)?;
            state.apply_set_head(sequence);
        }
        JournalRecord::Rollback { orphaned, head } => {
            let expected = state.check_rollback(head)?;
            if expected != orphaned {
                return Err(LedgerError::IntegrityViolation {
                    sequence: head,
                    reason: "journal rollback record does not match recovered state".into(),
                });
            }
            state.apply_rollback(orphaned, head);
        }
    }
    Ok(())
}
