//! Append-only, hash-chained event store.
//!
//! The store is an arena of events addressed by sequence number plus an index
//! (HEAD and the orphan set) layered over it. Appends extend the arena;
//! rollback only moves the index. Nothing is ever overwritten or removed.
//!
//! Three trait seams split the surface by capability:
//!
//! - [`LedgerWriter`]: `append` and nothing else
//! - [`LedgerReader`]: point reads, ranges, queries, continuity, streams
//! - [`RollbackControl`]: orphan ranges and move HEAD
//!
//! [`InMemoryLedger`] keeps everything in memory; [`JournalLedger`] adds a
//! CRC-framed journal file that is replayed and re-verified on open.

pub mod authority;
pub mod config;
pub mod continuity;
pub mod error;
pub mod journal;
pub mod memory;
pub mod query;
pub mod sealer;
pub mod signer;
mod state;
pub mod stream;
pub mod traits;

pub use authority::{FixedTimeAuthority, SystemTimeAuthority, TimeAuthority};
pub use config::{LedgerConfig, DEFAULT_DISALLOWED_PREFIXES};
pub use continuity::{continuity_in_range, sequence_continuity};
pub use error::{LedgerError, LedgerResult};
pub use journal::{JournalLedger, JournalRecord};
pub use memory::InMemoryLedger;
pub use query::EventQuery;
pub use sealer::EventSealer;
pub use signer::{EventSigner, SignatureVerifier};
pub use stream::EventStream;
pub use traits::{LedgerReader, LedgerStats, LedgerWriter, RollbackControl, StoredEvent};
