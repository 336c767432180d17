use std::fs;
use std::sync::Arc;

use charter_export::Exporter;
use charter_ledger::{
    EventQuery, EventSealer, EventSigner, InMemoryLedger, JournalLedger, LedgerReader,
    LedgerStats, LedgerWriter, RollbackControl, SignatureVerifier, StoredEvent,
    SystemTimeAuthority, TimeAuthority,
};
use charter_proof::CheckpointService;
use charter_types::{
    AnchorType, AttestationMetadata, Checkpoint, Event, EventDraft, InclusionProof, LedgerExport,
    VerificationResult,
};
use tracing::{info, warn};

use crate::config::CharterConfig;
use crate::error::{SdkError, SdkResult};
use crate::halt::{HaltChecker, NeverHalted};
use crate::keys::{KeyFile, KEY_FILE};
use crate::store::{CheckpointFile, CHECKPOINT_FILE};

/// Assembles a [`LedgerContext`].
///
/// Collaborators default to the system clock and a halt checker that never
/// halts.
pub struct ContextBuilder {
    config: CharterConfig,
    authority: Arc<dyn TimeAuthority>,
    halt: Arc<dyn HaltChecker>,
    keys: Option<KeyFile>,
}

impl ContextBuilder {
    pub fn new(config: CharterConfig) -> Self {
        Self {
            config,
            authority: Arc::new(SystemTimeAuthority),
            halt: Arc::new(NeverHalted),
            keys: None,
        }
    }

    pub fn time_authority(mut self, authority: Arc<dyn TimeAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn halt_checker(mut self, halt: Arc<dyn HaltChecker>) -> Self {
        self.halt = halt;
        self
    }

    /// Use these keys instead of the data directory's key file.
    pub fn keys(mut self, keys: KeyFile) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Volatile context. Keys are freshly generated unless supplied.
    pub fn in_memory(self) -> SdkResult<LedgerContext> {
        self.config.validate()?;
        let keys = self.keys.clone().unwrap_or_else(KeyFile::generate);
        let sealer = self.sealer(keys.event_signer()?);
        let ledger = Arc::new(InMemoryLedger::new(sealer));
        self.assemble(ledger, &keys, None)
    }

    /// Durable context rooted at `config.ledger.data_dir`: the journal, the
    /// key file, and the checkpoint registry all live there. Missing files
    /// are created.
    pub fn open(self) -> SdkResult<LedgerContext> {
        self.config.validate()?;
        let data_dir = self.config.ledger.data_dir.clone();
        fs::create_dir_all(&data_dir)?;

        let keys = match self.keys.clone() {
            Some(keys) => keys,
            None => KeyFile::load_or_generate(&data_dir.join(KEY_FILE))?,
        };
        let sealer = self.sealer(keys.event_signer()?);
        let ledger = Arc::new(JournalLedger::open(&self.config.ledger.journal_path(), sealer)?);
        let checkpoints = CheckpointFile::new(data_dir.join(CHECKPOINT_FILE));
        self.assemble(ledger, &keys, Some(checkpoints))
    }

    fn sealer(&self, signer: EventSigner) -> EventSealer {
        EventSealer::new(self.config.ledger.clone(), signer, self.authority.clone())
    }

    fn assemble<L>(
        self,
        ledger: Arc<L>,
        keys: &KeyFile,
        checkpoint_file: Option<CheckpointFile>,
    ) -> SdkResult<LedgerContext>
    where
        L: LedgerWriter + LedgerReader + RollbackControl + 'static,
    {
        let reader: Arc<dyn LedgerReader> = ledger.clone();
        let published = match checkpoint_file {
            Some(ref file) => file.load()?,
            None => Vec::new(),
        };
        let checkpoints =
            CheckpointService::with_checkpoints(reader.clone(), self.authority.clone(), published);
        let exporter = Exporter::new(reader.clone(), self.authority.clone(), self.config.export.clone())
            .with_signing_key(keys.export_signing_key()?);

        info!(
            head = reader.head()?,
            checkpoints = checkpoints.list_checkpoints()?.len(),
            durable = checkpoint_file.is_some(),
            witness_id = %keys.witness_id,
            "ledger context ready"
        );

        Ok(LedgerContext {
            signatures: keys.event_signer()?.verifier(),
            config: self.config,
            writer: ledger.clone(),
            rollback: ledger,
            reader,
            checkpoints,
            checkpoint_file,
            exporter,
            halt: self.halt,
        })
    }
}

/// Explicit application context: one ledger, its checkpoints, and its
/// exporter, with the halt check applied to every write.
///
/// There is no global instance. Create one per ledger and pass it where it
/// is needed.
pub struct LedgerContext {
    config: CharterConfig,
    writer: Arc<dyn LedgerWriter>,
    rollback: Arc<dyn RollbackControl>,
    reader: Arc<dyn LedgerReader>,
    checkpoints: CheckpointService,
    checkpoint_file: Option<CheckpointFile>,
    exporter: Exporter,
    halt: Arc<dyn HaltChecker>,
    signatures: SignatureVerifier,
}

impl LedgerContext {
    pub fn builder(config: CharterConfig) -> ContextBuilder {
        ContextBuilder::new(config)
    }

    /// Volatile context with default configuration.
    pub fn in_memory() -> SdkResult<Self> {
        ContextBuilder::new(CharterConfig::default()).in_memory()
    }

    /// Durable context with default collaborators.
    pub fn open(config: CharterConfig) -> SdkResult<Self> {
        ContextBuilder::new(config).open()
    }

    pub fn config(&self) -> &CharterConfig {
        &self.config
    }

    /// Read access to the store.
    pub fn ledger(&self) -> &Arc<dyn LedgerReader> {
        &self.reader
    }

    pub fn checkpoints(&self) -> &CheckpointService {
        &self.checkpoints
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    pub fn signatures(&self) -> &SignatureVerifier {
        &self.signatures
    }

    fn ensure_writable(&self) -> SdkResult<()> {
        if self.halt.is_halted() {
            let reason = self
                .halt
                .halt_reason()
                .unwrap_or_else(|| "no reason given".to_string());
            return Err(SdkError::Halted(reason));
        }
        Ok(())
    }

    // ---- Writes ----

    /// Append one event, then publish a checkpoint if the configured cadence
    /// has been reached.
    ///
    /// If the event lands but the checkpoint does not, the result is
    /// [`SdkError::CheckpointAfterAppend`] carrying the committed event.
    /// Retrying the append would write a second event.
    pub fn append(&self, draft: EventDraft) -> SdkResult<Event> {
        self.ensure_writable()?;
        let event = self.writer.append(draft)?;

        let every = self.config.checkpoint.every_events;
        if every == 0 {
            return Ok(event);
        }
        let published = self
            .checkpoints
            .pending_count()
            .map_err(SdkError::from)
            .and_then(|pending| {
                if pending >= every {
                    self.publish_checkpoint(event.sequence).map(|_| ())
                } else {
                    Ok(())
                }
            });
        match published {
            Ok(()) => Ok(event),
            Err(err) => {
                warn!(sequence = event.sequence, error = %err, "automatic checkpoint failed");
                Err(SdkError::CheckpointAfterAppend {
                    event: Box::new(event),
                    source: Box::new(err),
                })
            }
        }
    }

    /// Orphan everything above `sequence` and move HEAD there.
    ///
    /// Checkpoints covering orphaned events stay published but can no longer
    /// be proven against.
    pub fn rollback_to(&self, sequence: u64) -> SdkResult<u64> {
        self.ensure_writable()?;
        Ok(self.rollback.rollback_to(sequence)?)
    }

    pub fn mark_orphaned(&self, start: u64, end: u64) -> SdkResult<u64> {
        self.ensure_writable()?;
        Ok(self.rollback.mark_orphaned(start, end)?)
    }

    pub fn set_head(&self, sequence: u64) -> SdkResult<()> {
        self.ensure_writable()?;
        Ok(self.rollback.set_head(sequence)?)
    }

    /// Publish a checkpoint over `1..=up_to_sequence`.
    pub fn create_checkpoint(&self, up_to_sequence: u64) -> SdkResult<Checkpoint> {
        self.ensure_writable()?;
        self.publish_checkpoint(up_to_sequence)
    }

    /// Publish a checkpoint whose root has already been anchored as
    /// `anchor_type`.
    pub fn create_anchored_checkpoint(
        &self,
        up_to_sequence: u64,
        anchor_type: AnchorType,
    ) -> SdkResult<Checkpoint> {
        self.ensure_writable()?;
        self.publish(up_to_sequence, anchor_type)
    }

    fn publish_checkpoint(&self, up_to_sequence: u64) -> SdkResult<Checkpoint> {
        self.publish(up_to_sequence, AnchorType::Pending)
    }

    fn publish(&self, up_to_sequence: u64, anchor_type: AnchorType) -> SdkResult<Checkpoint> {
        let checkpoint = self
            .checkpoints
            .create_anchored_checkpoint(up_to_sequence, anchor_type)?;
        if let Some(ref file) = self.checkpoint_file {
            file.save(&self.checkpoints.list_checkpoints()?)?;
        }
        Ok(checkpoint)
    }

    // ---- Reads ----

    pub fn get(&self, sequence: u64, include_orphaned: bool) -> SdkResult<Option<StoredEvent>> {
        Ok(self.reader.get_by_sequence(sequence, include_orphaned)?)
    }

    pub fn read_range(
        &self,
        start: u64,
        end: u64,
        include_orphaned: bool,
    ) -> SdkResult<Vec<StoredEvent>> {
        Ok(self.reader.read_range(start, end, include_orphaned)?)
    }

    pub fn query(&self, query: &EventQuery) -> SdkResult<Vec<StoredEvent>> {
        Ok(self.reader.query(query)?)
    }

    pub fn continuity(&self, start: u64, end: u64) -> SdkResult<(bool, Vec<u64>)> {
        Ok(self.reader.verify_sequence_continuity(start, end)?)
    }

    pub fn stats(&self) -> SdkResult<LedgerStats> {
        Ok(self.reader.stats()?)
    }

    /// Merkle proof if a checkpoint covers `sequence`, otherwise a hash-chain
    /// proof to HEAD.
    pub fn prove(&self, sequence: u64) -> SdkResult<InclusionProof> {
        Ok(self.checkpoints.prove_inclusion(sequence)?)
    }

    // ---- Exports ----

    pub fn export_complete(&self, requester_id: &str) -> SdkResult<LedgerExport> {
        Ok(self.exporter.export_complete(requester_id)?)
    }

    /// Signed attestation for a finished export.
    pub fn attest(&self, export: &LedgerExport) -> SdkResult<AttestationMetadata> {
        Ok(self.exporter.attest(export)?)
    }

    /// Export everything and verify the export as an outside auditor would.
    pub fn audit(&self, requester_id: &str) -> SdkResult<VerificationResult> {
        let export = self.export_complete(requester_id)?;
        Ok(charter_verify::verify_complete(&export))
    }
}
