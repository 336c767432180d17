use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use charter_crypto::{content_hash, merkle_root, HashChainVerifier, SigningKey};
use charter_ledger::{EventStream, LedgerReader, TimeAuthority};
use charter_types::{
    AttestationMetadata, Event, EventHash, ExportMetadata, ExportVerification, LedgerExport,
    GENESIS_HASH, HASH_ALGORITHM_VERSION, SYSTEM_AGENT,
};

use crate::attestation::sign_attestation;
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::pii::PiiGuard;

/// Produces complete ledger exports and attestation metadata.
///
/// Exports are all-or-nothing: every valid event is read, screened, and
/// cross-checked against the ledger's authorized gaps before anything is
/// returned. There are no filter or paging parameters.
pub struct Exporter {
    ledger: Arc<dyn LedgerReader>,
    authority: Arc<dyn TimeAuthority>,
    config: ExportConfig,
    guard: PiiGuard,
    exporter_id: String,
    signing_key: Option<SigningKey>,
}

impl Exporter {
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        authority: Arc<dyn TimeAuthority>,
        config: ExportConfig,
    ) -> Self {
        Self {
            ledger,
            authority,
            config,
            guard: PiiGuard::default(),
            exporter_id: SYSTEM_AGENT.to_string(),
            signing_key: None,
        }
    }

    /// Sign every generated attestation with `key`.
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn with_guard(mut self, guard: PiiGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Identity stamped on attestations. Must be a UUID or `"system"`.
    pub fn with_exporter_id(mut self, exporter_id: impl Into<String>) -> ExportResult<Self> {
        let exporter_id = exporter_id.into();
        self.guard.check_attribution("exporter_id", &exporter_id, None)?;
        self.exporter_id = exporter_id;
        Ok(self)
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export every valid event, in sequence order.
    ///
    /// Fails with `PiiDetected` on the first personal-data hit and with
    /// `PartialExport` if the collected events do not match `1..=last`
    /// minus the authorized gaps.
    pub fn export_complete(&self, requester_id: &str) -> ExportResult<LedgerExport> {
        self.config.validate()?;
        self.guard
            .check_attribution("requested_by", requester_id, None)?;

        let mut events: Vec<Event> = Vec::new();
        for event in EventStream::new(&*self.ledger, self.config.batch_size)? {
            let event = event?;
            self.guard.check_event(&event)?;
            events.push(event);
        }

        let last = events.last().map_or(0, |e| e.sequence);
        let first = events.first().map_or(0, |e| e.sequence);
        let authorized_gaps = self
            .ledger
            .authorized_gaps()?
            .into_iter()
            .filter(|gap| gap.start <= last)
            .collect();
        let latest_hash = events.last().map_or(GENESIS_HASH, |e| e.content_hash);

        let chain_valid = chain_is_intact(&events);
        let leaves: Vec<EventHash> = events.iter().map(|e| e.content_hash).collect();
        let verification = ExportVerification {
            hash_algorithm: HASH_ALGORITHM_VERSION.to_string(),
            chain_valid,
            genesis_to_latest: chain_valid
                && events.first().map_or(true, |e| e.prev_hash.is_genesis()),
            merkle_root: merkle_root(&leaves),
        };

        let export = LedgerExport {
            metadata: ExportMetadata {
                export_id: Uuid::now_v7(),
                exported_at: self.authority.now(),
                format_version: self.config.format_version.clone(),
                total_events: events.len() as u64,
                genesis_hash: GENESIS_HASH,
                latest_hash,
                sequence_range: (first, last),
                authorized_gaps,
                requested_by: requester_id.to_string(),
            },
            events,
            verification,
        };

        check_completeness(&export)?;
        tracing::info!(
            export_id = %export.metadata.export_id,
            total_events = export.metadata.total_events,
            first,
            last,
            chain_valid,
            "ledger exported"
        );
        Ok(export)
    }

    /// Summarize `start..=end` for a third-party attestation.
    ///
    /// `chain_hash_at_export` is the content hash of the valid event at
    /// `end`, or the genesis hash for the empty range `(0, 0)`.
    pub fn generate_attestation_metadata(
        &self,
        start: u64,
        end: u64,
        event_count: u64,
        filters: Option<BTreeMap<String, String>>,
    ) -> ExportResult<AttestationMetadata> {
        let empty = start == 0 && end == 0;
        if !empty && (start == 0 || end < start) {
            return Err(ExportError::InvalidRange { start, end });
        }
        if event_count > end.saturating_sub(start) + u64::from(!empty) {
            return Err(ExportError::InvalidRange { start, end });
        }

        let chain_hash_at_export = if empty {
            GENESIS_HASH
        } else {
            self.ledger
                .get_by_sequence(end, false)?
                .map(|stored| stored.event.content_hash)
                .ok_or(ExportError::InvalidRange { start, end })?
        };

        let mut attestation = AttestationMetadata {
            export_id: Uuid::now_v7(),
            exported_at: self.authority.now(),
            sequence_start: start,
            sequence_end: end,
            event_count,
            chain_hash_at_export,
            exporter_id: self.exporter_id.clone(),
            filters,
            export_signature: None,
        };
        if let Some(ref key) = self.signing_key {
            sign_attestation(&mut attestation, key)?;
        }
        tracing::debug!(
            export_id = %attestation.export_id,
            start,
            end,
            signed = attestation.export_signature.is_some(),
            "attestation generated"
        );
        Ok(attestation)
    }

    /// Attestation for a finished export, sharing its id and timestamp.
    pub fn attest(&self, export: &LedgerExport) -> ExportResult<AttestationMetadata> {
        let (start, end) = export.metadata.sequence_range;
        let mut attestation = AttestationMetadata {
            export_id: export.metadata.export_id,
            exported_at: export.metadata.exported_at,
            sequence_start: start,
            sequence_end: end,
            event_count: export.metadata.total_events,
            chain_hash_at_export: export.metadata.latest_hash,
            exporter_id: self.exporter_id.clone(),
            filters: None,
            export_signature: None,
        };
        if let Some(ref key) = self.signing_key {
            sign_attestation(&mut attestation, key)?;
        }
        Ok(attestation)
    }
}

/// Links run from genesis and every stored hash matches its recomputation.
fn chain_is_intact(events: &[Event]) -> bool {
    HashChainVerifier::verify_from_genesis(events).is_ok()
        && events
            .iter()
            .all(|e| content_hash(e).is_ok_and(|computed| computed == e.content_hash))
}

/// Self-check run on every export before it is returned.
pub fn check_completeness(export: &LedgerExport) -> ExportResult<()> {
    let meta = &export.metadata;
    let actual: Vec<u64> = export.events.iter().map(|e| e.sequence).collect();

    if meta.total_events != actual.len() as u64 {
        return Err(ExportError::PartialExport(format!(
            "total_events is {} but {} events are present",
            meta.total_events,
            actual.len()
        )));
    }
    let range = (
        actual.first().copied().unwrap_or(0),
        actual.last().copied().unwrap_or(0),
    );
    if meta.sequence_range != range {
        return Err(ExportError::PartialExport(format!(
            "sequence_range {:?} does not match events {:?}",
            meta.sequence_range, range
        )));
    }

    let missing: Vec<String> = meta
        .missing_ranges(&actual)
        .iter()
        .map(|r| format!("{}..={}", r.start, r.end))
        .collect();
    let expected = meta.expected_count();
    if !missing.is_empty() || expected != actual.len() as u64 {
        return Err(ExportError::PartialExport(format!(
            "expected {} sequences, found {}; missing {:?}",
            expected,
            actual.len(),
            missing
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_ledger::{
        InMemoryLedger, LedgerWriter, RollbackControl, SystemTimeAuthority,
    };
    use charter_types::{EventDraft, Payload};
    use serde_json::json;

    use crate::attestation::verify_signature;
    use crate::error::PiiKind;

    fn ledger_with(n: u64) -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::default());
        append(&ledger, n);
        ledger
    }

    fn append(ledger: &InMemoryLedger, n: u64) {
        for i in 0..n {
            let mut payload = Payload::new();
            payload.insert("petition".into(), json!(format!("p-{i}")));
            ledger
                .append(EventDraft::system("petition.filed", payload))
                .unwrap();
        }
    }

    fn exporter(ledger: &Arc<InMemoryLedger>, batch_size: usize) -> Exporter {
        let reader: Arc<dyn LedgerReader> = ledger.clone();
        Exporter::new(
            reader,
            Arc::new(SystemTimeAuthority),
            ExportConfig {
                batch_size,
                ..ExportConfig::default()
            },
        )
    }

    #[test]
    fn empty_ledger_exports_cleanly() {
        let ledger = ledger_with(0);
        let export = exporter(&ledger, 10).export_complete("system").unwrap();
        assert_eq!(export.metadata.total_events, 0);
        assert_eq!(export.metadata.sequence_range, (0, 0));
        assert!(export.events.is_empty());
        assert_eq!(export.metadata.latest_hash, GENESIS_HASH);
        assert!(export.verification.chain_valid);
        assert!(check_completeness(&export).is_ok());
    }

    #[test]
    fn full_export_covers_every_event() {
        let ledger = ledger_with(7);
        let export = exporter(&ledger, 1000).export_complete("system").unwrap();
        assert_eq!(export.metadata.total_events, 7);
        assert_eq!(export.metadata.sequence_range, (1, 7));
        assert_eq!(export.metadata.latest_hash, export.events[6].content_hash);
        assert!(export.verification.chain_valid);
        assert!(export.verification.genesis_to_latest);
        assert_eq!(export.verification.merkle_root, merkle_root(&export.leaves()));
    }

    #[test]
    fn batch_size_does_not_change_the_export() {
        let ledger = ledger_with(11);
        let small = exporter(&ledger, 2).export_complete("system").unwrap();
        let large = exporter(&ledger, 500).export_complete("system").unwrap();
        assert_eq!(small.events, large.events);
        assert_eq!(small.verification, large.verification);
    }

    #[test]
    fn batch_size_bounds() {
        let ledger = ledger_with(4);
        let err = exporter(&ledger, 0).export_complete("system").unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
        let export = exporter(&ledger, usize::MAX).export_complete("system").unwrap();
        assert_eq!(export.metadata.total_events, 4);
    }

    #[test]
    fn payload_email_aborts_export() {
        let ledger = ledger_with(2);
        let mut payload = Payload::new();
        payload.insert("note".into(), json!("contact jane@example.com"));
        ledger
            .append(EventDraft::system("petition.annotated", payload))
            .unwrap();

        let err = exporter(&ledger, 10).export_complete("system").unwrap_err();
        match err {
            ExportError::PiiDetected {
                sequence,
                field,
                kind,
            } => {
                assert_eq!(sequence, Some(3));
                assert_eq!(field, "payload.note");
                assert_eq!(kind, PiiKind::EmailAddress);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn free_form_requester_is_rejected() {
        let ledger = ledger_with(1);
        let err = exporter(&ledger, 10)
            .export_complete("Jane Doe")
            .unwrap_err();
        assert!(matches!(err, ExportError::PiiDetected { .. }));
        assert!(exporter(&ledger, 10)
            .export_complete(&Uuid::now_v7().to_string())
            .is_ok());
    }

    #[test]
    fn rollback_gaps_are_documented() {
        let ledger = ledger_with(10);
        ledger.rollback_to(5).unwrap();
        append(&ledger, 2);
        let export = exporter(&ledger, 3).export_complete("system").unwrap();
        assert_eq!(export.metadata.total_events, 7);
        assert_eq!(export.metadata.sequence_range, (1, 12));
        assert_eq!(export.metadata.authorized_gaps.len(), 1);
        assert_eq!(export.metadata.authorized_gaps[0].start, 6);
        assert_eq!(export.metadata.authorized_gaps[0].end, 10);
        assert!(export.verification.chain_valid);
    }

    #[test]
    fn rollback_of_the_tail_leaves_gap_out_of_range() {
        let ledger = ledger_with(6);
        ledger.rollback_to(4).unwrap();
        let export = exporter(&ledger, 3).export_complete("system").unwrap();
        assert_eq!(export.metadata.sequence_range, (1, 4));
        assert!(export.metadata.authorized_gaps.is_empty());
    }

    #[test]
    fn self_check_catches_missing_events() {
        let ledger = ledger_with(5);
        let mut export = exporter(&ledger, 10).export_complete("system").unwrap();
        export.events.remove(2);
        export.metadata.total_events = 4;
        let err = check_completeness(&export).unwrap_err();
        assert!(matches!(err, ExportError::PartialExport(ref m) if m.contains("3..=3")));

        export.metadata.total_events = 5;
        assert!(matches!(
            check_completeness(&export),
            Err(ExportError::PartialExport(_))
        ));
    }

    #[test]
    fn attestation_binds_range_and_chain_hash() {
        let ledger = ledger_with(6);
        let key = SigningKey::generate();
        let public = key.verifying_key();
        let exporter = exporter(&ledger, 10).with_signing_key(key);

        let mut filters = BTreeMap::new();
        filters.insert("event_types".to_string(), "petition.filed".to_string());
        let att = exporter
            .generate_attestation_metadata(2, 4, 3, Some(filters))
            .unwrap();
        let at_four = ledger.get_by_sequence(4, false).unwrap().unwrap();
        assert_eq!(att.chain_hash_at_export, at_four.event.content_hash);
        assert_eq!(att.exporter_id, "system");
        assert!(verify_signature(&att, &public).is_ok());
    }

    #[test]
    fn attestation_rejects_bad_ranges() {
        let ledger = ledger_with(3);
        let exporter = exporter(&ledger, 10);
        assert!(exporter.generate_attestation_metadata(3, 2, 0, None).is_err());
        assert!(exporter.generate_attestation_metadata(1, 2, 5, None).is_err());
        assert!(exporter.generate_attestation_metadata(1, 9, 1, None).is_err());
        let empty = exporter.generate_attestation_metadata(0, 0, 0, None).unwrap();
        assert_eq!(empty.chain_hash_at_export, GENESIS_HASH);
        assert!(empty.export_signature.is_none());
    }

    #[test]
    fn attest_reuses_export_identity() {
        let ledger = ledger_with(4);
        let exporter = exporter(&ledger, 10);
        let export = exporter.export_complete("system").unwrap();
        let att = exporter.attest(&export).unwrap();
        assert_eq!(att.export_id, export.metadata.export_id);
        assert_eq!(att.sequence_end, 4);
        assert_eq!(att.chain_hash_at_export, export.metadata.latest_hash);
    }

    #[test]
    fn exporter_id_must_be_opaque() {
        let ledger = ledger_with(0);
        assert!(exporter(&ledger, 10).with_exporter_id("auditor bob").is_err());
    }
}
