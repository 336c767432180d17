use std::sync::Arc;

use charter_crypto::content_hash;
use charter_types::{is_valid_attribution, validate_event_type, Event, EventDraft, EventHash};
use uuid::Uuid;

use crate::authority::TimeAuthority;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::signer::EventSigner;

/// Turns drafts into sealed events: position, timestamps, hash, signatures.
pub struct EventSealer {
    config: LedgerConfig,
    signer: EventSigner,
    authority: Arc<dyn TimeAuthority>,
}

impl EventSealer {
    pub fn new(config: LedgerConfig, signer: EventSigner, authority: Arc<dyn TimeAuthority>) -> Self {
        Self {
            config,
            signer,
            authority,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn signer(&self) -> &EventSigner {
        &self.signer
    }

    /// Reject drafts the ledger must never store. Runs before a sequence is
    /// assigned, so a rejected draft leaves no trace.
    pub fn check_draft(&self, draft: &EventDraft) -> LedgerResult<()> {
        if self.config.is_disallowed(&draft.event_type) {
            return Err(LedgerError::DisallowedEventType(draft.event_type.clone()));
        }
        validate_event_type(&draft.event_type).map_err(|e| match e {
            charter_types::TypeError::InvalidEventType { event_type, reason } => {
                LedgerError::InvalidEventType { event_type, reason }
            }
            other => LedgerError::InvalidEventType {
                event_type: draft.event_type.clone(),
                reason: other.to_string(),
            },
        })?;
        if !is_valid_attribution(&draft.agent_id) {
            return Err(LedgerError::InvalidAttribution(draft.agent_id.clone()));
        }
        Ok(())
    }

    /// Seal `draft` at `sequence`, linked to `prev_hash`.
    pub fn seal(&self, draft: EventDraft, sequence: u64, prev_hash: EventHash) -> LedgerResult<Event> {
        let mut event = Event {
            event_id: Uuid::now_v7(),
            sequence,
            event_type: draft.event_type,
            payload: draft.payload,
            content_hash: EventHash::genesis(),
            prev_hash,
            signature: String::new(),
            agent_id: draft.agent_id,
            witness_id: self.signer.witness_id().to_string(),
            witness_signature: String::new(),
            local_timestamp: draft.local_timestamp,
            authority_timestamp: self.authority.now(),
            hash_algorithm_version: self.config.hash_algorithm_version.clone(),
            signature_algorithm_version: self.config.signature_algorithm_version.clone(),
        };
        event.content_hash = content_hash(&event)?;
        let (signature, witness_signature) = self.signer.sign(&event.content_hash);
        event.signature = signature;
        event.witness_signature = witness_signature;
        Ok(event)
    }
}
