use charter_crypto::{Signature, SigningKey, VerifyingKey};
use charter_types::{Event, EventHash, SYSTEM_AGENT};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Holds the keys that sign every appended event.
///
/// The agent key signs the content hash. The witness key countersigns the
/// content hash together with the agent signature, so a witness signature
/// cannot be moved onto a different agent signature.
pub struct EventSigner {
    agent_key: SigningKey,
    witness_id: String,
    witness_key: SigningKey,
}

impl EventSigner {
    pub fn new(agent_key: SigningKey, witness_id: Uuid, witness_key: SigningKey) -> Self {
        Self {
            agent_key,
            witness_id: witness_id.to_string(),
            witness_key,
        }
    }

    /// Signer whose witness is the platform itself.
    pub fn system(agent_key: SigningKey, witness_key: SigningKey) -> Self {
        Self {
            agent_key,
            witness_id: SYSTEM_AGENT.to_string(),
            witness_key,
        }
    }

    /// Fresh random keys and a fresh witness identity.
    pub fn ephemeral() -> Self {
        Self::new(
            SigningKey::generate(),
            Uuid::now_v7(),
            SigningKey::generate(),
        )
    }

    pub fn witness_id(&self) -> &str {
        &self.witness_id
    }

    /// Public half of both keys, for offline signature checks.
    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier {
            agent: self.agent_key.verifying_key(),
            witness: self.witness_key.verifying_key(),
        }
    }

    /// Returns `(signature, witness_signature)` as hex.
    pub fn sign(&self, content_hash: &EventHash) -> (String, String) {
        let signature = self.agent_key.sign(content_hash.as_bytes());
        let witness = self
            .witness_key
            .sign(&witness_message(content_hash, &signature));
        (signature.to_hex(), witness.to_hex())
    }
}

impl std::fmt::Debug for EventSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSigner")
            .field("witness_id", &self.witness_id)
            .finish_non_exhaustive()
    }
}

/// Checks event signatures against known public keys.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    pub agent: VerifyingKey,
    pub witness: VerifyingKey,
}

impl SignatureVerifier {
    pub fn verify_event(&self, event: &Event) -> LedgerResult<()> {
        let signature = Signature::from_hex(&event.signature)?;
        self.agent
            .verify(event.content_hash.as_bytes(), &signature)
            .map_err(|e| LedgerError::IntegrityViolation {
                sequence: event.sequence,
                reason: format!("agent signature: {e}"),
            })?;

        let witness = Signature::from_hex(&event.witness_signature)?;
        self.witness
            .verify(&witness_message(&event.content_hash, &signature), &witness)
            .map_err(|e| LedgerError::IntegrityViolation {
                sequence: event.sequence,
                reason: format!("witness signature: {e}"),
            })
    }
}

fn witness_message(content_hash: &EventHash, signature: &Signature) -> Vec<u8> {
    let mut message = content_hash.as_bytes().to_vec();
    message.extend_from_slice(signature.to_hex().as_bytes());
    message
}
