use std::fs;
use std::path::Path;

use charter_crypto::{SigningKey, VerifyingKey};
use charter_ledger::EventSigner;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SdkError, SdkResult};

/// File name of the key material inside the data directory.
pub const KEY_FILE: &str = "keys.json";

/// Private keys for one ledger instance, hex-encoded on disk.
///
/// `agent_key` signs event content hashes, `witness_key` countersigns them,
/// and `export_key` signs attestation metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    pub agent_key: String,
    pub witness_id: Uuid,
    pub witness_key: String,
    pub export_key: String,
}

impl KeyFile {
    pub fn generate() -> Self {
        Self {
            agent_key: SigningKey::generate().to_hex(),
            witness_id: Uuid::now_v7(),
            witness_key: SigningKey::generate().to_hex(),
            export_key: SigningKey::generate().to_hex(),
        }
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SdkError::Keys(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> SdkResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        restrict_permissions(path)?;
        Ok(())
    }

    /// Read `path`, or create and save a fresh key set if it does not exist.
    pub fn load_or_generate(path: &Path) -> SdkResult<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let keys = Self::generate();
        keys.save(path)?;
        tracing::info!(path = %path.display(), witness_id = %keys.witness_id, "generated ledger keys");
        Ok(keys)
    }

    pub fn event_signer(&self) -> SdkResult<EventSigner> {
        Ok(EventSigner::new(
            parse_key("agent_key", &self.agent_key)?,
            self.witness_id,
            parse_key("witness_key", &self.witness_key)?,
        ))
    }

    pub fn export_signing_key(&self) -> SdkResult<SigningKey> {
        parse_key("export_key", &self.export_key)
    }

    /// Public half of the export key, handed to auditors.
    pub fn export_verifying_key(&self) -> SdkResult<VerifyingKey> {
        Ok(self.export_signing_key()?.verifying_key())
    }
}

impl std::fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFile")
            .field("witness_id", &self.witness_id)
            .finish_non_exhaustive()
    }
}

fn parse_key(field: &str, hex: &str) -> SdkResult<SigningKey> {
    SigningKey::from_hex(hex).map_err(|e| SdkError::Keys(format!("{field}: {e}")))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> SdkResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> SdkResult<()> {
    Ok(())
}
