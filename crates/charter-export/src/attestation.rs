use charter_crypto::{Signature, SigningKey, VerifyingKey};
use charter_types::AttestationMetadata;

use crate::error::{ExportError, ExportResult};

/// Sign the canonical attestation bytes and store the hex signature.
pub fn sign_attestation(
    attestation: &mut AttestationMetadata,
    key: &SigningKey,
) -> ExportResult<()> {
    let bytes = attestation.signing_bytes()?;
    attestation.export_signature = Some(key.sign(&bytes).to_hex());
    Ok(())
}

/// Check `export_signature` against `key`. An unsigned attestation fails.
pub fn verify_signature(attestation: &AttestationMetadata, key: &VerifyingKey) -> ExportResult<()> {
    let Some(ref signature_hex) = attestation.export_signature else {
        return Err(ExportError::Signing("attestation is unsigned".into()));
    };
    let signature = Signature::from_hex(signature_hex)?;
    key.verify(&attestation.signing_bytes()?, &signature)?;
    Ok(())
}
