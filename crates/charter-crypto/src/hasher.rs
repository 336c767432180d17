use charter_types::{Event, EventHash};

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so an event and an attestation with identical bytes never
/// produce the same digest.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for event canonical content.
    pub const EVENT: Self = Self {
        domain: "charter-event-v1",
    };
    /// Hasher for attestation and export summaries.
    pub const ATTESTATION: Self = Self {
        domain: "charter-attestation-v1",
    };
    /// Hasher for replayed state digests.
    pub const STATE: Self = Self {
        domain: "charter-state-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> EventHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        EventHash::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<EventHash, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &EventHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Compute the content hash of an event from its canonical content.
///
/// The stored `content_hash` and both signatures are ignored, so the result
/// can be compared against the stored value to detect tampering.
pub fn content_hash(event: &Event) -> Result<EventHash, HasherError> {
    let bytes = event
        .canonical_bytes()
        .map_err(|e| HasherError::Serialization(e.to_string()))?;
    Ok(ContentHasher::EVENT.hash(&bytes))
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::EVENT.hash(data), ContentHasher::EVENT.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        assert_ne!(
            ContentHasher::EVENT.hash(data),
            ContentHasher::ATTESTATION.hash(data)
        );
        assert_ne!(
            ContentHasher::EVENT.hash(data),
            ContentHasher::STATE.hash(data)
        );
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::EVENT.hash(b"original");
        assert!(ContentHasher::EVENT.verify(b"original", &id));
        assert!(!ContentHasher::EVENT.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_is_key_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(
            ContentHasher::STATE.hash_json(&a).unwrap(),
            ContentHasher::STATE.hash_json(&b).unwrap()
        );
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("charter-test-v1");
        assert_eq!(hasher.domain(), "charter-test-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::EVENT.hash(b"data"));
    }
}
