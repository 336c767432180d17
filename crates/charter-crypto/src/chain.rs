use charter_types::{ChainLink, Event, EventHash, GENESIS_HASH};

/// Anything that participates in the ledger hash chain.
pub trait Chained {
    fn sequence(&self) -> u64;
    fn content_hash(&self) -> EventHash;
    fn prev_hash(&self) -> EventHash;
}

impl Chained for Event {
    fn sequence(&self) -> u64 {
        self.sequence
    }
    fn content_hash(&self) -> EventHash {
        self.content_hash
    }
    fn prev_hash(&self) -> EventHash {
        self.prev_hash
    }
}

impl Chained for ChainLink {
    fn sequence(&self) -> u64 {
        self.sequence
    }
    fn content_hash(&self) -> EventHash {
        self.content_hash
    }
    fn prev_hash(&self) -> EventHash {
        self.prev_hash
    }
}

/// Hash chain link verifier.
///
/// Checks that each entry's `prev_hash` equals the previous entry's
/// `content_hash`, that the first entry links to an expected anchor, and that
/// sequences strictly increase.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain that starts at the ledger genesis.
    pub fn verify_from_genesis(entries: &[impl Chained]) -> Result<(), ChainError> {
        Self::verify_chain(entries, GENESIS_HASH)
    }

    /// Verify a chain whose first entry must link to `anchor`. Stops at the
    /// first break.
    pub fn verify_chain(entries: &[impl Chained], anchor: EventHash) -> Result<(), ChainError> {
        match Self::find_breaks(entries, anchor).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every break in the chain, in sequence order.
    pub fn find_breaks(entries: &[impl Chained], anchor: EventHash) -> Vec<ChainError> {
        let mut breaks = Vec::new();
        let mut expected_prev = anchor;
        let mut last_sequence: Option<u64> = None;

        for entry in entries {
            if let Some(last) = last_sequence {
                if entry.sequence() <= last {
                    breaks.push(ChainError::OutOfOrder {
                        sequence: entry.sequence(),
                        previous: last,
                    });
                }
            }

            if entry.prev_hash() != expected_prev {
                breaks.push(ChainError::BrokenLink {
                    sequence: entry.sequence(),
                    expected: expected_prev,
                    actual: entry.prev_hash(),
                });
            }

            expected_prev = entry.content_hash();
            last_sequence = Some(entry.sequence());
        }

        breaks
    }
}

/// Errors from chain verification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("broken link at sequence {sequence}: expected prev_hash {expected}, found {actual}")]
    BrokenLink {
        sequence: u64,
        expected: EventHash,
        actual: EventHash,
    },

    #[error("sequence {sequence} does not follow {previous}")]
    OutOfOrder { sequence: u64, previous: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_chain(count: u64) -> Vec<ChainLink> {
        let mut chain = Vec::new();
        let mut prev = GENESIS_HASH;
        for sequence in 1..=count {
            let content_hash =
                EventHash::from_bytes(*blake3::hash(&sequence.to_le_bytes()).as_bytes());
            chain.push(ChainLink {
                sequence,
                content_hash,
                prev_hash: prev,
            });
            prev = content_hash;
        }
        chain
    }

    #[test]
    fn empty_chain_is_valid() {
        let chain: Vec<ChainLink> = vec![];
        assert!(HashChainVerifier::verify_from_genesis(&chain).is_ok());
    }

    #[test]
    fn multi_link_chain() {
        assert!(HashChainVerifier::verify_from_genesis(&build_chain(10)).is_ok());
    }

    #[test]
    fn first_link_must_use_genesis() {
        let mut chain = build_chain(2);
        chain[0].prev_hash = EventHash::from_bytes([1; 32]);
        let err = HashChainVerifier::verify_from_genesis(&chain).unwrap_err();
        assert!(matches!(err, ChainError::BrokenLink { sequence: 1, expected, .. } if expected == GENESIS_HASH));
    }

    #[test]
    fn tail_segment_verifies_against_its_anchor() {
        let chain = build_chain(6);
        let anchor = chain[2].content_hash;
        assert!(HashChainVerifier::verify_chain(&chain[3..], anchor).is_ok());
        assert!(HashChainVerifier::verify_from_genesis(&chain[3..]).is_err());
    }

    #[test]
    fn all_breaks_are_reported() {
        let mut chain = build_chain(5);
        chain[1].prev_hash = EventHash::from_bytes([9; 32]);
        chain[3].prev_hash = EventHash::from_bytes([9; 32]);
        let breaks = HashChainVerifier::find_breaks(&chain, GENESIS_HASH);
        assert_eq!(breaks.len(), 2);
        assert!(matches!(breaks[0], ChainError::BrokenLink { sequence: 2, .. }));
        assert!(matches!(breaks[1], ChainError::BrokenLink { sequence: 4, .. }));
    }

    #[test]
    fn reordering_is_detected() {
        let mut chain = build_chain(3);
        chain.swap(1, 2);
        let breaks = HashChainVerifier::find_breaks(&chain, GENESIS_HASH);
        assert!(breaks
            .iter()
            .any(|b| matches!(b, ChainError::OutOfOrder { sequence: 2, previous: 3 })));
    }
}
