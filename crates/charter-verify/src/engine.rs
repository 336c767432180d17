use std::io::Read;

use charter_crypto::{compute_root, path_is_well_formed, ChainError, HashChainVerifier};
use charter_types::{
    DetectedIssue, HashChainProof, IssueKind, LedgerExport, MerkleProof, VerificationResult,
    VerificationStatus, GENESIS_HASH,
};
use tracing::{info, warn};

use crate::checks::{
    check_hash_chain, check_merkle, check_sequence_completeness, check_state_replay, CheckOutcome,
};
use crate::error::VerifyResult;
use crate::reducer::{EventTallyReducer, StateReducer};

/// Aggregate the four check results.
///
/// A failed hash-chain or Merkle check means the data itself cannot be
/// trusted, which is `INVALID`. With integrity intact, a failed completeness
/// or replay check is `PARTIAL`.
pub fn status_for(
    hash_chain_valid: bool,
    merkle_valid: bool,
    sequence_complete: bool,
    state_replay_valid: bool,
) -> VerificationStatus {
    if !hash_chain_valid || !merkle_valid {
        VerificationStatus::Invalid
    } else if !sequence_complete || !state_replay_valid {
        VerificationStatus::Partial
    } else {
        VerificationStatus::Valid
    }
}

/// Verify a complete export with the default [`EventTallyReducer`].
pub fn verify_complete(export: &LedgerExport) -> VerificationResult {
    verify_complete_with(export, &EventTallyReducer)
}

/// Verify a complete export, replaying state through `reducer`.
pub fn verify_complete_with<R: StateReducer>(export: &LedgerExport, reducer: &R) -> VerificationResult {
    let mut chain = check_hash_chain(&export.events);
    chain.issues.extend(check_declared_hashes(export));
    chain.passed = chain.issues.is_empty();

    let completeness = check_sequence_completeness(&export.events, &export.metadata);
    let merkle = check_merkle(&export.leaves(), &export.verification.merkle_root);
    let replay = check_state_replay(&export.events, reducer);

    let result = aggregate(chain, merkle, completeness, replay, export.events.len() as u64);
    if result.is_valid() {
        info!(
            export_id = %export.metadata.export_id,
            events = result.events_verified,
            "export verified"
        );
    } else {
        warn!(
            export_id = %export.metadata.export_id,
            status = %result.status,
            issues = result.issues.len(),
            "export failed verification"
        );
    }
    result
}

/// Verify an export from nothing but its JSON bytes.
pub fn verify_offline(json: &str) -> VerifyResult<VerificationResult> {
    let export: LedgerExport = serde_json::from_str(json)?;
    Ok(verify_complete(&export))
}

/// [`verify_offline`] over any reader, such as an export file.
pub fn verify_offline_reader<R: Read>(mut reader: R) -> VerifyResult<VerificationResult> {
    let mut json = String::new();
    reader.read_to_string(&mut json)?;
    verify_offline(&json)
}

/// Check a single Merkle inclusion proof. Only the Merkle flag can fail.
pub fn verify_merkle_proof(proof: &MerkleProof) -> VerificationResult {
    let mut issues = Vec::new();
    if proof.tree_size == 0 || !path_is_well_formed(&proof.path, proof.tree_size) {
        issues.push(DetectedIssue::new(
            IssueKind::MerkleMismatch,
            Some(proof.event_sequence),
            format!("path for {} leaves", proof.tree_size),
            format!("{} steps", proof.path.len()),
            "malformed Merkle path",
        ));
    } else {
        let computed = compute_root(&proof.event_hash, &proof.path);
        if computed != proof.checkpoint_root {
            issues.push(DetectedIssue::new(
                IssueKind::MerkleMismatch,
                Some(proof.event_sequence),
                proof.checkpoint_root.to_hex(),
                computed.to_hex(),
                "path does not fold to the checkpoint root",
            ));
        }
    }
    let merkle = CheckOutcome {
        passed: issues.is_empty(),
        issues,
    };
    aggregate(passing(), merkle, passing(), passing(), 1)
}

/// Check a hash-chain proof: every link, both ends, and the HEAD hash.
pub fn verify_hash_chain_proof(proof: &HashChainProof) -> VerificationResult {
    let mut issues = Vec::new();
    match (proof.chain.first(), proof.chain.last()) {
        (Some(first), Some(last)) => {
            if first.sequence != proof.from_sequence || last.sequence != proof.to_sequence {
                issues.push(DetectedIssue::new(
                    IssueKind::SequenceGap,
                    None,
                    format!("{}..={}", proof.from_sequence, proof.to_sequence),
                    format!("{}..={}", first.sequence, last.sequence),
                    "chain does not span the claimed range",
                ));
            }
            for err in HashChainVerifier::find_breaks(&proof.chain, first.prev_hash) {
                issues.push(chain_issue(err));
            }
            if last.content_hash != proof.current_head_hash {
                issues.push(DetectedIssue::new(
                    IssueKind::BrokenLink,
                    Some(last.sequence),
                    proof.current_head_hash.to_hex(),
                    last.content_hash.to_hex(),
                    "chain does not end at the HEAD hash",
                ));
            }
        }
        _ => issues.push(DetectedIssue::new(
            IssueKind::SequenceGap,
            Some(proof.from_sequence),
            "at least one link",
            "none",
            "empty hash chain proof",
        )),
    }

    let (gaps, links): (Vec<_>, Vec<_>) = issues
        .into_iter()
        .partition(|i| i.kind == IssueKind::SequenceGap);
    let chain = CheckOutcome {
        passed: links.is_empty(),
        issues: links,
    };
    let completeness = CheckOutcome {
        passed: gaps.is_empty(),
        issues: gaps,
    };
    aggregate(chain, passing(), completeness, passing(), proof.chain.len() as u64)
}

/// Metadata hashes must agree with the events they describe.
fn check_declared_hashes(export: &LedgerExport) -> Vec<DetectedIssue> {
    let mut issues = Vec::new();
    let metadata = &export.metadata;
    if metadata.genesis_hash != GENESIS_HASH {
        issues.push(DetectedIssue::new(
            IssueKind::HashMismatch,
            None,
            GENESIS_HASH.to_hex(),
            metadata.genesis_hash.to_hex(),
            "declared genesis_hash is not the genesis sentinel",
        ));
    }
    let latest = export
        .events
        .last()
        .map_or(GENESIS_HASH, |e| e.content_hash);
    if metadata.latest_hash != latest {
        issues.push(DetectedIssue::new(
            IssueKind::HashMismatch,
            export.events.last().map(|e| e.sequence),
            latest.to_hex(),
            metadata.latest_hash.to_hex(),
            "declared latest_hash does not match the last event",
        ));
    }
    issues
}

fn chain_issue(err: ChainError) -> DetectedIssue {
    match err {
        ChainError::BrokenLink {
            sequence,
            expected,
            actual,
        } => DetectedIssue::new(
            IssueKind::BrokenLink,
            Some(sequence),
            expected.to_hex(),
            actual.to_hex(),
            "prev_hash does not match the previous link",
        ),
        ChainError::OutOfOrder { sequence, previous } => DetectedIssue::new(
            IssueKind::BrokenLink,
            Some(sequence),
            format!("> {previous}"),
            sequence.to_string(),
            "links are not in ascending sequence order",
        ),
    }
}

fn passing() -> CheckOutcome {
    CheckOutcome {
        passed: true,
        issues: vec![],
    }
}

fn aggregate(
    chain: CheckOutcome,
    merkle: CheckOutcome,
    completeness: CheckOutcome,
    replay: CheckOutcome,
    events_verified: u64,
) -> VerificationResult {
    let status = status_for(chain.passed, merkle.passed, completeness.passed, replay.passed);
    let mut issues = chain.issues;
    issues.extend(completeness.issues);
    issues.extend(merkle.issues);
    issues.extend(replay.issues);
    VerificationResult {
        status,
        hash_chain_valid: chain.passed,
        merkle_valid: merkle.passed,
        sequence_complete: completeness.passed,
        state_replay_valid: replay.passed,
        issues,
        events_verified,
    }
}
