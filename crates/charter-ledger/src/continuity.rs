use std::collections::BTreeSet;

/// Check a list of sequence numbers for contiguity between its own minimum
/// and maximum.
///
/// Returns `(true, [])` iff the list covers `min..=max` exactly once each.
/// Otherwise returns `false` with the sequences missing from that range
/// (empty if the only defect is a duplicate).
pub fn sequence_continuity(sequences: &[u64]) -> (bool, Vec<u64>) {
    let (Some(&min), Some(&max)) = (sequences.iter().min(), sequences.iter().max()) else {
        return (true, vec![]);
    };
    let (_, missing) = continuity_in_range(sequences, min, max);
    let unique: BTreeSet<u64> = sequences.iter().copied().collect();
    let has_duplicates = unique.len() != sequences.len();
    (missing.is_empty() && !has_duplicates, missing)
}

/// Set difference between `start..=end` and the sequences present.
/// Sequences outside the range are ignored.
pub fn continuity_in_range(present: &[u64], start: u64, end: u64) -> (bool, Vec<u64>) {
    if end < start {
        return (true, vec![]);
    }
    let present: BTreeSet<u64> = present
        .iter()
        .copied()
        .filter(|s| *s >= start && *s <= end)
        .collect();
    let missing: Vec<u64> = (start..=end).filter(|s| !present.contains(s)).collect();
    (missing.is_empty(), missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn contiguous_list_is_complete() {
        assert_eq!(sequence_continuity(&[1, 2, 3, 4, 5]), (true, vec![]));
    }

    #[test]
    fn hole_is_reported() {
        assert_eq!(sequence_continuity(&[1, 2, 4, 5]), (false, vec![3]));
    }

    #[test]
    fn duplicates_are_not_continuous() {
        assert_eq!(sequence_continuity(&[1, 2, 2, 3]), (false, vec![]));
    }

    #[test]
    fn empty_list_is_trivially_continuous() {
        assert_eq!(sequence_continuity(&[]), (true, vec![]));
    }

    #[test]
    fn range_check_reports_edges() {
        assert_eq!(continuity_in_range(&[2, 3], 1, 5), (false, vec![1, 4, 5]));
        assert_eq!(continuity_in_range(&[1, 2, 3], 1, 3), (true, vec![]));
    }

    proptest! {
        #[test]
        fn complete_iff_exact_contiguous_cover(
            sequences in prop::collection::vec(1u64..60, 0..40)
        ) {
            let (complete, missing) = sequence_continuity(&sequences);
            let expected = match (sequences.iter().min(), sequences.iter().max()) {
                (Some(&min), Some(&max)) => {
                    let mut sorted = sequences.clone();
                    sorted.sort_unstable();
                    sorted == (min..=max).collect::<Vec<_>>()
                }
                _ => true,
            };
            prop_assert_eq!(complete, expected);
            if complete {
                prop_assert!(missing.is_empty());
            }
            for m in &missing {
                prop_assert!(!sequences.contains(m));
            }
        }
    }
}
