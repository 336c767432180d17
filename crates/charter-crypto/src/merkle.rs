use charter_types::{EventHash, ProofStep, Side};

/// Binary Merkle tree over event content hashes.
///
/// Internal nodes are `BLAKE3("charter-merkle-v1:" || left || right)`. When a
/// level has an odd number of nodes, the last node is paired with itself;
/// this rule is applied at every level, for tree construction and proofs
/// alike.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: EventHash,
    /// Level 0 = leaves, last level = `[root]`.
    levels: Vec<Vec<EventHash>>,
}

impl MerkleTree {
    /// Build a tree from leaf hashes.
    ///
    /// An empty list produces the genesis (all-zero) root. A single leaf is
    /// its own root.
    pub fn from_leaves(leaves: Vec<EventHash>) -> Self {
        if leaves.is_empty() {
            return Self {
                root: EventHash::genesis(),
                levels: vec![],
            };
        }

        let mut levels: Vec<Vec<EventHash>> = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<EventHash> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    hash_pair(left, pair.get(1).unwrap_or(left))
                })
                .collect();
            levels.push(next);
        }

        let root = levels[levels.len() - 1][0];
        Self { root, levels }
    }

    /// The root hash of the tree.
    pub fn root(&self) -> EventHash {
        self.root
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// The leaf at `index`.
    pub fn leaf(&self, index: usize) -> Option<EventHash> {
        self.levels.first().and_then(|leaves| leaves.get(index)).copied()
    }

    /// Inclusion path for the leaf at `index`, ordered leaf to root.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut idx = index;

        for (level, nodes) in self.levels[..self.levels.len() - 1].iter().enumerate() {
            let (sibling_idx, position) = if idx % 2 == 0 {
                (idx + 1, Side::Right)
            } else {
                (idx - 1, Side::Left)
            };
            let sibling_hash = nodes.get(sibling_idx).copied().unwrap_or(nodes[idx]);
            path.push(ProofStep {
                level: level as u32,
                position,
                sibling_hash,
            });
            idx /= 2;
        }

        Some(path)
    }
}

/// Merkle root of `leaves` without keeping the tree.
pub fn merkle_root(leaves: &[EventHash]) -> EventHash {
    MerkleTree::from_leaves(leaves.to_vec()).root()
}

/// Inclusion path for `leaves[index]`, or `None` if out of range.
pub fn generate_proof(leaves: &[EventHash], index: usize) -> Option<Vec<ProofStep>> {
    MerkleTree::from_leaves(leaves.to_vec()).proof(index)
}

/// Fold a leaf through its path to recompute the root.
pub fn compute_root(leaf: &EventHash, path: &[ProofStep]) -> EventHash {
    path.iter().fold(*leaf, |current, step| match step.position {
        Side::Left => hash_pair(&step.sibling_hash, &current),
        Side::Right => hash_pair(&current, &step.sibling_hash),
    })
}

/// Returns `true` if `leaf` and `path` recompute to `root`.
pub fn verify_path(leaf: &EventHash, path: &[ProofStep], root: &EventHash) -> bool {
    compute_root(leaf, path) == *root
}

/// Check that a path's level tags run `0, 1, 2, ...` and that its length is
/// the height of a tree with `tree_size` leaves.
pub fn path_is_well_formed(path: &[ProofStep], tree_size: u64) -> bool {
    if path
        .iter()
        .enumerate()
        .any(|(i, step)| step.level as usize != i)
    {
        return false;
    }
    path.len() == tree_height(tree_size)
}

/// Number of hashing levels above the leaves for a tree of `leaves` leaves.
pub fn tree_height(leaves: u64) -> usize {
    let mut width = leaves;
    let mut height = 0;
    while width > 1 {
        width = width.div_ceil(2);
        height += 1;
    }
    height
}

fn hash_pair(left: &EventHash, right: &EventHash) -> EventHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"charter-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    EventHash::from_bytes(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(seed: u8) -> EventHash {
        EventHash::from_bytes(*blake3::hash(&[seed]).as_bytes())
    }

    fn flip_char(hash: &EventHash, at: usize) -> EventHash {
        let mut hex: Vec<char> = hash.to_hex().chars().collect();
        hex[at] = if hex[at] == '0' { '1' } else { '0' };
        EventHash::from_hex(&hex.into_iter().collect::<String>()).unwrap()
    }

    #[test]
    fn empty_tree_has_genesis_root() {
        let tree = MerkleTree::from_leaves(vec![]);
        assert!(tree.root().is_genesis());
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn single_leaf_is_root() {
        let tree = MerkleTree::from_leaves(vec![leaf(1)]);
        assert_eq!(tree.root(), leaf(1));
        assert_eq!(tree.proof(0).unwrap(), vec![]);
    }

    #[test]
    fn four_leaf_proof_for_third_leaf() {
        let leaves: Vec<EventHash> = (1..=4).map(leaf).collect();
        let tree = MerkleTree::from_leaves(leaves.clone());
        let path = generate_proof(&leaves, 2).unwrap();

        assert_eq!(path.len(), 2);
        assert_eq!(path[0].level, 0);
        assert_eq!(path[0].position, Side::Right);
        assert_eq!(path[0].sibling_hash, leaves[3]);
        assert_eq!(path[1].level, 1);
        assert_eq!(path[1].position, Side::Left);

        assert!(verify_path(&leaves[2], &path, &tree.root()));
        assert!(!verify_path(&flip_char(&leaves[2], 5), &path, &tree.root()));
    }

    #[test]
    fn odd_leaf_count_duplicates_last_node() {
        let leaves: Vec<EventHash> = (1..=3).map(leaf).collect();
        let tree = MerkleTree::from_leaves(leaves.clone());
        let expected = hash_pair(
            &hash_pair(&leaves[0], &leaves[1]),
            &hash_pair(&leaves[2], &leaves[2]),
        );
        assert_eq!(tree.root(), expected);

        let path = tree.proof(2).unwrap();
        assert_eq!(path[0].sibling_hash, leaves[2]);
        assert!(verify_path(&leaves[2], &path, &tree.root()));
    }

    #[test]
    fn proofs_verify_for_even_and_odd_sizes() {
        for size in [2u8, 5, 7, 8, 13, 16] {
            let leaves: Vec<EventHash> = (0..size).map(leaf).collect();
            let tree = MerkleTree::from_leaves(leaves.clone());
            for (i, l) in leaves.iter().enumerate() {
                let path = tree.proof(i).unwrap();
                assert!(path_is_well_formed(&path, size as u64));
                assert!(verify_path(l, &path, &tree.root()), "size {size} leaf {i}");
            }
        }
    }

    #[test]
    fn tree_height_matches_levels() {
        assert_eq!(tree_height(0), 0);
        assert_eq!(tree_height(1), 0);
        assert_eq!(tree_height(2), 1);
        assert_eq!(tree_height(5), 3);
        assert_eq!(tree_height(8), 3);
        assert_eq!(tree_height(9), 4);
    }

    #[test]
    fn malformed_level_tags_are_detected() {
        let leaves: Vec<EventHash> = (0..4).map(leaf).collect();
        let mut path = generate_proof(&leaves, 1).unwrap();
        path[1].level = 5;
        assert!(!path_is_well_formed(&path, 4));
        assert!(!path_is_well_formed(&path[..1], 4));
    }

    proptest! {
        #[test]
        fn every_included_leaf_verifies_and_any_flip_fails(
            size in 1usize..40,
            pick in any::<prop::sample::Index>(),
            flip_at in 0usize..64,
        ) {
            let leaves: Vec<EventHash> = (0..size).map(|i| leaf(i as u8)).collect();
            let tree = MerkleTree::from_leaves(leaves.clone());
            let index = pick.index(size);
            let path = tree.proof(index).unwrap();
            let root = tree.root();

            prop_assert!(verify_path(&leaves[index], &path, &root));
            prop_assert!(!verify_path(&flip_char(&leaves[index], flip_at), &path, &root));
            prop_assert!(!verify_path(&leaves[index], &path, &flip_char(&root, flip_at)));

            for step in 0..path.len() {
                let mut tampered = path.clone();
                tampered[step].sibling_hash = flip_char(&tampered[step].sibling_hash, flip_at);
                prop_assert!(!verify_path(&leaves[index], &tampered, &root));
            }
        }
    }
}
