//! # Append-Only Merkle Tree
//!
//! A Certificate-Transparency-style Merkle tree over an ordered sequence of
//! leaf hashes. Unlike a name-keyed tree, leaves here are identified by their
//! append position, which is what lets the tree grow one attestation at a
//! time while still producing stable inclusion and consistency proofs.
//!
//! ## Threat Model
//!
//! - **Tamper evidence**: changing, reordering, or dropping a leaf changes
//!   the root.
//! - **Efficient inclusion proofs**: O(log n) path from a leaf to the root.
//! - **Efficient consistency proofs**: a verifier who trusted an earlier
//!   root can confirm a later root is a pure extension of it, without
//!   re-downloading every leaf.
//!
//! ## Tree shape
//!
//! The tree is built bottom-up, level by level: pair adjacent hashes with
//! [`hash_pair`], and when a level has an odd node out, duplicate it and
//! pair it with itself before moving up. Root of zero leaves is
//! [`EMPTY_HASH`]; root of one leaf is the leaf itself.
//!
//! Consistency is checked by rebuilding the tree over the leaf prefix a
//! proof claims and comparing roots, not by the sublinear frontier-tracking
//! proof RFC 6962 uses — duplicating the last node at each level means the
//! left subtree is not stable as leaves are appended, so that proof's
//! stable-subtree assumption does not hold here.
//!
//! ## References
//!
//! - RFC 6962 — "Certificate Transparency", §2.1 (Merkle Tree Hash)
//!   <https://www.rfc-editor.org/rfc/rfc6962>

use thiserror::Error;
use trustchain_canon::Hash;

/// Hash of the empty tree (no leaves).
pub const EMPTY_HASH: Hash = [0u8; 32];

/// A single step in an inclusion or consistency proof path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProofNode {
    /// The sibling hash at this level of the tree.
    pub hash: Hash,
    /// Whether the sibling sits to the left of the accumulated hash.
    pub is_left: bool,
}

/// Proof that a leaf at a given index is included under a given root.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InclusionProof {
    pub leaf_index: usize,
    pub tree_size: usize,
    pub leaf_hash: Hash,
    pub path: Vec<ProofNode>,
}

/// Proof that a tree of size `old_size` is a prefix of a tree of size
/// `new_size` — i.e. the log was only ever appended to, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConsistencyProof {
    pub old_size: usize,
    pub new_size: usize,
    pub hashes: Vec<Hash>,
}

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("leaf index {index} out of range for tree of size {size}")]
    IndexOutOfRange { index: usize, size: usize },
    #[error("old tree size {old} cannot exceed new tree size {new}")]
    SizeOrder { old: usize, new: usize },
}

pub type Result<T> = std::result::Result<T, MerkleError>;

/// An append-only Merkle tree.
///
/// # Thread Safety
///
/// Not thread-safe; wrap in a `Mutex` for concurrent access, mirroring the
/// rest of the chain crates.
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    leaves: Vec<Hash>,
    cached_root: Option<Hash>,
}

impl MerkleTree {
    /// Creates a new, empty tree.
    pub fn new() -> Self {
        MerkleTree {
            leaves: Vec::new(),
            cached_root: None,
        }
    }

    /// Rebuilds a tree from a known, ordered sequence of leaf hashes (used
    /// when reconstructing the tree from the on-disk log at startup).
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        MerkleTree {
            leaves,
            cached_root: None,
        }
    }

    /// Appends a new leaf hash, returning its index.
    pub fn append(&mut self, hash: Hash) -> usize {
        self.leaves.push(hash);
        self.cached_root = None;
        self.leaves.len() - 1
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    pub fn leaf(&self, index: usize) -> Option<&Hash> {
        self.leaves.get(index)
    }

    /// Computes (and caches) the current root hash.
    pub fn root(&mut self) -> Hash {
        if let Some(cached) = self.cached_root {
            return cached;
        }
        let root = build_root(&self.leaves);
        self.cached_root = Some(root);
        root
    }

    /// Generates an inclusion proof for the leaf at `index`, against the
    /// tree's current state.
    pub fn inclusion_proof(&mut self, index: usize) -> Result<InclusionProof> {
        if index >= self.leaves.len() {
            return Err(MerkleError::IndexOutOfRange {
                index,
                size: self.leaves.len(),
            });
        }
        let path = audit_path(index, &self.leaves);
        Ok(InclusionProof {
            leaf_index: index,
            tree_size: self.leaves.len(),
            leaf_hash: self.leaves[index],
            path,
        })
    }

    /// Verifies an inclusion proof against a trusted root hash.
    pub fn verify_inclusion(proof: &InclusionProof, expected_root: &Hash) -> bool {
        let mut current = proof.leaf_hash;
        for node in &proof.path {
            current = if node.is_left {
                hash_pair(&node.hash, &current)
            } else {
                hash_pair(&current, &node.hash)
            };
        }
        current == *expected_root
    }

    /// Generates a consistency proof that the tree's current state is a
    /// pure append-only extension of its state when it had `old_size`
    /// leaves. Per spec, the proof is simply enough leaves for the
    /// verifier to rebuild both the old and new root and compare — not a
    /// sublinear RFC 6962-style frontier proof (see the module docs for
    /// why that doesn't apply to a duplicate-last-node tree).
    pub fn consistency_proof(&self, old_size: usize) -> Result<ConsistencyProof> {
        let new_size = self.leaves.len();
        if old_size > new_size {
            return Err(MerkleError::SizeOrder {
                old: old_size,
                new: new_size,
            });
        }
        if old_size == 0 {
            return Ok(ConsistencyProof {
                old_size,
                new_size,
                hashes: Vec::new(),
            });
        }
        Ok(ConsistencyProof {
            old_size,
            new_size,
            hashes: self.leaves.clone(),
        })
    }

    /// Verifies a consistency proof against the two roots it claims to
    /// connect, by rebuilding the tree over the claimed leaf prefix and
    /// over the full claimed leaf set.
    pub fn verify_consistency(proof: &ConsistencyProof, old_root: &Hash, new_root: &Hash) -> bool {
        if proof.old_size > proof.new_size {
            return false;
        }
        if proof.old_size == 0 {
            return true;
        }
        if proof.hashes.len() != proof.new_size {
            return false;
        }
        build_root(&proof.hashes[..proof.old_size]) == *old_root
            && build_root(&proof.hashes) == *new_root
    }
}

/// Builds the tree bottom-up over `leaves` and returns the root hash,
/// duplicating the last node of any level with an odd count before
/// pairing.
fn build_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return EMPTY_HASH;
    }
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for chunk in level.chunks(2) {
            if chunk.len() == 2 {
                next.push(hash_pair(&chunk[0], &chunk[1]));
            } else {
                next.push(hash_pair(&chunk[0], &chunk[0]));
            }
        }
        level = next;
    }
    level[0]
}

/// The audit path from leaf `leaf_index` to the root of the tree over
/// `leaves`, following the same duplicate-last-node level-building as
/// [`build_root`].
fn audit_path(leaf_index: usize, leaves: &[Hash]) -> Vec<ProofNode> {
    if leaves.len() <= 1 {
        return Vec::new();
    }

    let mut path = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = leaf_index;

    while level.len() > 1 {
        let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
        let sibling_hash = if sibling_index < level.len() {
            level[sibling_index]
        } else {
            level[index]
        };
        path.push(ProofNode {
            hash: sibling_hash,
            is_left: index % 2 == 1,
        });

        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for chunk in level.chunks(2) {
            if chunk.len() == 2 {
                next.push(hash_pair(&chunk[0], &chunk[1]));
            } else {
                next.push(hash_pair(&chunk[0], &chunk[0]));
            }
        }
        level = next;
        index /= 2;
    }

    path
}

/// Hashes two child hashes together to form a parent hash.
fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> Hash {
        let mut h = [0u8; 32];
        h[0] = byte;
        h
    }

    #[test]
    fn empty_tree_root_is_empty_hash() {
        let mut tree = MerkleTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), EMPTY_HASH);
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let mut tree = MerkleTree::new();
        let h = leaf(1);
        tree.append(h);
        assert_eq!(tree.root(), h);
    }

    #[test]
    fn root_changes_on_append() {
        let mut tree = MerkleTree::new();
        tree.append(leaf(1));
        let root1 = tree.root();
        tree.append(leaf(2));
        let root2 = tree.root();
        assert_ne!(root1, root2);
    }

    #[test]
    fn inclusion_proofs_verify_for_several_sizes() {
        for n in 1..=9u8 {
            let mut tree = MerkleTree::new();
            for i in 0..n {
                tree.append(leaf(i));
            }
            let root = tree.root();
            for i in 0..n as usize {
                let proof = tree.inclusion_proof(i).unwrap();
                assert!(MerkleTree::verify_inclusion(&proof, &root), "size={n} index={i}");
            }
        }
    }

    #[test]
    fn inclusion_proof_fails_with_wrong_root() {
        let mut tree = MerkleTree::new();
        tree.append(leaf(1));
        tree.append(leaf(2));
        let proof = tree.inclusion_proof(0).unwrap();
        assert!(!MerkleTree::verify_inclusion(&proof, &EMPTY_HASH));
    }

    #[test]
    fn inclusion_out_of_range_errors() {
        let mut tree = MerkleTree::new();
        tree.append(leaf(1));
        assert!(tree.inclusion_proof(5).is_err());
    }

    #[test]
    fn consistency_proof_verifies_across_growth() {
        let mut tree = MerkleTree::new();
        let mut roots = Vec::new();
        for i in 0..10u8 {
            tree.append(leaf(i));
            roots.push(tree.root());
        }
        for old_size in 1..10usize {
            let proof = tree.consistency_proof(old_size).unwrap();
            let old_root = roots[old_size - 1];
            let new_root = *roots.last().unwrap();
            assert!(
                MerkleTree::verify_consistency(&proof, &old_root, &new_root),
                "old_size={old_size}"
            );
        }
    }

    #[test]
    fn consistency_proof_rejects_wrong_new_root() {
        let mut tree = MerkleTree::new();
        for i in 0..5u8 {
            tree.append(leaf(i));
        }
        let old_root = tree.root();
        tree.append(leaf(5));
        let proof = tree.consistency_proof(5).unwrap();
        assert!(!MerkleTree::verify_consistency(&proof, &old_root, &EMPTY_HASH));
    }

    #[test]
    fn consistency_against_empty_tree_is_trivially_true() {
        let mut tree = MerkleTree::new();
        for i in 0..3u8 {
            tree.append(leaf(i));
        }
        let proof = tree.consistency_proof(0).unwrap();
        assert!(MerkleTree::verify_consistency(&proof, &EMPTY_HASH, &tree.root()));
    }

    #[test]
    fn from_leaves_rebuilds_same_root() {
        let mut tree = MerkleTree::new();
        for i in 0..6u8 {
            tree.append(leaf(i));
        }
        let root = tree.root();
        let mut rebuilt = MerkleTree::from_leaves(tree.leaves().to_vec());
        assert_eq!(rebuilt.root(), root);
    }

    #[test]
    fn size_order_violation_errors() {
        let mut tree = MerkleTree::new();
        tree.append(leaf(1));
        assert!(tree.consistency_proof(5).is_err());
    }
}
