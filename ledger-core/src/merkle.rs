//! Merkle tree over ordered leaf items
//!
//! # Design
//!
//! - Binary Merkle tree with SHA-256 hashing, rendered as hex
//! - Level 0 holds `hash(leaf)` for each leaf in input order
//! - A parent is `hash(left_hex ++ right_hex)`, concatenating the hex strings
//! - An odd node at the end of a level is promoted unchanged; no node is
//!   ever paired with itself
//! - Built wholesale; there is no incremental update
//! - An empty tree has the empty string as its root

use crate::crypto::hash_hex;
use crate::types::Transaction;
use serde::{Deserialize, Serialize};

/// Root of a tree with no leaves
pub const EMPTY_ROOT: &str = "";

/// Hash a pair of hex digests (used for internal nodes)
fn hash_pair(left: &str, right: &str) -> String {
    let mut combined = String::with_capacity(left.len() + right.len());
    combined.push_str(left);
    combined.push_str(right);
    hash_hex(combined.as_bytes())
}

/// Merkle proof (path from leaf to root)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf hash being proven
    pub leaf_hash: String,
    /// Sibling hashes along the path to root; promoted levels add no step
    pub siblings: Vec<(Direction, String)>,
    /// Root hash
    pub root_hash: String,
}

/// Direction of sibling in Merkle tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Sibling is on the left
    Left,
    /// Sibling is on the right
    Right,
}

impl MerkleProof {
    /// Verify proof against its root hash
    pub fn verify(&self) -> bool {
        let mut current_hash = self.leaf_hash.clone();

        for (direction, sibling_hash) in &self.siblings {
            current_hash = match direction {
                Direction::Left => hash_pair(sibling_hash, &current_hash),
                Direction::Right => hash_pair(&current_hash, sibling_hash),
            };
        }

        current_hash == self.root_hash
    }
}

/// Merkle tree holding every level, leaves first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build a tree from raw leaf bytes
    pub fn from_leaves<B: AsRef<[u8]>>(leaves: &[B]) -> Self {
        let level0 = leaves.iter().map(|leaf| hash_hex(leaf.as_ref())).collect();
        Self::build(level0)
    }

    /// Build a tree over the canonical encoding of each transaction
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let level0 = transactions
            .iter()
            .map(|tx| hash_hex(&tx.canonical_bytes()))
            .collect();
        Self::build(level0)
    }

    fn build(level0: Vec<String>) -> Self {
        if level0.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![level0];

        while let Some(current_level) = levels.last().filter(|level| level.len() > 1) {
            let next_level = current_level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    // Odd node: promoted as-is
                    [single] => single.clone(),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next_level);
        }

        Self { levels }
    }

    /// Root digest, or [`EMPTY_ROOT`] for an empty tree
    pub fn root(&self) -> &str {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(String::as_str)
            .unwrap_or(EMPTY_ROOT)
    }

    /// All levels, leaf hashes first and the root level last
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Get number of leaves
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Generate Merkle proof for a leaf at given index
    pub fn generate_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf_hash = self.levels.first()?.get(leaf_index)?.clone();
        let mut siblings = Vec::new();
        let mut current_index = leaf_index;

        // The root level has no siblings
        for level in &self.levels[..self.levels.len() - 1] {
            if current_index % 2 == 1 {
                siblings.push((Direction::Left, level[current_index - 1].clone()));
            } else if let Some(right) = level.get(current_index + 1) {
                siblings.push((Direction::Right, right.clone()));
            }
            current_index /= 2;
        }

        Some(MerkleProof {
            leaf_hash,
            siblings,
            root_hash: self.root().to_string(),
        })
    }

    /// Verify that a leaf hash sits at the given index
    pub fn verify_leaf(&self, leaf_index: usize, leaf_hash: &str) -> bool {
        match self.generate_proof(leaf_index) {
            Some(proof) => proof.leaf_hash == leaf_hash && proof.verify(),
            None => false,
        }
    }
}

/// Compute the Merkle root of raw leaf bytes
pub fn merkle_root<B: AsRef<[u8]>>(leaves: &[B]) -> String {
    MerkleTree::from_leaves(leaves).root().to_string()
}
