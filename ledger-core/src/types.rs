//! Core types for the ledger
//!
//! All hashed types encode through [`Preimage`], so the byte layout that
//! feeds a digest is fixed by field order rather than by a serializer.

use crate::crypto::{short, Preimage};
use crate::merkle::MerkleTree;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Digest characters shown in block summaries
const SUMMARY_DIGEST_LEN: usize = 10;

/// Account identifier (sender or receiver of a transaction)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value transfer committed by a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction identifier
    pub id: String,

    /// Sending account
    pub sender: AccountId,

    /// Receiving account
    pub receiver: AccountId,

    /// Transferred amount (exact decimal)
    pub amount: Decimal,
}

impl Transaction {
    /// Create a transaction
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            sender: AccountId::new(sender),
            receiver: AccountId::new(receiver),
            amount,
        }
    }

    /// Create a transaction with a time-ordered UUIDv7 identifier
    pub fn with_generated_id(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self::new(Uuid::now_v7().to_string(), sender, receiver, amount)
    }

    /// Placeholder transaction committed by the genesis block
    pub fn genesis() -> Self {
        Self::new("0", "Genesis", "Genesis", Decimal::ZERO)
    }

    /// Canonical bytes for hashing: id, sender, receiver, amount
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut preimage = Preimage::new();
        preimage
            .write_str(&self.id)
            .write_str(self.sender.as_str())
            .write_str(self.receiver.as_str())
            .write_decimal(&self.amount);
        preimage.finalize()
    }
}

/// Validator identity paired with its stake weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStake {
    /// Validator identity
    pub name: String,
    /// Stake weight
    pub stake: u64,
}

impl ValidatorStake {
    /// Create new validator stake entry
    pub fn new(name: impl Into<String>, stake: u64) -> Self {
        Self {
            name: name.into(),
            stake,
        }
    }
}

/// Fields every seal commits to, borrowed from a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader<'a> {
    /// Block height
    pub index: u64,
    /// Digest of the predecessor
    pub previous_hash: &'a str,
    /// Merkle root of the transaction batch
    pub merkle_root: &'a str,
    /// Seconds since Unix epoch
    pub timestamp: u64,
}

impl BlockHeader<'_> {
    /// Preimage up to, not including, the seal fields
    pub fn preimage_prefix(&self) -> Preimage {
        let mut preimage = Preimage::new();
        preimage
            .write_u64(self.index)
            .write_str(self.previous_hash)
            .write_str(self.merkle_root)
            .write_u64(self.timestamp);
        preimage
    }

    /// Digest of the full seal preimage:
    /// index, previous hash, merkle root, timestamp, nonce, validator
    pub fn seal_digest(&self, nonce: u64, validator: Option<&str>) -> String {
        let mut preimage = self.preimage_prefix();
        preimage.write_u64(nonce).write_optional_str(validator);
        preimage.digest()
    }
}

/// Block that has been assembled but not sealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsealedBlock {
    index: u64,
    previous_hash: String,
    merkle_root: String,
    timestamp: u64,
    transactions: Vec<Transaction>,
}

impl UnsealedBlock {
    /// Assemble a block, computing its Merkle root and capturing the time
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let merkle_root = MerkleTree::from_transactions(&transactions).root().to_string();
        Self {
            index,
            previous_hash: previous_hash.into(),
            merkle_root,
            timestamp: now_seconds(),
            transactions,
        }
    }

    /// Override the captured timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Block height
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Digest of the predecessor
    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// Merkle root of the transaction batch
    pub fn merkle_root(&self) -> &str {
        &self.merkle_root
    }

    /// Transactions in the batch
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Seal-committed fields
    pub fn header(&self) -> BlockHeader<'_> {
        BlockHeader {
            index: self.index,
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
            timestamp: self.timestamp,
        }
    }

    /// Attach seal data, producing the final block
    pub(crate) fn into_sealed(self, nonce: u64, validator: Option<String>, hash: String) -> Block {
        Block {
            index: self.index,
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            timestamp: self.timestamp,
            transactions: self.transactions,
            nonce,
            validator,
            hash,
        }
    }
}

/// Sealed block
///
/// Fields are public for inspection and for importing externally held
/// chains; a [`crate::Chain`] only ever hands out shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height (0 = genesis)
    pub index: u64,

    /// Digest of the predecessor, or [`GENESIS_PREVIOUS_HASH`]
    pub previous_hash: String,

    /// Merkle root of the transaction batch
    pub merkle_root: String,

    /// Seconds since Unix epoch (informational)
    pub timestamp: u64,

    /// Committed transactions
    pub transactions: Vec<Transaction>,

    /// Proof-of-work nonce; always 0 under proof of stake
    pub nonce: u64,

    /// Forging validator under proof of stake
    pub validator: Option<String>,

    /// Digest of this block's seal preimage
    pub hash: String,
}

impl Block {
    /// Seal-committed fields
    pub fn header(&self) -> BlockHeader<'_> {
        BlockHeader {
            index: self.index,
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
            timestamp: self.timestamp,
        }
    }

    /// Recompute the digest from the stored fields and seal data
    pub fn compute_hash(&self) -> String {
        self.header()
            .seal_digest(self.nonce, self.validator.as_deref())
    }

    /// Merkle root recomputed from the stored transactions
    pub fn compute_merkle_root(&self) -> String {
        MerkleTree::from_transactions(&self.transactions)
            .root()
            .to_string()
    }

    /// Short printable view of this block
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            previous_hash: short(&self.previous_hash, SUMMARY_DIGEST_LEN).to_string(),
            merkle_root: short(&self.merkle_root, SUMMARY_DIGEST_LEN).to_string(),
            hash: short(&self.hash, SUMMARY_DIGEST_LEN).to_string(),
            nonce: self.nonce,
            validator: self.validator.clone(),
            transaction_count: self.transactions.len(),
        }
    }
}

/// Printable block digest, truncated hashes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block height
    pub index: u64,
    /// Truncated previous hash
    pub previous_hash: String,
    /// Truncated Merkle root
    pub merkle_root: String,
    /// Truncated block hash
    pub hash: String,
    /// Nonce
    pub nonce: u64,
    /// Forging validator, if any
    pub validator: Option<String>,
    /// Number of transactions
    pub transaction_count: usize,
}

fn now_seconds() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
