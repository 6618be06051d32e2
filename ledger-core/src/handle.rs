//! Shared, thread-safe access to one chain
//!
//! Appends are serialized behind a single write lock: one append is in
//! flight at a time, so index and previous-hash are always taken from the
//! tip the block is appended to. Validation and reads share the read lock
//! and never overlap an append.
//!
//! Mining holds the write lock for its whole duration. The cancel token is
//! kept outside the lock so a controller can stop a long-running append
//! without waiting for it.

use crate::{
    chain::{Chain, ValidationReport},
    consensus::{CancelToken, ConsensusSeal},
    types::{Block, BlockSummary, Transaction},
    Result,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle to a chain shared between threads
#[derive(Debug, Clone)]
pub struct ChainHandle {
    inner: Arc<RwLock<Chain>>,
    cancel: CancelToken,
}

impl ChainHandle {
    /// Take ownership of a chain
    pub fn new(chain: Chain) -> Self {
        let cancel = chain.cancel_token();
        Self {
            inner: Arc::new(RwLock::new(chain)),
            cancel,
        }
    }

    /// Append a block; blocks other appenders and readers until sealed
    pub fn append(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let mut chain = self.inner.write();
        chain.append(transactions).cloned()
    }

    /// Validate under the read lock
    pub fn validate(&self) -> ValidationReport {
        self.inner.read().validate()
    }

    /// Check whether every block passes validation
    pub fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }

    /// Latest block
    pub fn tip(&self) -> Block {
        self.inner.read().tip().clone()
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Always false; a chain holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Consensus rule of the shared chain
    pub fn consensus(&self) -> ConsensusSeal {
        self.inner.read().consensus().clone()
    }

    /// Copy of every block
    pub fn snapshot(&self) -> Vec<Block> {
        self.inner.read().blocks().to_vec()
    }

    /// Printable view of every block
    pub fn summaries(&self) -> Vec<BlockSummary> {
        self.inner.read().summaries()
    }

    /// Stop in-flight mining; the token stays tripped until [`Self::resume`]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Re-arm mining after a cancellation
    pub fn resume(&self) {
        self.cancel.reset();
    }
}
