//! Ledger Core
//!
//! Append-only chain of blocks, each committing a transaction batch through
//! a Merkle root and sealed by proof of work or proof of stake.
//!
//! # Architecture
//!
//! - **Merkle Tree**: Hex-digest binary tree, odd nodes promoted unchanged
//! - **Consensus**: One tagged enum, mining or stake-weighted forging
//! - **Chain**: Single writer, append-only, replay-based validation
//! - **Handle**: Shared chain with appends serialized behind one lock

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - Linkage: `chain[i].previous_hash == chain[i - 1].hash` for every `i > 0`
//! - Commitment: every stored digest equals the digest of its seal preimage
//! - Append-only: blocks are never modified or removed once appended
//! - Atomic append: a failed seal leaves the chain unchanged

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod crypto;
pub mod merkle;
pub mod consensus;
pub mod chain;
pub mod handle;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    AccountId, Block, BlockHeader, BlockSummary, Transaction, UnsealedBlock, ValidatorStake,
    GENESIS_PREVIOUS_HASH,
};
pub use merkle::{MerkleProof, MerkleTree, EMPTY_ROOT};
pub use consensus::{
    CancelToken, ConsensusSeal, MiningConfig, RandomSource, SealContext, SealStats, StdRandom,
};
pub use chain::{Chain, ChainBuilder, FailureKind, ValidationFailure, ValidationReport};
pub use handle::ChainHandle;
pub use config::Config;
pub use metrics::Metrics;
