//! Append-only chain of sealed blocks
//!
//! This module ties together block assembly, sealing and validation.
//!
//! # Example
//!
//! ```
//! use ledger_core::{Chain, ConsensusSeal, Transaction};
//! use rust_decimal::Decimal;
//!
//! fn main() -> ledger_core::Result<()> {
//!     let mut chain = Chain::new(ConsensusSeal::proof_of_work(1))?;
//!
//!     chain.append(vec![
//!         Transaction::new("11", "Alice", "Bob", Decimal::from(10)),
//!         Transaction::new("12", "Bob", "Charlie", Decimal::from(5)),
//!     ])?;
//!
//!     assert_eq!(chain.len(), 2);
//!     assert!(chain.is_valid());
//!     Ok(())
//! }
//! ```

use crate::{
    consensus::{CancelToken, ConsensusSeal, MiningConfig, RandomSource, SealContext, StdRandom},
    crypto::short,
    metrics::Metrics,
    types::{Block, BlockHeader, BlockSummary, Transaction, UnsealedBlock, GENESIS_PREVIOUS_HASH},
    Config, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Digest characters shown in log lines
const LOG_DIGEST_LEN: usize = 16;

/// Kind of integrity violation found by validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Stored index differs from the block's position
    IndexMismatch,
    /// Previous hash differs from the predecessor's digest (or the genesis sentinel)
    LinkageMismatch,
    /// Stored Merkle root differs from the root of the stored transactions
    MerkleRootMismatch,
    /// Stored digest differs from the replayed seal preimage digest
    DigestMismatch,
    /// Seal data violates the chain's consensus rule
    SealMismatch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::IndexMismatch => "index mismatch",
            FailureKind::LinkageMismatch => "linkage mismatch",
            FailureKind::MerkleRootMismatch => "merkle root mismatch",
            FailureKind::DigestMismatch => "digest mismatch",
            FailureKind::SealMismatch => "seal mismatch",
        };
        f.write_str(name)
    }
}

/// One integrity violation at one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Position of the offending block
    pub index: u64,
    /// What failed
    pub kind: FailureKind,
    /// Human-readable detail (expected vs. found)
    pub detail: String,
}

/// Outcome of a full chain scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Number of blocks inspected
    pub blocks_checked: usize,
    /// Every violation found, in block order
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    /// True when no block failed any check
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Earliest violation
    pub fn first_failure(&self) -> Option<&ValidationFailure> {
        self.failures.first()
    }

    /// Distinct indices of failing blocks, ascending
    pub fn failed_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.failures.iter().map(|f| f.index).collect();
        indices.dedup();
        indices
    }

    /// Check whether a given violation was reported at a given index
    pub fn has_failure(&self, index: u64, kind: FailureKind) -> bool {
        self.failures
            .iter()
            .any(|f| f.index == index && f.kind == kind)
    }
}

/// Builder for [`Chain`]
///
/// The genesis block is sealed by [`ChainBuilder::build`], so mining budget
/// and cancellation apply to it as well.
pub struct ChainBuilder {
    consensus: ConsensusSeal,
    rng: Option<Box<dyn RandomSource>>,
    mining: MiningConfig,
    cancel: CancelToken,
    metrics: Option<Metrics>,
}

impl ChainBuilder {
    /// Inject the draw source used for validator selection
    pub fn random_source(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Set mining budget
    pub fn mining(mut self, mining: MiningConfig) -> Self {
        self.mining = mining;
        self
    }

    /// Share a cancel token with a controller
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Record sealing and validation metrics
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the consensus parameters and seal the genesis block
    pub fn build(self) -> Result<Chain> {
        self.consensus.validate()?;

        let mut chain = Chain {
            consensus: self.consensus,
            blocks: Vec::new(),
            rng: self
                .rng
                .unwrap_or_else(|| Box::new(StdRandom::from_entropy()) as Box<dyn RandomSource>),
            mining: self.mining,
            cancel: self.cancel,
            metrics: self.metrics,
        };

        let genesis = UnsealedBlock::new(0, GENESIS_PREVIOUS_HASH, vec![Transaction::genesis()]);
        chain.seal_and_push(genesis)?;

        tracing::info!(consensus = chain.consensus.name(), "Chain created");
        Ok(chain)
    }
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("consensus", &self.consensus)
            .field("mining", &self.mining)
            .finish_non_exhaustive()
    }
}

/// Append-only chain of sealed blocks under one consensus rule
///
/// Never empty: index 0 is always the genesis block.
pub struct Chain {
    consensus: ConsensusSeal,
    blocks: Vec<Block>,
    rng: Box<dyn RandomSource>,
    mining: MiningConfig,
    cancel: CancelToken,
    metrics: Option<Metrics>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("consensus", &self.consensus)
            .field("len", &self.blocks.len())
            .field("mining", &self.mining)
            .finish_non_exhaustive()
    }
}

impl Chain {
    /// Chain with an entropy-seeded draw source and an unbounded miner
    pub fn new(consensus: ConsensusSeal) -> Result<Self> {
        Self::builder(consensus).build()
    }

    /// Chain with an injected draw source
    pub fn with_random_source(
        consensus: ConsensusSeal,
        rng: impl RandomSource + 'static,
    ) -> Result<Self> {
        Self::builder(consensus).random_source(rng).build()
    }

    /// Start configuring a chain
    pub fn builder(consensus: ConsensusSeal) -> ChainBuilder {
        ChainBuilder {
            consensus,
            rng: None,
            mining: MiningConfig::default(),
            cancel: CancelToken::new(),
            metrics: None,
        }
    }

    /// Chain described by a configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let builder = Self::builder(config.consensus.clone()).mining(config.mining.clone());
        match config.rng_seed {
            Some(seed) => builder.random_source(StdRandom::seeded(seed)).build(),
            None => builder.build(),
        }
    }

    /// Wrap externally held blocks for inspection and validation
    ///
    /// Blocks are taken as-is; nothing is re-sealed or checked here.
    pub fn from_blocks(consensus: ConsensusSeal, blocks: Vec<Block>) -> Result<Self> {
        consensus.validate()?;
        if blocks.is_empty() {
            return Err(Error::Other("Imported chain has no genesis block".to_string()));
        }

        Ok(Self {
            consensus,
            blocks,
            rng: Box::new(StdRandom::from_entropy()),
            mining: MiningConfig::default(),
            cancel: CancelToken::new(),
            metrics: None,
        })
    }

    /// Record sealing and validation metrics
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble, seal and append a block holding `transactions`
    ///
    /// On error the chain is left unchanged.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> Result<&Block> {
        let tip = self.tip();
        let block = UnsealedBlock::new(tip.index + 1, tip.hash.clone(), transactions);
        self.seal_and_push(block)
    }

    fn seal_and_push(&mut self, block: UnsealedBlock) -> Result<&Block> {
        let mut ctx = SealContext::new(self.rng.as_mut(), &self.mining, &self.cancel);

        let (block, stats) = match self.consensus.seal(block, &mut ctx) {
            Ok(sealed) => sealed,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_seal_failure();
                }
                return Err(e);
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_block_sealed(stats.attempts, stats.elapsed.as_secs_f64());
        }

        tracing::info!(
            index = block.index,
            hash = short(&block.hash, LOG_DIGEST_LEN),
            nonce = block.nonce,
            validator = block.validator.as_deref().unwrap_or("-"),
            transactions = block.transactions.len(),
            attempts = stats.attempts,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Block appended"
        );

        self.blocks.push(block);
        Ok(self.tip())
    }

    /// Latest block
    pub fn tip(&self) -> &Block {
        // Never empty: construction always pushes genesis
        &self.blocks[self.blocks.len() - 1]
    }

    /// Genesis block
    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// Block at `index`
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Consensus rule of this chain
    pub fn consensus(&self) -> &ConsensusSeal {
        &self.consensus
    }

    /// Token that cancels in-flight mining on this chain
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Printable view of every block
    pub fn summaries(&self) -> Vec<BlockSummary> {
        self.blocks.iter().map(Block::summary).collect()
    }

    /// Check whether every block passes validation
    pub fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }

    /// Replay every block's commitments and report all violations
    ///
    /// For each block: index continuity, previous-hash linkage (genesis must
    /// carry the sentinel), Merkle root against the stored transactions,
    /// digest against the seal preimage rebuilt from the recomputed root and
    /// the stored nonce/validator, and the consensus predicate.
    #[tracing::instrument(skip(self), fields(consensus = self.consensus.name(), len = self.blocks.len()))]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport {
            blocks_checked: self.blocks.len(),
            failures: Vec::new(),
        };

        for (position, block) in self.blocks.iter().enumerate() {
            let mut fail = |kind: FailureKind, detail: String| {
                report.failures.push(ValidationFailure {
                    index: position as u64,
                    kind,
                    detail,
                });
            };

            if block.index != position as u64 {
                fail(
                    FailureKind::IndexMismatch,
                    format!("expected index {}, found {}", position, block.index),
                );
            }

            let expected_previous = match position {
                0 => GENESIS_PREVIOUS_HASH,
                _ => self.blocks[position - 1].hash.as_str(),
            };
            if block.previous_hash != expected_previous {
                fail(
                    FailureKind::LinkageMismatch,
                    format!(
                        "expected previous hash {}, found {}",
                        short(expected_previous, LOG_DIGEST_LEN),
                        short(&block.previous_hash, LOG_DIGEST_LEN)
                    ),
                );
            }

            let merkle_root = block.compute_merkle_root();
            if block.merkle_root != merkle_root {
                fail(
                    FailureKind::MerkleRootMismatch,
                    format!(
                        "expected merkle root {}, found {}",
                        short(&merkle_root, LOG_DIGEST_LEN),
                        short(&block.merkle_root, LOG_DIGEST_LEN)
                    ),
                );
            }

            let header = BlockHeader {
                index: block.index,
                previous_hash: &block.previous_hash,
                merkle_root: &merkle_root,
                timestamp: block.timestamp,
            };
            let expected_hash = header.seal_digest(block.nonce, block.validator.as_deref());
            if block.hash != expected_hash {
                fail(
                    FailureKind::DigestMismatch,
                    format!(
                        "expected digest {}, found {}",
                        short(&expected_hash, LOG_DIGEST_LEN),
                        short(&block.hash, LOG_DIGEST_LEN)
                    ),
                );
            }

            if let Some(violation) = self.consensus.seal_violation(block) {
                fail(FailureKind::SealMismatch, violation);
            }
        }

        for failure in &report.failures {
            tracing::warn!(index = failure.index, kind = %failure.kind, detail = %failure.detail, "Chain validation failure");
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_validation(report.failures.len());
        }

        report
    }
}
