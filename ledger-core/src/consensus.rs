//! Block sealing: proof-of-work mining and stake-weighted forging
//!
//! Both mechanisms share one entry point, [`ConsensusSeal::seal`], which
//! turns an [`UnsealedBlock`] into a sealed [`Block`]. A chain holds exactly
//! one `ConsensusSeal` value and uses it for every block.
//!
//! # Mining
//!
//! Mining walks nonces from 0 until the hex digest starts with `difficulty`
//! zero characters. The search is bounded by [`MiningConfig::max_attempts`]
//! and polls a [`CancelToken`] every `cancel_check_interval` attempts, so it
//! always returns: either a seal, `SealingExhausted` or `SealingCancelled`.
//!
//! # Forging
//!
//! Forging draws a uniform integer in `[0, total_stake)` from an injected
//! [`RandomSource`] and picks the validator whose cumulative stake interval
//! `[before, after)` contains the draw. The nonce stays 0 and the chosen
//! identity is part of the sealed preimage.

use crate::crypto::{meets_difficulty, DIGEST_HEX_LEN};
use crate::types::{Block, BlockHeader, UnsealedBlock, ValidatorStake};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of uniform draws for validator selection
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, bound)`; `bound` is never 0
    fn draw_below(&mut self, bound: u64) -> u64;
}

/// [`RandomSource`] backed by the standard seedable generator
#[derive(Debug, Clone)]
pub struct StdRandom(StdRng);

impl StdRandom {
    /// Seed from OS entropy
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    /// Deterministic generator for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRandom {
    fn draw_below(&mut self, bound: u64) -> u64 {
        self.0.gen_range(0..bound)
    }
}

/// Cooperative cancellation flag shared between a miner and its controller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untripped token
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask any in-flight mining to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Re-arm the token after a cancelled run
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Mining budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Maximum nonces tried per block (unbounded when `None`)
    pub max_attempts: Option<u64>,

    /// Attempts between two cancel-token polls
    pub cancel_check_interval: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            cancel_check_interval: 1024,
        }
    }
}

/// Everything sealing needs besides the block
pub struct SealContext<'a> {
    /// Draw source for validator selection
    pub rng: &'a mut dyn RandomSource,
    /// Mining budget
    pub mining: &'a MiningConfig,
    /// Cancellation flag for mining
    pub cancel: &'a CancelToken,
}

impl<'a> SealContext<'a> {
    /// Bundle sealing inputs
    pub fn new(
        rng: &'a mut dyn RandomSource,
        mining: &'a MiningConfig,
        cancel: &'a CancelToken,
    ) -> Self {
        Self { rng, mining, cancel }
    }
}

/// Cost of producing a seal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealStats {
    /// Digests computed
    pub attempts: u64,
    /// Wall time spent sealing
    pub elapsed: Duration,
}

/// Consensus mechanism of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsensusSeal {
    /// Nonce search until the digest has `difficulty` leading `'0'` chars
    ProofOfWork {
        /// Required leading zero characters
        difficulty: u32,
    },
    /// Stake-weighted validator selection
    ProofOfStake {
        /// Ordered validator set
        validators: Vec<ValidatorStake>,
    },
}

impl ConsensusSeal {
    /// Proof of work at the given difficulty
    pub fn proof_of_work(difficulty: u32) -> Self {
        ConsensusSeal::ProofOfWork { difficulty }
    }

    /// Proof of stake over `(name, stake)` pairs, order preserved
    pub fn proof_of_stake<I, S>(validators: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        ConsensusSeal::ProofOfStake {
            validators: validators
                .into_iter()
                .map(|(name, stake)| ValidatorStake::new(name, stake))
                .collect(),
        }
    }

    /// Short mechanism name for logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ConsensusSeal::ProofOfWork { .. } => "proof_of_work",
            ConsensusSeal::ProofOfStake { .. } => "proof_of_stake",
        }
    }

    /// Reject parameters that can never produce a seal
    pub fn validate(&self) -> Result<()> {
        match self {
            ConsensusSeal::ProofOfWork { difficulty } => {
                if *difficulty as usize > DIGEST_HEX_LEN {
                    return Err(Error::InvalidConfiguration(format!(
                        "Difficulty {} exceeds digest length {}",
                        difficulty, DIGEST_HEX_LEN
                    )));
                }
                Ok(())
            }
            ConsensusSeal::ProofOfStake { validators } => {
                if validators.is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "Validator set is empty".to_string(),
                    ));
                }
                if total_stake(validators)? == 0 {
                    return Err(Error::InvalidConfiguration(
                        "Total stake is zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Seal a block
    ///
    /// Fails with `InvalidConfiguration` for an unusable validator set and
    /// with `SealingCancelled`/`SealingExhausted` when mining stops early.
    #[tracing::instrument(skip(self, block, ctx), fields(index = block.index(), consensus = self.name()))]
    pub fn seal(&self, block: UnsealedBlock, ctx: &mut SealContext<'_>) -> Result<(Block, SealStats)> {
        let started = Instant::now();

        let (nonce, validator, hash, attempts) = match self {
            ConsensusSeal::ProofOfWork { difficulty } => {
                let (nonce, hash, attempts) = mine(&block.header(), *difficulty, ctx)?;
                (nonce, None, hash, attempts)
            }
            ConsensusSeal::ProofOfStake { validators } => {
                let validator = select_validator(validators, &mut *ctx.rng)?.name.clone();
                let hash = block.header().seal_digest(0, Some(&validator));
                (0, Some(validator), hash, 1)
            }
        };

        let stats = SealStats {
            attempts,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            nonce,
            validator = validator.as_deref().unwrap_or("-"),
            attempts,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Block sealed"
        );

        Ok((block.into_sealed(nonce, validator, hash), stats))
    }

    /// Check the mechanism-specific part of a stored seal
    ///
    /// Uses only the recorded nonce and validator; no selection is re-run.
    /// Returns a description of the first violation found.
    pub fn seal_violation(&self, block: &Block) -> Option<String> {
        match self {
            ConsensusSeal::ProofOfWork { difficulty } => {
                if let Some(validator) = &block.validator {
                    return Some(format!(
                        "Proof-of-work block carries validator {}",
                        validator
                    ));
                }
                if !meets_difficulty(&block.hash, *difficulty) {
                    return Some(format!("Digest does not meet difficulty {}", difficulty));
                }
                None
            }
            ConsensusSeal::ProofOfStake { validators } => {
                if block.nonce != 0 {
                    return Some(format!("Forged block has nonce {}", block.nonce));
                }
                match &block.validator {
                    None => Some("Forged block has no validator".to_string()),
                    Some(name) if !validators.iter().any(|v| &v.name == name) => {
                        Some(format!("Unknown validator {}", name))
                    }
                    Some(_) => None,
                }
            }
        }
    }
}

/// Nonce search over a fixed header
fn mine(header: &BlockHeader<'_>, difficulty: u32, ctx: &SealContext<'_>) -> Result<(u64, String, u64)> {
    let prefix = header.preimage_prefix();
    let check_interval = ctx.mining.cancel_check_interval.max(1);
    let mut attempts = 0u64;
    let mut nonce = 0u64;

    tracing::debug!(difficulty, max_attempts = ?ctx.mining.max_attempts, "Starting PoW mining");

    loop {
        if ctx.mining.max_attempts.is_some_and(|max| attempts >= max) {
            tracing::warn!(index = header.index, attempts, "PoW mining exhausted its budget");
            return Err(Error::SealingExhausted {
                index: header.index,
                attempts,
            });
        }

        if attempts % check_interval == 0 && ctx.cancel.is_cancelled() {
            tracing::warn!(index = header.index, attempts, "PoW mining cancelled");
            return Err(Error::SealingCancelled {
                index: header.index,
                attempts,
            });
        }

        let mut preimage = prefix.clone();
        preimage.write_u64(nonce).write_optional_str(None);
        let hash = preimage.digest();
        attempts += 1;

        if meets_difficulty(&hash, difficulty) {
            return Ok((nonce, hash, attempts));
        }

        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => {
                return Err(Error::SealingExhausted {
                    index: header.index,
                    attempts,
                })
            }
        };
    }
}

/// Sum of all stake weights
pub fn total_stake(validators: &[ValidatorStake]) -> Result<u64> {
    validators
        .iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v.stake))
        .ok_or_else(|| Error::InvalidConfiguration("Total stake overflows u64".to_string()))
}

/// Validator owning `draw` in the cumulative stake layout
///
/// Validator `i` owns `[sum(stake[..i]), sum(stake[..=i]))`. Zero-stake
/// validators own an empty interval and are never picked. Returns `None`
/// when `draw >= total_stake`.
pub fn pick_validator(validators: &[ValidatorStake], draw: u64) -> Option<&ValidatorStake> {
    let mut cumulative = 0u64;
    for validator in validators {
        cumulative = cumulative.saturating_add(validator.stake);
        if draw < cumulative {
            return Some(validator);
        }
    }
    None
}

/// Stake-weighted random choice of the sealing validator
pub fn select_validator<'v>(
    validators: &'v [ValidatorStake],
    rng: &mut dyn RandomSource,
) -> Result<&'v ValidatorStake> {
    if validators.is_empty() {
        return Err(Error::InvalidConfiguration(
            "Validator set is empty".to_string(),
        ));
    }

    let total = total_stake(validators)?;
    if total == 0 {
        return Err(Error::InvalidConfiguration(
            "Total stake is zero".to_string(),
        ));
    }

    let draw = rng.draw_below(total);
    pick_validator(validators, draw).ok_or_else(|| {
        Error::Other(format!("Random draw {} outside [0, {})", draw, total))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Transaction, GENESIS_PREVIOUS_HASH};
    use rust_decimal::Decimal;

    struct FixedDraw(u64);

    impl RandomSource for FixedDraw {
        fn draw_below(&mut self, _bound: u64) -> u64 {
            self.0
        }
    }

    fn validators() -> Vec<ValidatorStake> {
        vec![
            ValidatorStake::new("V1", 100),
            ValidatorStake::new("V2", 200),
            ValidatorStake::new("V3", 150),
        ]
    }

    fn unsealed() -> UnsealedBlock {
        UnsealedBlock::new(
            1,
            GENESIS_PREVIOUS_HASH,
            vec![Transaction::new("1", "Alice", "Bob", Decimal::from(10))],
        )
        .with_timestamp(1_700_000_000)
    }

    #[test]
    fn test_pick_validator_intervals() {
        let set = validators();
        assert_eq!(pick_validator(&set, 0).unwrap().name, "V1");
        assert_eq!(pick_validator(&set, 99).unwrap().name, "V1");
        assert_eq!(pick_validator(&set, 100).unwrap().name, "V2");
        assert_eq!(pick_validator(&set, 250).unwrap().name, "V2");
        assert_eq!(pick_validator(&set, 299).unwrap().name, "V2");
        assert_eq!(pick_validator(&set, 300).unwrap().name, "V3");
        assert_eq!(pick_validator(&set, 449).unwrap().name, "V3");
        assert!(pick_validator(&set, 450).is_none());
    }

    #[test]
    fn test_pick_validator_skips_zero_stake() {
        let set = vec![ValidatorStake::new("idle", 0), ValidatorStake::new("busy", 5)];
        assert_eq!(pick_validator(&set, 0).unwrap().name, "busy");
    }

    #[test]
    fn test_select_validator_fixed_draw() {
        let set = validators();
        let chosen = select_validator(&set, &mut FixedDraw(250)).unwrap();
        assert_eq!(chosen.name, "V2");
    }

    #[test]
    fn test_select_validator_rejects_empty_and_zero() {
        let err = select_validator(&[], &mut FixedDraw(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let zero = vec![ValidatorStake::new("a", 0), ValidatorStake::new("b", 0)];
        let err = select_validator(&zero, &mut FixedDraw(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_total_stake_overflow() {
        let set = vec![ValidatorStake::new("a", u64::MAX), ValidatorStake::new("b", 1)];
        assert!(matches!(total_stake(&set), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let set = validators();
        let mut a = StdRandom::seeded(7);
        let mut b = StdRandom::seeded(7);
        for _ in 0..32 {
            assert_eq!(
                select_validator(&set, &mut a).unwrap().name,
                select_validator(&set, &mut b).unwrap().name
            );
        }
    }

    #[test]
    fn test_validate_config() {
        assert!(ConsensusSeal::proof_of_work(0).validate().is_ok());
        assert!(ConsensusSeal::proof_of_work(64).validate().is_ok());
        assert!(ConsensusSeal::proof_of_work(65).validate().is_err());
        assert!(ConsensusSeal::proof_of_stake(Vec::<(String, u64)>::new())
            .validate()
            .is_err());
        assert!(ConsensusSeal::proof_of_stake([("V1", 0)]).validate().is_err());
        assert!(ConsensusSeal::proof_of_stake([("V1", 1)]).validate().is_ok());
    }

    #[test]
    fn test_mine_meets_difficulty() {
        let seal = ConsensusSeal::proof_of_work(2);
        let mut rng = FixedDraw(0);
        let mining = MiningConfig::default();
        let cancel = CancelToken::new();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        let (block, stats) = seal.seal(unsealed(), &mut ctx).unwrap();
        assert!(block.hash.starts_with("00"));
        assert_eq!(block.validator, None);
        assert_eq!(block.compute_hash(), block.hash);
        assert_eq!(stats.attempts, block.nonce + 1);
        assert!(seal.seal_violation(&block).is_none());
    }

    #[test]
    fn test_difficulty_zero_first_attempt() {
        let seal = ConsensusSeal::proof_of_work(0);
        let mut rng = FixedDraw(0);
        let mining = MiningConfig::default();
        let cancel = CancelToken::new();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        let (block, stats) = seal.seal(unsealed(), &mut ctx).unwrap();
        assert_eq!(block.nonce, 0);
        assert_eq!(stats.attempts, 1);
    }

    #[test]
    fn test_mine_cancelled() {
        let seal = ConsensusSeal::proof_of_work(64);
        let mut rng = FixedDraw(0);
        let mining = MiningConfig::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        let err = seal.seal(unsealed(), &mut ctx).unwrap_err();
        assert!(matches!(err, Error::SealingCancelled { index: 1, attempts: 0 }));
        assert!(err.is_sealing_interrupted());
    }

    #[test]
    fn test_mine_exhausted() {
        let seal = ConsensusSeal::proof_of_work(64);
        let mut rng = FixedDraw(0);
        let mining = MiningConfig {
            max_attempts: Some(50),
            cancel_check_interval: 8,
        };
        let cancel = CancelToken::new();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        let err = seal.seal(unsealed(), &mut ctx).unwrap_err();
        assert!(matches!(err, Error::SealingExhausted { index: 1, attempts: 50 }));
    }

    #[test]
    fn test_cancel_token_reset() {
        let token = CancelToken::new();
        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!shared.is_cancelled());
    }

    #[test]
    fn test_forge_records_validator() {
        let seal = ConsensusSeal::ProofOfStake {
            validators: validators(),
        };
        let mut rng = FixedDraw(320);
        let mining = MiningConfig::default();
        let cancel = CancelToken::new();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        let (block, stats) = seal.seal(unsealed(), &mut ctx).unwrap();
        assert_eq!(block.validator.as_deref(), Some("V3"));
        assert_eq!(block.nonce, 0);
        assert_eq!(stats.attempts, 1);
        assert_eq!(block.compute_hash(), block.hash);
        assert!(seal.seal_violation(&block).is_none());
    }

    #[test]
    fn test_forge_ignores_cancel_token() {
        let seal = ConsensusSeal::proof_of_stake([("V1", 1)]);
        let mut rng = FixedDraw(0);
        let mining = MiningConfig::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        assert!(seal.seal(unsealed(), &mut ctx).is_ok());
    }

    #[test]
    fn test_seal_violation_unknown_validator() {
        let seal = ConsensusSeal::ProofOfStake {
            validators: validators(),
        };
        let mut rng = FixedDraw(0);
        let mining = MiningConfig::default();
        let cancel = CancelToken::new();
        let mut ctx = SealContext::new(&mut rng, &mining, &cancel);

        let (mut block, _) = seal.seal(unsealed(), &mut ctx).unwrap();
        block.validator = Some("Mallory".to_string());
        assert!(seal.seal_violation(&block).unwrap().contains("Mallory"));

        block.validator = None;
        assert!(seal.seal_violation(&block).is_some());
    }

    #[test]
    fn test_consensus_serde_tagging() {
        let pos = ConsensusSeal::proof_of_stake([("V1", 100)]);
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["kind"], "proof_of_stake");
        assert_eq!(json["validators"][0]["name"], "V1");

        let pow: ConsensusSeal =
            serde_json::from_str(r#"{"kind":"proof_of_work","difficulty":3}"#).unwrap();
        assert_eq!(pow, ConsensusSeal::proof_of_work(3));
    }
}
