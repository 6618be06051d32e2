//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring sealing and
//! validation.
//!
//! # Metrics
//!
//! - `ledger_blocks_sealed_total` - Blocks sealed and appended
//! - `ledger_seal_attempts_total` - Digests computed while sealing
//! - `ledger_seal_failures_total` - Seals that were cancelled, exhausted or misconfigured
//! - `ledger_seal_duration_seconds` - Histogram of sealing latencies
//! - `ledger_validation_runs_total` - Full chain validations
//! - `ledger_validation_failures_total` - Integrity violations reported

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
///
/// Registered on a private registry, so several collectors can coexist in
/// one process.
#[derive(Clone)]
pub struct Metrics {
    /// Blocks sealed
    pub blocks_sealed: IntCounter,

    /// Digests computed while sealing
    pub seal_attempts: IntCounter,

    /// Failed seals
    pub seal_failures: IntCounter,

    /// Seal duration histogram
    pub seal_duration: Histogram,

    /// Validation runs
    pub validation_runs: IntCounter,

    /// Validation failures
    pub validation_failures: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("blocks_sealed", &self.blocks_sealed.get())
            .field("validation_failures", &self.validation_failures.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let blocks_sealed =
            IntCounter::new("ledger_blocks_sealed_total", "Blocks sealed and appended")?;
        registry.register(Box::new(blocks_sealed.clone()))?;

        let seal_attempts = IntCounter::new(
            "ledger_seal_attempts_total",
            "Digests computed while sealing",
        )?;
        registry.register(Box::new(seal_attempts.clone()))?;

        let seal_failures = IntCounter::new(
            "ledger_seal_failures_total",
            "Seals that were cancelled, exhausted or misconfigured",
        )?;
        registry.register(Box::new(seal_failures.clone()))?;

        let seal_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_seal_duration_seconds",
                "Histogram of sealing latencies",
            )
            .buckets(vec![0.0001, 0.001, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(seal_duration.clone()))?;

        let validation_runs =
            IntCounter::new("ledger_validation_runs_total", "Full chain validations")?;
        registry.register(Box::new(validation_runs.clone()))?;

        let validation_failures = IntCounter::new(
            "ledger_validation_failures_total",
            "Integrity violations reported",
        )?;
        registry.register(Box::new(validation_failures.clone()))?;

        Ok(Self {
            blocks_sealed,
            seal_attempts,
            seal_failures,
            seal_duration,
            validation_runs,
            validation_failures,
            registry,
        })
    }

    /// Record a sealed block
    pub fn record_block_sealed(&self, attempts: u64, duration_seconds: f64) {
        self.blocks_sealed.inc();
        self.seal_attempts.inc_by(attempts);
        self.seal_duration.observe(duration_seconds);
    }

    /// Record a seal that did not complete
    pub fn record_seal_failure(&self) {
        self.seal_failures.inc();
    }

    /// Record a validation run
    pub fn record_validation(&self, failures: usize) {
        self.validation_runs.inc();
        self.validation_failures.inc_by(failures as u64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
