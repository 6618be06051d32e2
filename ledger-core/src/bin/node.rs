//! Ledger node binary
//!
//! Builds a chain from configuration, seals a few blocks and validates the
//! result. Ctrl-C cancels in-flight mining.

use anyhow::Context;
use ledger_core::{Chain, ChainHandle, Config, Metrics, Transaction};
use rust_decimal::Decimal;

/// Blocks appended after genesis
const DEMO_BLOCKS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        service = %config.service_name,
        consensus = config.consensus.name(),
        "Starting ledger node"
    );

    let metrics = Metrics::new().context("registering metrics")?;

    // Genesis mining can be long at high difficulty
    let chain_config = config.clone();
    let chain_metrics = metrics.clone();
    let chain = tokio::task::spawn_blocking(move || {
        Chain::from_config(&chain_config).map(|chain| chain.with_metrics(chain_metrics))
    })
    .await
    .context("genesis task panicked")??;
    let handle = ChainHandle::new(chain);

    // Ctrl-C trips the cancel token; the blocking miner observes it
    let canceller = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling mining");
            canceller.cancel();
        }
    });

    let appender = handle.clone();
    let appended = tokio::task::spawn_blocking(move || -> ledger_core::Result<u64> {
        for i in 1..=DEMO_BLOCKS {
            appender.append(vec![
                Transaction::with_generated_id("Alice", "Bob", Decimal::new(1000 + i as i64, 2)),
                Transaction::with_generated_id("Bob", "Charlie", Decimal::new(500 + i as i64, 2)),
            ])?;
        }
        Ok(DEMO_BLOCKS)
    })
    .await
    .context("append task panicked")?;

    match appended {
        Ok(count) => tracing::info!(count, "Blocks appended"),
        Err(e) if e.is_sealing_interrupted() => tracing::warn!(error = %e, "Mining stopped early"),
        Err(e) => return Err(e.into()),
    }

    for summary in handle.summaries() {
        tracing::info!(summary = %serde_json::to_string(&summary)?, "Block");
    }

    let report = handle.validate();
    tracing::info!(
        valid = report.is_valid(),
        report = %serde_json::to_string(&report)?,
        "Chain validated"
    );
    tracing::debug!(metrics = %metrics.render()?, "Metrics");

    tracing::info!("Shutting down ledger node");
    Ok(())
}
