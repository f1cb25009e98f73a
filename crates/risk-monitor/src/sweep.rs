//! The breaker sweep.
//!
//! Pulls every active account id and runs the circuit breaker over them
//! with bounded concurrency. Trips that happened through the API or a
//! concurrent sweep surface as lock conflicts, which are counted and
//! skipped; the account is already locked, the work is done.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use prop_core::config::MonitorConfig;
use risk_engine::RiskEngine;
use tracing::{error, info, warn};

/// Counts from one pass over the active accounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepSummary {
    pub evaluated: usize,
    pub locked: usize,
    pub conflicts: usize,
    pub errors: usize,
}

/// Evaluate every active account once.
pub async fn run_once(
    engine: &Arc<RiskEngine>,
    concurrency: usize,
) -> anyhow::Result<SweepSummary> {
    let account_ids = engine.active_account_ids().await?;

    let results: Vec<_> = stream::iter(account_ids)
        .map(|account_id| {
            let engine = engine.clone();
            async move {
                let result = engine.evaluate_circuit_breaker(account_id, None, false).await;
                (account_id, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = SweepSummary {
        evaluated: results.len(),
        ..Default::default()
    };

    for (account_id, result) in results {
        match result {
            Ok(outcome) => {
                if outcome.is_locked {
                    summary.locked += 1;
                }
            }
            Err(e) if e.is_conflict() => {
                summary.conflicts += 1;
                warn!("Lock conflict on account {}, another writer won", account_id);
            }
            Err(e) => {
                summary.errors += 1;
                error!("Failed to evaluate account {}: {}", account_id, e);
            }
        }
    }

    Ok(summary)
}

/// Sweep forever on the configured interval. The first pass runs
/// immediately on startup.
pub async fn run(engine: Arc<RiskEngine>, config: &MonitorConfig) -> anyhow::Result<()> {
    let mut tick = tokio::time::interval(tokio::time::Duration::from_secs(
        config.sweep_interval_secs.max(1),
    ));

    loop {
        tick.tick().await;
        match run_once(&engine, config.sweep_concurrency).await {
            Ok(summary) => info!(
                evaluated = summary.evaluated,
                locked = summary.locked,
                conflicts = summary.conflicts,
                errors = summary.errors,
                "Sweep complete"
            ),
            Err(e) => error!("Sweep failed: {}", e),
        }
        crate::touch_health_file();
    }
}
