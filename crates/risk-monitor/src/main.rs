//! Risk Monitor
//!
//! Scheduled circuit-breaker sweep across all active prop-firm accounts.

mod sweep;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use prop_core::config::Config;
use prop_core::db;
use prop_core::store::postgres::{PgAccountStore, PgMistakePatternStore, PgTradeHistory};
use risk_engine::{AlertOutbox, PushAlerter, RiskEngine};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HEALTH_FILE: &str = "/tmp/healthy";

/// Container liveness marker, refreshed after every sweep.
pub(crate) fn touch_health_file() {
    let _ = std::fs::write(HEALTH_FILE, format!("{}", chrono::Utc::now().timestamp()));
}

/// Prop-firm risk sweep.
#[derive(Parser)]
#[command(name = "risk-monitor")]
#[command(about = "Evaluates the circuit breaker for every active account on a schedule", long_about = None)]
struct Cli {
    /// Seconds between sweeps (overrides MONITOR_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Concurrent evaluations per sweep (overrides MONITOR_SWEEP_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "risk_monitor=info,risk_engine=info,prop_core=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting Risk Monitor");
    touch_health_file();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(interval_secs) = cli.interval_secs {
        config.monitor.sweep_interval_secs = interval_secs;
    }
    if let Some(concurrency) = cli.concurrency {
        config.monitor.sweep_concurrency = concurrency;
    }

    let pool = db::create_pool(&config.database).await?;
    let accounts = Arc::new(PgAccountStore::new(pool.clone()));
    let trades = Arc::new(PgTradeHistory::new(pool.clone()));
    let patterns = Arc::new(PgMistakePatternStore::new(pool));

    let alerter = Arc::new(PushAlerter::new(&config.redis.url, config.alerts.clone()).await?);
    let outbox = AlertOutbox::new(alerter);
    let engine = Arc::new(RiskEngine::new(accounts, trades, patterns, outbox));

    if cli.once {
        let summary = sweep::run_once(&engine, config.monitor.sweep_concurrency).await?;
        info!(
            evaluated = summary.evaluated,
            locked = summary.locked,
            conflicts = summary.conflicts,
            errors = summary.errors,
            "Sweep complete"
        );
        return Ok(());
    }

    sweep::run(engine, &config.monitor).await
}
