//! Risk API
//!
//! REST API for the prop-firm risk engine.
//!
//! # Features
//!
//! - **Circuit breaker**: check and evaluate the daily breaker per account
//! - **Manual locks**: risk-desk initiated account locks
//! - **Position sizing**: risk-based lot size quotes
//! - **Mistake patterns**: per-trade scans and weekly aggregates
//! - **OpenAPI**: auto-generated Swagger documentation
//!
//! # Example
//!
//! ```ignore
//! use risk_api::{ApiServer, ServerConfig};
//!
//! let server = ApiServer::new(ServerConfig::default(), core_config, pool).await?;
//! server.run().await?;
//! ```

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use prop_core::config::Config;
use prop_core::store::postgres::{PgAccountStore, PgMistakePatternStore, PgTradeHistory};
use risk_engine::{AlertOutbox, PushAlerter, RiskEngine};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the listener.
    pub host: String,
    /// Listener port.
    pub port: u16,
    /// Permissive CORS for local dashboard development.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_permissive: true,
        }
    }
}

impl ServerConfig {
    /// Read the listener settings from the environment.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            // Check PORT first (platform-assigned), then API_PORT, then default
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("API_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            cors_permissive: std::env::var("CORS_PERMISSIVE")
                .map(|v| v == "true")
                .unwrap_or(true),
        }
    }

    /// Bind address as a `SocketAddr`.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }
}

/// HTTP server wrapping the risk engine.
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server wired to Postgres and Redis.
    pub async fn new(config: ServerConfig, core: Config, pool: PgPool) -> anyhow::Result<Self> {
        let accounts = Arc::new(PgAccountStore::new(pool.clone()));
        let trades = Arc::new(PgTradeHistory::new(pool.clone()));
        let patterns = Arc::new(PgMistakePatternStore::new(pool.clone()));

        let alerter = Arc::new(PushAlerter::new(&core.redis.url, core.alerts.clone()).await?);
        let outbox = AlertOutbox::new(alerter);
        let engine = Arc::new(RiskEngine::new(accounts, trades, patterns, outbox));

        Ok(Self {
            config,
            state: AppState::new(pool, engine),
        })
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        let state = Arc::new(self.state);

        let trace = TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG))
            .on_failure(DefaultOnFailure::new().level(Level::ERROR));

        // Strict mode sends no CORS headers, so only same-origin callers work
        let cors = if self.config.cors_permissive {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        };

        let router = create_router(state)
            .layer(trace)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
            .layer(cors);

        let addr = self.config.socket_addr();
        info!(address = %addr, docs = "/docs", "Risk API listening");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
