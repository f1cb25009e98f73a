//! State handed to every handler.

use risk_engine::RiskEngine;
use sqlx::PgPool;
use std::sync::Arc;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used directly by the readiness probe.
    pub pool: PgPool,
    /// The risk engine facade all handlers go through.
    pub engine: Arc<RiskEngine>,
}

impl AppState {
    pub fn new(pool: PgPool, engine: Arc<RiskEngine>) -> Self {
        Self { pool, engine }
    }
}
