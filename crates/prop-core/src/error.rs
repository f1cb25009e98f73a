//! Error types for the PropDesk risk engine.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Trade not found: {0}")]
    TradeNotFound(Uuid),

    #[error("Lock update conflict for account {0}: concurrent evaluation won the race")]
    LockConflict(Uuid),

    #[error("Invalid trading hours: start_minute={start} end_minute={end} (must be < 1440)")]
    InvalidTradingHours { start: i32, end: i32 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// True for lookups of entities that do not exist (maps to HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::AccountNotFound(_) | Error::TradeNotFound(_))
    }

    /// True when a conditional lock update lost a concurrent race. Transient:
    /// the caller should re-evaluate, which then reports the winning lock.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::LockConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
