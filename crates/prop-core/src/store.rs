//! Storage contracts the risk engine consumes.
//!
//! The engine never owns account, trade, or pattern state; it reads and
//! mutates it through these traits. Postgres implementations back production,
//! the in-memory ones back tests and make side-effect assertions possible.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{Account, AuditEntry, LockKind, MistakePattern, MistakeTag, Trade};
use crate::Result;

/// One lock mutation. `locked_until` and `reason` are set or cleared
/// together; the store never writes one without the other.
#[derive(Debug, Clone)]
pub struct LockUpdate {
    pub locked_until: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub kind: LockKind,
}

impl LockUpdate {
    /// A lock that holds until `locked_until`.
    pub fn lock(locked_until: DateTime<Utc>, reason: impl Into<String>, kind: LockKind) -> Self {
        Self {
            locked_until: Some(locked_until),
            reason: Some(reason.into()),
            kind,
        }
    }
}

/// Account state owned by the trading platform.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load one account.
    async fn load(&self, account_id: Uuid) -> Result<Account>;

    /// Apply a lock update only if the persisted `trading_locked_until` still
    /// equals `expected_prior` (the value read when evaluation started).
    ///
    /// This conditional write is the per-account single-writer guarantee:
    /// concurrent evaluations race, exactly one wins, the rest get
    /// `Error::LockConflict` and re-evaluate.
    async fn update_lock(
        &self,
        account_id: Uuid,
        update: LockUpdate,
        expected_prior: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Append an immutable audit record, returning its assigned id.
    async fn append_audit(&self, entry: &AuditEntry) -> Result<i64>;

    /// Ids of every account the scheduled sweep should evaluate.
    async fn active_account_ids(&self) -> Result<Vec<Uuid>>;
}

/// Read access to the account's closed trades.
#[async_trait]
pub trait TradeHistorySource: Send + Sync {
    /// Closed trades since `since`, most recently closed first.
    async fn recent_trades(&self, account_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Trade>>;

    /// Load one trade.
    async fn trade(&self, trade_id: Uuid) -> Result<Trade>;
}

/// Weekly mistake aggregates.
#[async_trait]
pub trait MistakePatternStore: Send + Sync {
    /// Fold one tagged trade into the `(account, week, mistake)` aggregate:
    /// inserts the row on first sight, otherwise accumulates count and P&L.
    async fn upsert_weekly(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
        mistake: MistakeTag,
        delta_count: i64,
        delta_pnl: Decimal,
    ) -> Result<()>;

    /// All aggregates for one account and week.
    async fn weekly_patterns(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Vec<MistakePattern>>;
}
