//! Postgres implementations of the storage contracts.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::rules::PropFirm;
use crate::store::{AccountStore, LockUpdate, MistakePatternStore, TradeHistorySource};
use crate::types::{
    Account, AuditEntry, LockKind, MistakePattern, MistakeTag, Trade, TradeDirection, TradingHours,
};
use crate::{Error, Result};

const ACCOUNT_COLUMNS: &str = r#"
    id, firm, starting_balance, current_equity, daily_starting_equity,
    daily_loss_limit_pct, daily_profit_target, lock_after_target,
    trading_hours_start, trading_hours_end, trading_hours_enabled,
    average_lot_size, trading_locked_until, lock_reason, lock_kind,
    created_at, updated_at
"#;

/// Account state in the `accounts` table.
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert a database row to an Account. Trading hours are validated
    /// here, at the storage boundary.
    fn row_to_account(r: &PgRow) -> Result<Account> {
        let trading_hours = match (
            r.get::<Option<i32>, _>("trading_hours_start"),
            r.get::<Option<i32>, _>("trading_hours_end"),
        ) {
            (Some(start), Some(end)) => {
                let start_minute =
                    u16::try_from(start).map_err(|_| Error::InvalidTradingHours { start, end })?;
                let end_minute =
                    u16::try_from(end).map_err(|_| Error::InvalidTradingHours { start, end })?;
                Some(TradingHours::new(
                    start_minute,
                    end_minute,
                    r.get::<Option<bool>, _>("trading_hours_enabled")
                        .unwrap_or(false),
                )?)
            }
            _ => None,
        };

        Ok(Account {
            id: r.get("id"),
            // An unknown firm string falls back to the tightest rule set
            firm: PropFirm::parse_str(r.get("firm")).unwrap_or(PropFirm::InHouse),
            starting_balance: r.get("starting_balance"),
            current_equity: r.get("current_equity"),
            daily_starting_equity: r.get("daily_starting_equity"),
            daily_loss_limit_pct: r.get("daily_loss_limit_pct"),
            daily_profit_target: r.get("daily_profit_target"),
            lock_after_target: r.get("lock_after_target"),
            trading_hours,
            average_lot_size: r.get("average_lot_size"),
            trading_locked_until: r.get("trading_locked_until"),
            lock_reason: r.get("lock_reason"),
            lock_kind: r
                .get::<Option<String>, _>("lock_kind")
                .and_then(|s| LockKind::parse_str(&s))
                .unwrap_or(LockKind::None),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn load(&self, account_id: Uuid) -> Result<Account> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Self::row_to_account(&r),
            None => Err(Error::AccountNotFound(account_id)),
        }
    }

    async fn update_lock(
        &self,
        account_id: Uuid,
        update: LockUpdate,
        expected_prior: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                trading_locked_until = $2,
                lock_reason = $3,
                lock_kind = $4,
                updated_at = NOW()
            WHERE id = $1 AND trading_locked_until IS NOT DISTINCT FROM $5
            "#,
        )
        .bind(account_id)
        .bind(update.locked_until)
        .bind(&update.reason)
        .bind(update.kind.as_str())
        .bind(expected_prior)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either a concurrent evaluation moved the lock or the account is gone
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(Error::LockConflict(account_id)),
                None => Err(Error::AccountNotFound(account_id)),
            };
        }

        debug!(
            account_id = %account_id,
            kind = update.kind.as_str(),
            locked_until = ?update.locked_until,
            "Applied lock update"
        );
        Ok(())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO risk_audit_log (
                account_id, user_id, kind, trigger_value, threshold, message, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(entry.account_id)
        .bind(entry.user_id)
        .bind(entry.kind.as_str())
        .bind(entry.trigger_value)
        .bind(entry.threshold)
        .bind(&entry.message)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn active_account_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM accounts WHERE archived_at IS NULL")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }
}

const TRADE_COLUMNS: &str = r#"
    id, account_id, symbol, direction, lot_size, entry_price,
    exit_price, pnl, opened_at, closed_at
"#;

/// Trade history in the `trades` table, written by the trade pipeline.
pub struct PgTradeHistory {
    pool: PgPool,
}

impl PgTradeHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_trade(r: &PgRow) -> Trade {
        Trade {
            id: r.get("id"),
            account_id: r.get("account_id"),
            symbol: r.get("symbol"),
            direction: match r.get::<&str, _>("direction") {
                "sell" => TradeDirection::Sell,
                _ => TradeDirection::Buy,
            },
            lot_size: r.get("lot_size"),
            entry_price: r.get("entry_price"),
            exit_price: r.get("exit_price"),
            pnl: r.get("pnl"),
            opened_at: r.get("opened_at"),
            closed_at: r.get("closed_at"),
        }
    }
}

#[async_trait]
impl TradeHistorySource for PgTradeHistory {
    async fn recent_trades(&self, account_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Trade>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRADE_COLUMNS}
            FROM trades
            WHERE account_id = $1 AND closed_at IS NOT NULL AND closed_at >= $2
            ORDER BY closed_at DESC
            "#
        ))
        .bind(account_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_trade).collect())
    }

    async fn trade(&self, trade_id: Uuid) -> Result<Trade> {
        let row = sqlx::query(&format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = $1"))
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_trade(&r))
            .ok_or(Error::TradeNotFound(trade_id))
    }
}

/// Weekly mistake aggregates in the `mistake_patterns` table.
pub struct PgMistakePatternStore {
    pool: PgPool,
}

impl PgMistakePatternStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MistakePatternStore for PgMistakePatternStore {
    async fn upsert_weekly(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
        mistake: MistakeTag,
        delta_count: i64,
        delta_pnl: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO mistake_patterns (account_id, week_start, mistake, count, pnl_impact)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id, week_start, mistake) DO UPDATE SET
                count = mistake_patterns.count + EXCLUDED.count,
                pnl_impact = mistake_patterns.pnl_impact + EXCLUDED.pnl_impact,
                updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(week_start)
        .bind(mistake.as_str())
        .bind(delta_count)
        .bind(delta_pnl)
        .execute(&self.pool)
        .await?;

        debug!(
            account_id = %account_id,
            week_start = %week_start,
            mistake = mistake.as_str(),
            "Accumulated weekly mistake pattern"
        );
        Ok(())
    }

    async fn weekly_patterns(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Vec<MistakePattern>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, week_start, mistake, count, pnl_impact
            FROM mistake_patterns
            WHERE account_id = $1 AND week_start = $2
            ORDER BY mistake
            "#,
        )
        .bind(account_id)
        .bind(week_start)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|r| {
                let raw: String = r.get("mistake");
                let Some(mistake) = MistakeTag::parse_str(&raw) else {
                    warn!(mistake = %raw, "Skipping pattern row with unknown mistake tag");
                    return None;
                };
                Some(MistakePattern {
                    account_id: r.get("account_id"),
                    week_start: r.get("week_start"),
                    mistake,
                    count: r.get("count"),
                    pnl_impact: r.get("pnl_impact"),
                })
            })
            .collect())
    }
}
