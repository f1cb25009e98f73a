//! In-memory storage for tests.
//!
//! Mirrors the Postgres implementations' semantics, including the conditional
//! lock update, so engine tests can assert side effects precisely.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{AccountStore, LockUpdate, MistakePatternStore, TradeHistorySource};
use crate::types::{Account, AuditEntry, MistakePattern, MistakeTag, Trade};
use crate::{Error, Result};

/// In-memory account store.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<Uuid, Account>,
    audit: Arc<tokio::sync::RwLock<Vec<AuditEntry>>>,
    next_audit_id: AtomicI64,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            audit: Arc::new(tokio::sync::RwLock::new(Vec::new())),
            next_audit_id: AtomicI64::new(1),
        }
    }

    /// Seed an account.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Current state of an account, for assertions.
    pub fn get(&self, account_id: Uuid) -> Option<Account> {
        self.accounts.get(&account_id).map(|a| a.clone())
    }

    /// Everything written to the audit trail so far.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().await.clone()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn load(&self, account_id: Uuid) -> Result<Account> {
        self.accounts
            .get(&account_id)
            .map(|a| a.clone())
            .ok_or(Error::AccountNotFound(account_id))
    }

    async fn update_lock(
        &self,
        account_id: Uuid,
        update: LockUpdate,
        expected_prior: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut account = self
            .accounts
            .get_mut(&account_id)
            .ok_or(Error::AccountNotFound(account_id))?;

        if account.trading_locked_until != expected_prior {
            return Err(Error::LockConflict(account_id));
        }

        account.trading_locked_until = update.locked_until;
        account.lock_reason = update.reason;
        account.lock_kind = update.kind;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<i64> {
        let id = self.next_audit_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = id;
        self.audit.write().await.push(stored);
        Ok(id)
    }

    async fn active_account_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.accounts.iter().map(|a| *a.key()).collect())
    }
}

/// In-memory trade history.
#[derive(Default)]
pub struct MemoryTradeHistory {
    by_account: DashMap<Uuid, Vec<Trade>>,
}

impl MemoryTradeHistory {
    pub fn new() -> Self {
        Self {
            by_account: DashMap::new(),
        }
    }

    /// Record a trade.
    pub fn push(&self, trade: Trade) {
        self.by_account
            .entry(trade.account_id)
            .or_default()
            .push(trade);
    }
}

#[async_trait]
impl TradeHistorySource for MemoryTradeHistory {
    async fn recent_trades(&self, account_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .by_account
            .get(&account_id)
            .map(|v| {
                v.iter()
                    .filter(|t| matches!(t.closed_at, Some(closed) if closed >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        trades.sort_by_key(|t| std::cmp::Reverse(t.closed_at));
        Ok(trades)
    }

    async fn trade(&self, trade_id: Uuid) -> Result<Trade> {
        self.by_account
            .iter()
            .find_map(|entry| entry.value().iter().find(|t| t.id == trade_id).cloned())
            .ok_or(Error::TradeNotFound(trade_id))
    }
}

/// In-memory weekly mistake aggregates.
#[derive(Default)]
pub struct MemoryMistakePatternStore {
    rows: DashMap<(Uuid, NaiveDate, MistakeTag), (i64, Decimal)>,
}

impl MemoryMistakePatternStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

#[async_trait]
impl MistakePatternStore for MemoryMistakePatternStore {
    async fn upsert_weekly(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
        mistake: MistakeTag,
        delta_count: i64,
        delta_pnl: Decimal,
    ) -> Result<()> {
        let mut row = self
            .rows
            .entry((account_id, week_start, mistake))
            .or_insert((0, Decimal::ZERO));
        row.0 += delta_count;
        row.1 += delta_pnl;
        Ok(())
    }

    async fn weekly_patterns(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Vec<MistakePattern>> {
        let mut patterns: Vec<MistakePattern> = self
            .rows
            .iter()
            .filter(|entry| {
                let (acct, week, _) = entry.key();
                *acct == account_id && *week == week_start
            })
            .map(|entry| {
                let (acct, week, mistake) = *entry.key();
                let (count, pnl_impact) = *entry.value();
                MistakePattern {
                    account_id: acct,
                    week_start: week,
                    mistake,
                    count,
                    pnl_impact,
                }
            })
            .collect();

        patterns.sort_by_key(|p| p.mistake);
        Ok(patterns)
    }
}
