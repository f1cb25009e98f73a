//! Trading account types and lock state.

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::PropFirm;
use crate::{Error, Result};

/// Which breaker placed the current lock, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// No lock in force.
    None,
    /// Personal daily loss limit reached.
    DailyLoss,
    /// Daily profit target reached with lock-after-target enabled.
    ProfitTarget,
    /// Current time is outside the allowed session window. Derived from the
    /// clock on every evaluation, never persisted.
    SessionTime,
    /// Applied by support staff.
    Manual,
}

impl LockKind {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::None => "none",
            LockKind::DailyLoss => "daily_loss",
            LockKind::ProfitTarget => "profit_target",
            LockKind::SessionTime => "session_time",
            LockKind::Manual => "manual",
        }
    }

    /// Parse the stored string form.
    pub fn parse_str(s: &str) -> Option<LockKind> {
        match s {
            "none" => Some(LockKind::None),
            "daily_loss" => Some(LockKind::DailyLoss),
            "profit_target" => Some(LockKind::ProfitTarget),
            "session_time" => Some(LockKind::SessionTime),
            "manual" => Some(LockKind::Manual),
            _ => None,
        }
    }
}

/// Minutes in a day; trading-hours bounds must stay below this.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Allowed session window in UTC minutes-of-day, inclusive on both ends.
///
/// A window with `start_minute > end_minute` wraps midnight: 22:00-02:00 is
/// `start_minute = 1320, end_minute = 120`, and 23:30 is inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingHours {
    pub start_minute: u16,
    pub end_minute: u16,
    pub enabled: bool,
}

impl TradingHours {
    /// Build a validated window. Both bounds must be valid minutes-of-day.
    pub fn new(start_minute: u16, end_minute: u16, enabled: bool) -> Result<Self> {
        if start_minute >= MINUTES_PER_DAY || end_minute >= MINUTES_PER_DAY {
            return Err(Error::InvalidTradingHours {
                start: start_minute as i32,
                end: end_minute as i32,
            });
        }
        Ok(Self {
            start_minute,
            end_minute,
            enabled,
        })
    }

    /// Membership test for a UTC minute-of-day.
    pub fn contains_minute(&self, minute: u16) -> bool {
        if self.start_minute <= self.end_minute {
            minute >= self.start_minute && minute <= self.end_minute
        } else {
            // Wraps midnight
            minute >= self.start_minute || minute <= self.end_minute
        }
    }

    /// Membership test for a timestamp, using its UTC minute-of-day.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.contains_minute((ts.hour() * 60 + ts.minute()) as u16)
    }
}

/// One funded or challenge trading account.
///
/// Equity fields are maintained by the external trade pipeline: `current_equity`
/// moves with every closed trade, `daily_starting_equity` is reset at UTC
/// midnight by the daily reset job. The lock fields are owned by the circuit
/// breaker and only ever change through `AccountStore::update_lock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for this account.
    pub id: Uuid,
    /// Prop firm the account belongs to (selects firm-level rules).
    pub firm: PropFirm,
    /// Balance at account creation.
    pub starting_balance: Decimal,
    /// Live equity including today's closed P&L.
    pub current_equity: Decimal,
    /// Equity snapshot at the most recent UTC midnight reset.
    pub daily_starting_equity: Decimal,
    /// Personal daily loss limit in percent; may be tighter than the firm's.
    pub daily_loss_limit_pct: Decimal,
    /// Optional daily profit target in account currency.
    pub daily_profit_target: Option<Decimal>,
    /// Lock the account for the rest of the day once the target is hit.
    pub lock_after_target: bool,
    /// Allowed session window; `None` means no restriction.
    pub trading_hours: Option<TradingHours>,
    /// Rolling average lot size, maintained externally. `None` disables the
    /// oversized-trade heuristic.
    pub average_lot_size: Option<Decimal>,
    /// Lock expiry; a lock is in force while this is in the future.
    /// Set and cleared together with `lock_reason`.
    pub trading_locked_until: Option<DateTime<Utc>>,
    /// Human-readable reason shown to the trader while locked.
    pub lock_reason: Option<String>,
    /// Which breaker placed the persisted lock.
    pub lock_kind: LockKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh unlocked account for the given firm.
    pub fn new(firm: PropFirm, starting_balance: Decimal, daily_loss_limit_pct: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            firm,
            starting_balance,
            current_equity: starting_balance,
            daily_starting_equity: starting_balance,
            daily_loss_limit_pct,
            daily_profit_target: None,
            lock_after_target: false,
            trading_hours: None,
            average_lot_size: None,
            trading_locked_until: None,
            lock_reason: None,
            lock_kind: LockKind::None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Today's signed P&L relative to the midnight snapshot.
    pub fn daily_pnl(&self) -> Decimal {
        self.current_equity - self.daily_starting_equity
    }

    /// True while a persisted lock has not yet expired.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.trading_locked_until, Some(until) if until > now)
    }
}
