//! Behavioral mistake tags and their weekly aggregates.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A behavioral mistake detected on a closed trade.
///
/// Tags are independent heuristics; one trade can carry several. `Ord` so
/// detection results come back as an ordered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MistakeTag {
    /// Opened within minutes of closing another trade (chasing the market).
    Fomo,
    /// Opened shortly after closing a losing trade.
    Revenge,
    /// Lot size well above the trader's rolling average.
    Oversized,
    /// Opened outside the account's allowed session window.
    SessionViolation,
}

impl MistakeTag {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MistakeTag::Fomo => "fomo",
            MistakeTag::Revenge => "revenge",
            MistakeTag::Oversized => "oversized",
            MistakeTag::SessionViolation => "session_violation",
        }
    }

    /// Parse the stored string form.
    pub fn parse_str(s: &str) -> Option<MistakeTag> {
        match s {
            "fomo" => Some(MistakeTag::Fomo),
            "revenge" => Some(MistakeTag::Revenge),
            "oversized" => Some(MistakeTag::Oversized),
            "session_violation" => Some(MistakeTag::SessionViolation),
            _ => None,
        }
    }
}

/// Weekly aggregate of one mistake kind on one account.
///
/// Keyed by (account, ISO week start, mistake); counts and P&L impact
/// accumulate as trades are tagged during the week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MistakePattern {
    pub account_id: Uuid,
    /// Monday of the ISO week the tagged trades closed in.
    pub week_start: NaiveDate,
    pub mistake: MistakeTag,
    /// How many trades carried this tag during the week.
    pub count: i64,
    /// Cumulative signed P&L of the tagged trades.
    pub pnl_impact: Decimal,
}

/// Monday of the ISO week containing `ts`, in UTC.
pub fn iso_week_start(ts: DateTime<Utc>) -> NaiveDate {
    iso_week_start_date(ts.date_naive())
}

/// Monday of the ISO week containing `date`.
pub fn iso_week_start_date(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}
