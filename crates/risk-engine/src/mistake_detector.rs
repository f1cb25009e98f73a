//! Behavioral mistake detection.
//!
//! Tags freshly closed trades with the trading mistakes they exhibit:
//! FOMO re-entries, revenge trades after a loss, oversized positions,
//! and trades opened outside the account's session window. Detection is
//! a pure function over the trade and its recent history; persistence
//! and alerting live in the engine facade.

use std::collections::BTreeSet;

use chrono::Duration;
use prop_core::types::{Account, MistakeTag, Trade, TradingHours};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tuning knobs for the detector heuristics.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// A trade opened within this many minutes of any prior close is FOMO.
    pub fomo_window_minutes: i64,
    /// A trade opened within this many minutes of a losing close is revenge.
    pub revenge_window_minutes: i64,
    /// Lot sizes strictly above `average * factor` are oversized.
    pub oversize_factor: Decimal,
    /// How far back trade history is pulled for detection.
    pub history_window_hours: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fomo_window_minutes: 5,
            revenge_window_minutes: 10,
            oversize_factor: dec!(1.5),
            history_window_hours: 24,
        }
    }
}

/// Per-account inputs the heuristics need beyond the trade history.
#[derive(Debug, Clone, Default)]
pub struct DetectorSettings {
    /// Account's typical lot size. `None` disables the oversize check.
    pub average_lot_size: Option<Decimal>,
    /// Session window. `None` or disabled hours skip the session check.
    pub trading_hours: Option<TradingHours>,
}

impl DetectorSettings {
    pub fn from_account(account: &Account) -> Self {
        Self {
            average_lot_size: account.average_lot_size,
            trading_hours: account.trading_hours,
        }
    }
}

/// Detect mistakes in `trade` given the account's recent closed trades.
///
/// `recent` is the history window around the trade; order does not
/// matter. The trade itself, still-open trades, and trades closed after
/// this one opened are all ignored. Revenge looks only at the most
/// recent prior close so one losing trade hours ago cannot taint every
/// trade that follows; FOMO counts a quick re-entry after any close.
pub fn detect(
    trade: &Trade,
    recent: &[Trade],
    settings: &DetectorSettings,
    config: &DetectorConfig,
) -> BTreeSet<MistakeTag> {
    let mut tags = BTreeSet::new();

    let prior_closes: Vec<&Trade> = recent
        .iter()
        .filter(|t| t.id != trade.id)
        .filter(|t| t.closed_at.is_some_and(|c| c <= trade.opened_at))
        .collect();

    let fomo_window = Duration::minutes(config.fomo_window_minutes);
    if prior_closes
        .iter()
        .filter_map(|t| t.closed_at)
        .any(|closed| trade.opened_at - closed <= fomo_window)
    {
        tags.insert(MistakeTag::Fomo);
    }

    let revenge_window = Duration::minutes(config.revenge_window_minutes);
    if let Some(last) = prior_closes.iter().max_by_key(|t| t.closed_at) {
        let lost = last.pnl.is_some_and(|p| p < Decimal::ZERO);
        let within = last
            .closed_at
            .is_some_and(|closed| trade.opened_at - closed <= revenge_window);
        if lost && within {
            tags.insert(MistakeTag::Revenge);
        }
    }

    if let Some(average) = settings.average_lot_size {
        if average > Decimal::ZERO && trade.lot_size > average * config.oversize_factor {
            tags.insert(MistakeTag::Oversized);
        }
    }

    if let Some(hours) = &settings.trading_hours {
        if hours.enabled && !hours.contains(trade.opened_at) {
            tags.insert(MistakeTag::SessionViolation);
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use prop_core::types::TradeDirection;
    use uuid::Uuid;

    fn at(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, mi, 0).unwrap()
    }

    fn open_at(account_id: Uuid, lot_size: Decimal, opened_at: DateTime<Utc>) -> Trade {
        Trade::new(
            account_id,
            "EURUSD".to_string(),
            TradeDirection::Buy,
            lot_size,
            dec!(1.0850),
            opened_at,
        )
    }

    fn closed(
        account_id: Uuid,
        opened_at: DateTime<Utc>,
        closed_at: DateTime<Utc>,
        pnl: Decimal,
    ) -> Trade {
        let mut trade = open_at(account_id, dec!(0.50), opened_at);
        trade.close(dec!(1.0900), pnl, closed_at).unwrap();
        trade
    }

    fn defaults() -> (DetectorSettings, DetectorConfig) {
        (DetectorSettings::default(), DetectorConfig::default())
    }

    #[test]
    fn test_reentry_three_minutes_after_close_is_fomo() {
        let account = Uuid::new_v4();
        let prior = closed(account, at(10, 0), at(10, 30), dec!(120));
        let trade = open_at(account, dec!(0.50), at(10, 33));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[prior], &settings, &config);

        assert!(tags.contains(&MistakeTag::Fomo));
        assert!(!tags.contains(&MistakeTag::Revenge));
    }

    #[test]
    fn test_reentry_after_five_minutes_boundary_is_fomo() {
        let account = Uuid::new_v4();
        let prior = closed(account, at(10, 0), at(10, 30), dec!(120));
        let trade = open_at(account, dec!(0.50), at(10, 35));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[prior], &settings, &config);

        assert!(tags.contains(&MistakeTag::Fomo));
    }

    #[test]
    fn test_reentry_after_six_minutes_is_not_fomo() {
        let account = Uuid::new_v4();
        let prior = closed(account, at(10, 0), at(10, 30), dec!(120));
        let trade = open_at(account, dec!(0.50), at(10, 36));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[prior], &settings, &config);

        assert!(tags.is_empty());
    }

    #[test]
    fn test_quick_reentry_after_loss_is_fomo_and_revenge() {
        let account = Uuid::new_v4();
        let loser = closed(account, at(10, 0), at(10, 30), dec!(-80));
        let trade = open_at(account, dec!(0.50), at(10, 33));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[loser], &settings, &config);

        assert!(tags.contains(&MistakeTag::Fomo));
        assert!(tags.contains(&MistakeTag::Revenge));
    }

    #[test]
    fn test_reentry_seven_minutes_after_loss_is_revenge_only() {
        let account = Uuid::new_v4();
        let loser = closed(account, at(10, 0), at(10, 30), dec!(-80));
        let trade = open_at(account, dec!(0.50), at(10, 37));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[loser], &settings, &config);

        assert!(!tags.contains(&MistakeTag::Fomo));
        assert!(tags.contains(&MistakeTag::Revenge));
    }

    #[test]
    fn test_twelve_minutes_after_loss_is_clean() {
        let account = Uuid::new_v4();
        let loser = closed(account, at(10, 0), at(10, 30), dec!(-80));
        let trade = open_at(account, dec!(0.50), at(10, 42));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[loser], &settings, &config);

        assert!(tags.is_empty());
    }

    #[test]
    fn test_revenge_looks_at_most_recent_close_only() {
        let account = Uuid::new_v4();
        // A loss 30 minutes back, then a winner 2 minutes before entry.
        let loser = closed(account, at(9, 0), at(10, 3), dec!(-80));
        let winner = closed(account, at(10, 0), at(10, 31), dec!(40));
        let trade = open_at(account, dec!(0.50), at(10, 33));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[loser.clone(), winner.clone()], &settings, &config);
        assert!(tags.contains(&MistakeTag::Fomo));
        assert!(!tags.contains(&MistakeTag::Revenge));

        // Order of the history slice does not matter.
        let tags = detect(&trade, &[winner, loser], &settings, &config);
        assert!(!tags.contains(&MistakeTag::Revenge));
    }

    #[test]
    fn test_open_trades_and_later_closes_are_ignored() {
        let account = Uuid::new_v4();
        let still_open = open_at(account, dec!(0.50), at(10, 30));
        // Overlapping trade that closed after this one opened.
        let closed_later = closed(account, at(10, 0), at(11, 0), dec!(-80));
        let trade = open_at(account, dec!(0.50), at(10, 33));
        let (settings, config) = defaults();

        let tags = detect(&trade, &[still_open, closed_later], &settings, &config);

        assert!(tags.is_empty());
    }

    #[test]
    fn test_trade_does_not_match_itself() {
        let account = Uuid::new_v4();
        let mut trade = open_at(account, dec!(0.50), at(10, 33));
        trade.close(dec!(1.0900), dec!(-50), at(10, 35)).unwrap();
        let (settings, config) = defaults();

        let tags = detect(&trade, &[trade.clone()], &settings, &config);

        assert!(tags.is_empty());
    }

    #[test]
    fn test_oversize_is_strictly_above_factor() {
        let account = Uuid::new_v4();
        let settings = DetectorSettings {
            average_lot_size: Some(dec!(0.50)),
            trading_hours: None,
        };
        let config = DetectorConfig::default();

        // 0.50 * 1.5 = 0.75 exactly: not oversized.
        let at_boundary = open_at(account, dec!(0.75), at(10, 0));
        assert!(detect(&at_boundary, &[], &settings, &config).is_empty());

        let above = open_at(account, dec!(0.76), at(10, 0));
        let tags = detect(&above, &[], &settings, &config);
        assert!(tags.contains(&MistakeTag::Oversized));
    }

    #[test]
    fn test_no_average_lot_size_disables_oversize() {
        let account = Uuid::new_v4();
        let trade = open_at(account, dec!(25), at(10, 0));
        let (settings, config) = defaults();

        assert!(detect(&trade, &[], &settings, &config).is_empty());
    }

    #[test]
    fn test_session_violation_uses_open_time() {
        let account = Uuid::new_v4();
        let settings = DetectorSettings {
            average_lot_size: None,
            // 08:00 to 17:00 UTC.
            trading_hours: Some(TradingHours::new(480, 1020, true).unwrap()),
        };
        let config = DetectorConfig::default();

        let outside = open_at(account, dec!(0.50), at(19, 0));
        let tags = detect(&outside, &[], &settings, &config);
        assert!(tags.contains(&MistakeTag::SessionViolation));

        let inside = open_at(account, dec!(0.50), at(12, 0));
        assert!(detect(&inside, &[], &settings, &config).is_empty());
    }

    #[test]
    fn test_disabled_hours_skip_session_check() {
        let account = Uuid::new_v4();
        let settings = DetectorSettings {
            average_lot_size: None,
            trading_hours: Some(TradingHours::new(480, 1020, false).unwrap()),
        };
        let config = DetectorConfig::default();

        let outside = open_at(account, dec!(0.50), at(19, 0));
        assert!(detect(&outside, &[], &settings, &config).is_empty());
    }

    #[test]
    fn test_multiple_tags_accumulate() {
        let account = Uuid::new_v4();
        let loser = closed(account, at(12, 0), at(12, 30), dec!(-80));
        let settings = DetectorSettings {
            average_lot_size: Some(dec!(0.50)),
            trading_hours: Some(TradingHours::new(480, 600, true).unwrap()),
        };
        let config = DetectorConfig::default();

        // 12:33 is outside 08:00-10:00, 3 minutes after a loss, at 2x average size.
        let trade = open_at(account, dec!(1.00), at(12, 33));
        let tags = detect(&trade, &[loser], &settings, &config);

        assert_eq!(tags.len(), 4);
        assert!(tags.contains(&MistakeTag::Fomo));
        assert!(tags.contains(&MistakeTag::Revenge));
        assert!(tags.contains(&MistakeTag::Oversized));
        assert!(tags.contains(&MistakeTag::SessionViolation));
    }
}
