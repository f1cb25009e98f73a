//! Daily circuit breaker.
//!
//! The breaker decides whether an account may trade right now. The core
//! is a pure function from account state and a clock reading to a
//! decision plus a list of side effects; the engine facade applies the
//! effects against storage and alerting. Keeping the core pure makes
//! every threshold and precedence rule testable without a database.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use prop_core::store::LockUpdate;
use prop_core::types::{Account, AuditEntry, LockKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alerts::{AlertKind, AlertMessage};

/// Outcome of a breaker evaluation, shaped for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerResult {
    /// Whether the account is blocked from trading right now.
    pub is_locked: bool,
    /// Which breaker is in force. `LockKind::None` when unlocked.
    pub breaker: LockKind,
    /// Human-readable reason, present whenever `is_locked` is true.
    pub lock_reason: Option<String>,
    /// Expiry of the lock. `None` for session locks, which end on their
    /// own when the trading window opens.
    pub locked_until: Option<DateTime<Utc>>,
    /// Today's loss as a percentage of daily starting equity (>= 0).
    pub daily_loss_pct: Decimal,
    /// Today's profit as a percentage of daily starting equity (>= 0).
    pub daily_profit_pct: Decimal,
}

/// A side effect the facade must apply after a trip decision.
#[derive(Debug, Clone)]
pub enum BreakerEffect {
    /// Write the lock to the account row, conditional on the lock state
    /// observed when the account was loaded.
    PersistLock { update: LockUpdate },
    /// Append an audit entry recording the trip.
    Audit(AuditEntry),
    /// Notify the account owner.
    Alert(AlertMessage),
}

/// A breaker decision: the result to report plus the effects to apply.
#[derive(Debug, Clone)]
pub struct BreakerDecision {
    pub result: CircuitBreakerResult,
    pub effects: Vec<BreakerEffect>,
}

/// First instant of the next UTC day.
///
/// Daily locks expire here rather than on a rolling 24h window so the
/// lock always ends when daily PnL resets.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = now.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&next_day.and_time(NaiveTime::MIN))
}

/// Account's daily loss limit clamped to what the firm allows.
fn effective_loss_limit(account: &Account) -> Decimal {
    account
        .daily_loss_limit_pct
        .min(account.firm.rules().max_daily_loss_pct)
}

/// Today's loss and profit as percentages of daily starting equity.
///
/// Both are non-negative; at most one is non-zero. A non-positive
/// starting equity yields zeros, a divide-by-zero guard for accounts
/// mid-provisioning.
pub fn daily_percentages(account: &Account) -> (Decimal, Decimal) {
    let dse = account.daily_starting_equity;
    let pnl = account.daily_pnl();
    if dse <= Decimal::ZERO {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        (
            pnl.min(Decimal::ZERO).abs() / dse * dec!(100),
            pnl.max(Decimal::ZERO) / dse * dec!(100),
        )
    }
}

/// Evaluate the circuit breaker for `account` at time `now`.
///
/// Checks run in a fixed order and the first hit wins:
///
/// 1. A persisted lock that has not expired is reported verbatim with
///    no new effects. Expired locks are ignored, not cleared.
/// 2. Daily loss at or beyond the effective limit trips a
///    `DailyLoss` lock until the next UTC midnight.
/// 3. Daily profit at or beyond the target trips a `ProfitTarget`
///    lock until the next UTC midnight, when the account opted in.
/// 4. Outside the configured trading window the account reports a
///    `SessionTime` lock with no expiry and no effects; it clears
///    itself when the window opens.
/// 5. Otherwise the account is unlocked.
///
/// Daily percentages are computed for every outcome so callers always
/// see where the account stands. A non-positive daily starting equity
/// zeroes both percentages and disables the loss and profit checks.
pub fn evaluate(account: &Account, user_id: Option<Uuid>, now: DateTime<Utc>) -> BreakerDecision {
    let dse = account.daily_starting_equity;
    let pnl = account.daily_pnl();
    let (daily_loss_pct, daily_profit_pct) = daily_percentages(account);

    // 1. Persisted lock still in force.
    if account.is_locked_at(now) {
        return BreakerDecision {
            result: CircuitBreakerResult {
                is_locked: true,
                breaker: account.lock_kind,
                lock_reason: account.lock_reason.clone(),
                locked_until: account.trading_locked_until,
                daily_loss_pct,
                daily_profit_pct,
            },
            effects: Vec::new(),
        };
    }

    // 2. Daily loss limit.
    let loss_limit = effective_loss_limit(account);
    if dse > Decimal::ZERO
        && loss_limit > Decimal::ZERO
        && pnl < Decimal::ZERO
        && daily_loss_pct >= loss_limit
    {
        let locked_until = next_utc_midnight(now);
        let reason = format!(
            "Daily loss limit hit: {:.2}% loss (limit {:.2}%)",
            daily_loss_pct, loss_limit
        );
        return trip(
            account,
            user_id,
            now,
            LockKind::DailyLoss,
            locked_until,
            reason,
            daily_loss_pct,
            loss_limit,
            AlertKind::DailyLossLock,
            daily_loss_pct,
            daily_profit_pct,
        );
    }

    // 3. Daily profit target, only when the account locks after target.
    //    The target is an account-currency amount, not a percentage.
    if let Some(target) = account.daily_profit_target {
        let profit = pnl.max(Decimal::ZERO);
        if account.lock_after_target
            && dse > Decimal::ZERO
            && target > Decimal::ZERO
            && profit >= target
        {
            let locked_until = next_utc_midnight(now);
            let reason = format!(
                "Daily profit target reached: {:.2} gain (target {:.2})",
                profit, target
            );
            return trip(
                account,
                user_id,
                now,
                LockKind::ProfitTarget,
                locked_until,
                reason,
                profit,
                target,
                AlertKind::ProfitTargetLock,
                daily_loss_pct,
                daily_profit_pct,
            );
        }
    }

    // 4. Trading session window. Advisory only: nothing is persisted
    //    and the lock ends the moment the window opens.
    if let Some(hours) = &account.trading_hours {
        if hours.enabled && !hours.contains(now) {
            let reason = format!(
                "Outside allowed trading hours ({:02}:{:02}-{:02}:{:02} UTC)",
                hours.start_minute / 60,
                hours.start_minute % 60,
                hours.end_minute / 60,
                hours.end_minute % 60
            );
            return BreakerDecision {
                result: CircuitBreakerResult {
                    is_locked: true,
                    breaker: LockKind::SessionTime,
                    lock_reason: Some(reason),
                    locked_until: None,
                    daily_loss_pct,
                    daily_profit_pct,
                },
                effects: Vec::new(),
            };
        }
    }

    // 5. Clear to trade.
    BreakerDecision {
        result: CircuitBreakerResult {
            is_locked: false,
            breaker: LockKind::None,
            lock_reason: None,
            locked_until: None,
            daily_loss_pct,
            daily_profit_pct,
        },
        effects: Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn trip(
    account: &Account,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
    kind: LockKind,
    locked_until: DateTime<Utc>,
    reason: String,
    trigger_value: Decimal,
    threshold: Decimal,
    alert_kind: AlertKind,
    daily_loss_pct: Decimal,
    daily_profit_pct: Decimal,
) -> BreakerDecision {
    let audit = AuditEntry {
        id: 0,
        account_id: account.id,
        user_id,
        kind,
        trigger_value,
        threshold,
        message: reason.clone(),
        created_at: now,
    };
    let alert = AlertMessage {
        kind: alert_kind,
        title: match kind {
            LockKind::ProfitTarget => "Profit target reached".to_string(),
            _ => "Daily loss breaker tripped".to_string(),
        },
        body: format!(
            "Account {} locked until {} UTC. {}",
            account.id,
            locked_until.format("%Y-%m-%d %H:%M"),
            reason
        ),
    };

    BreakerDecision {
        result: CircuitBreakerResult {
            is_locked: true,
            breaker: kind,
            lock_reason: Some(reason.clone()),
            locked_until: Some(locked_until),
            daily_loss_pct,
            daily_profit_pct,
        },
        effects: vec![
            BreakerEffect::PersistLock {
                update: LockUpdate::lock(locked_until, reason, kind),
            },
            BreakerEffect::Audit(audit),
            BreakerEffect::Alert(alert),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prop_core::rules::PropFirm;
    use prop_core::types::TradingHours;

    fn account_with(dse: Decimal, pnl: Decimal, loss_limit_pct: Decimal) -> Account {
        let mut account = Account::new(PropFirm::Ftmo, dse, loss_limit_pct);
        account.current_equity = dse + pnl;
        account
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_loss_trips_until_next_midnight() {
        let account = account_with(dec!(10_000), dec!(-350), dec!(3));
        let now = at(2025, 3, 10, 15, 30);

        let decision = evaluate(&account, None, now);
        let result = &decision.result;

        assert!(result.is_locked);
        assert_eq!(result.breaker, LockKind::DailyLoss);
        assert_eq!(result.locked_until, Some(at(2025, 3, 11, 0, 0)));
        assert_eq!(result.daily_loss_pct, dec!(3.5));
        assert_eq!(result.daily_profit_pct, Decimal::ZERO);
        assert_eq!(decision.effects.len(), 3);

        match &decision.effects[0] {
            BreakerEffect::PersistLock { update } => {
                assert_eq!(update.kind, LockKind::DailyLoss);
                assert_eq!(update.locked_until, Some(at(2025, 3, 11, 0, 0)));
            }
            other => panic!("expected PersistLock first, got {:?}", other),
        }
        match &decision.effects[1] {
            BreakerEffect::Audit(entry) => {
                assert_eq!(entry.account_id, account.id);
                assert_eq!(entry.kind, LockKind::DailyLoss);
                assert_eq!(entry.trigger_value, dec!(3.5));
                assert_eq!(entry.threshold, dec!(3));
                assert_eq!(entry.created_at, now);
            }
            other => panic!("expected Audit second, got {:?}", other),
        }
        match &decision.effects[2] {
            BreakerEffect::Alert(alert) => {
                assert_eq!(alert.kind, AlertKind::DailyLossLock);
                assert!(alert.body.contains("Daily loss limit hit"));
            }
            other => panic!("expected Alert third, got {:?}", other),
        }
    }

    #[test]
    fn test_loss_below_limit_stays_unlocked() {
        let account = account_with(dec!(10_000), dec!(-299), dec!(3));

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(!decision.result.is_locked);
        assert_eq!(decision.result.breaker, LockKind::None);
        assert_eq!(decision.result.daily_loss_pct, dec!(2.99));
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_loss_exactly_at_limit_trips() {
        let account = account_with(dec!(10_000), dec!(-300), dec!(3));

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(decision.result.is_locked);
        assert_eq!(decision.result.breaker, LockKind::DailyLoss);
    }

    #[test]
    fn test_firm_rules_clamp_account_limit() {
        // FTMO caps daily loss at 5%; an account configured at 8% trips at 5%.
        let account = account_with(dec!(10_000), dec!(-550), dec!(8));

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(decision.result.is_locked);
        assert_eq!(decision.result.breaker, LockKind::DailyLoss);
        assert!(decision
            .result
            .lock_reason
            .as_deref()
            .is_some_and(|r| r.contains("limit 5.00%")));
    }

    #[test]
    fn test_profit_target_trips_when_opted_in() {
        let mut account = account_with(dec!(10_000), dec!(250), dec!(3));
        account.daily_profit_target = Some(dec!(200));
        account.lock_after_target = true;

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));
        let result = &decision.result;

        assert!(result.is_locked);
        assert_eq!(result.breaker, LockKind::ProfitTarget);
        assert_eq!(result.locked_until, Some(at(2025, 3, 11, 0, 0)));
        assert_eq!(result.daily_profit_pct, dec!(2.5));
        assert!(result
            .lock_reason
            .as_deref()
            .is_some_and(|r| r.contains("250.00 gain (target 200.00)")));
        assert_eq!(decision.effects.len(), 3);
    }

    #[test]
    fn test_profit_below_target_stays_unlocked() {
        let mut account = account_with(dec!(10_000), dec!(150), dec!(3));
        account.daily_profit_target = Some(dec!(200));
        account.lock_after_target = true;

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(!decision.result.is_locked);
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_profit_target_without_opt_in_is_ignored() {
        let mut account = account_with(dec!(10_000), dec!(250), dec!(3));
        account.daily_profit_target = Some(dec!(200));
        account.lock_after_target = false;

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(!decision.result.is_locked);
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_session_lock_outside_hours_has_no_effects() {
        let mut account = account_with(dec!(10_000), dec!(50), dec!(3));
        // 22:00 to 02:00 UTC, wrapping midnight.
        account.trading_hours = Some(TradingHours::new(1320, 120, true).unwrap());

        let decision = evaluate(&account, None, at(2025, 3, 10, 12, 0));
        let result = &decision.result;

        assert!(result.is_locked);
        assert_eq!(result.breaker, LockKind::SessionTime);
        assert_eq!(result.locked_until, None);
        assert_eq!(
            result.lock_reason.as_deref(),
            Some("Outside allowed trading hours (22:00-02:00 UTC)")
        );
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_inside_wrapped_session_window_is_unlocked() {
        let mut account = account_with(dec!(10_000), dec!(50), dec!(3));
        account.trading_hours = Some(TradingHours::new(1320, 120, true).unwrap());

        let decision = evaluate(&account, None, at(2025, 3, 10, 23, 30));

        assert!(!decision.result.is_locked);
    }

    #[test]
    fn test_disabled_session_window_is_ignored() {
        let mut account = account_with(dec!(10_000), dec!(50), dec!(3));
        account.trading_hours = Some(TradingHours::new(1320, 120, false).unwrap());

        let decision = evaluate(&account, None, at(2025, 3, 10, 12, 0));

        assert!(!decision.result.is_locked);
    }

    #[test]
    fn test_daily_loss_takes_precedence_over_session() {
        let mut account = account_with(dec!(10_000), dec!(-400), dec!(3));
        account.trading_hours = Some(TradingHours::new(1320, 120, true).unwrap());

        // Outside the window and over the loss limit: the loss lock wins.
        let decision = evaluate(&account, None, at(2025, 3, 10, 12, 0));

        assert_eq!(decision.result.breaker, LockKind::DailyLoss);
        assert_eq!(decision.effects.len(), 3);
    }

    #[test]
    fn test_active_persisted_lock_reported_verbatim() {
        let mut account = account_with(dec!(10_000), dec!(100), dec!(3));
        account.trading_locked_until = Some(at(2025, 3, 11, 0, 0));
        account.lock_reason = Some("Manual risk review".to_string());
        account.lock_kind = LockKind::Manual;

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));
        let result = &decision.result;

        assert!(result.is_locked);
        assert_eq!(result.breaker, LockKind::Manual);
        assert_eq!(result.lock_reason.as_deref(), Some("Manual risk review"));
        assert_eq!(result.locked_until, Some(at(2025, 3, 11, 0, 0)));
        assert_eq!(result.daily_profit_pct, dec!(1));
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_expired_lock_is_ignored() {
        let mut account = account_with(dec!(10_000), dec!(100), dec!(3));
        account.trading_locked_until = Some(at(2025, 3, 10, 0, 0));
        account.lock_reason = Some("Yesterday's loss lock".to_string());
        account.lock_kind = LockKind::DailyLoss;

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(!decision.result.is_locked);
        assert_eq!(decision.result.breaker, LockKind::None);
    }

    #[test]
    fn test_zero_starting_equity_disables_percentage_checks() {
        let account = account_with(Decimal::ZERO, dec!(-500), dec!(3));

        let decision = evaluate(&account, None, at(2025, 3, 10, 15, 30));

        assert!(!decision.result.is_locked);
        assert_eq!(decision.result.daily_loss_pct, Decimal::ZERO);
        assert_eq!(decision.result.daily_profit_pct, Decimal::ZERO);
    }

    #[test]
    fn test_next_utc_midnight() {
        assert_eq!(
            next_utc_midnight(at(2025, 3, 10, 15, 30)),
            at(2025, 3, 11, 0, 0)
        );
        assert_eq!(
            next_utc_midnight(at(2025, 12, 31, 23, 59)),
            at(2026, 1, 1, 0, 0)
        );
    }

    #[test]
    fn test_audit_user_id_carried_through() {
        let account = account_with(dec!(10_000), dec!(-350), dec!(3));
        let user = Uuid::new_v4();

        let decision = evaluate(&account, Some(user), at(2025, 3, 10, 15, 30));

        match &decision.effects[1] {
            BreakerEffect::Audit(entry) => assert_eq!(entry.user_id, Some(user)),
            other => panic!("expected Audit, got {:?}", other),
        }
    }
}
