//! The risk engine facade.
//!
//! One object that the API server and the sweep binary share. It wires
//! the pure breaker, sizer, and detector cores to storage and alerting,
//! and owns the policy around failures: lock writes are the only effect
//! allowed to fail an evaluation, audit and alert problems are logged
//! and swallowed, and mistake detection never fails the trade-close
//! pipeline it runs inside.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use prop_core::rules::{classify_symbol, pip_value_usd};
use prop_core::store::{AccountStore, LockUpdate, MistakePatternStore, TradeHistorySource};
use prop_core::types::{iso_week_start, AuditEntry, LockKind, MistakePattern, MistakeTag, Trade};
use prop_core::Result;

use crate::alerts::{AlertKind, AlertMessage, AlertOutbox};
use crate::circuit_breaker::{self, BreakerEffect, CircuitBreakerResult};
use crate::mistake_detector::{detect, DetectorConfig, DetectorSettings};
use crate::position_sizer::{compute_lot_size, stop_distance_pips, RiskComputation};

/// Inputs for a position-size quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeRequest {
    pub account_id: Uuid,
    pub symbol: String,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    /// Percent of current equity to risk, e.g. `1` for 1%.
    pub risk_pct: Decimal,
}

pub struct RiskEngine {
    accounts: Arc<dyn AccountStore>,
    trades: Arc<dyn TradeHistorySource>,
    patterns: Arc<dyn MistakePatternStore>,
    outbox: AlertOutbox,
    detector: DetectorConfig,
}

impl RiskEngine {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        trades: Arc<dyn TradeHistorySource>,
        patterns: Arc<dyn MistakePatternStore>,
        outbox: AlertOutbox,
    ) -> Self {
        Self {
            accounts,
            trades,
            patterns,
            outbox,
            detector: DetectorConfig::default(),
        }
    }

    pub fn with_detector_config(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Evaluate the circuit breaker for one account.
    ///
    /// With `check_only` the state of the world is reported and nothing
    /// is written, enqueued, or audited. Otherwise a trip persists the
    /// lock conditionally on the state observed at load; losing that
    /// race surfaces as `Error::LockConflict` and the caller simply
    /// re-evaluates. Audit and alert failures never fail the call.
    pub async fn evaluate_circuit_breaker(
        &self,
        account_id: Uuid,
        user_id: Option<Uuid>,
        check_only: bool,
    ) -> Result<CircuitBreakerResult> {
        let account = self.accounts.load(account_id).await?;
        let decision = circuit_breaker::evaluate(&account, user_id, Utc::now());
        let effects = decision.effects;
        let result = decision.result;

        if check_only || effects.is_empty() {
            return Ok(result);
        }

        let expected_prior = account.trading_locked_until;
        for effect in effects {
            match effect {
                BreakerEffect::PersistLock { update } => {
                    self.accounts
                        .update_lock(account_id, update, expected_prior)
                        .await?;
                }
                BreakerEffect::Audit(entry) => {
                    if let Err(e) = self.accounts.append_audit(&entry).await {
                        error!(
                            "Failed to record audit entry for account {}: {}",
                            account_id, e
                        );
                    }
                }
                BreakerEffect::Alert(message) => {
                    self.outbox.enqueue(account_id, message);
                }
            }
        }

        info!(
            "Circuit breaker tripped for account {}: {} ({})",
            account_id,
            result.breaker.as_str(),
            result.lock_reason.as_deref().unwrap_or("no reason")
        );
        Ok(result)
    }

    /// Lock an account by hand, e.g. after a risk-desk review.
    ///
    /// Takes the same conditional-write path as an automatic trip, so a
    /// concurrent evaluation cannot be silently overwritten.
    pub async fn apply_manual_lock(
        &self,
        account_id: Uuid,
        user_id: Option<Uuid>,
        locked_until: DateTime<Utc>,
        reason: String,
    ) -> Result<CircuitBreakerResult> {
        let account = self.accounts.load(account_id).await?;
        let expected_prior = account.trading_locked_until;

        self.accounts
            .update_lock(
                account_id,
                LockUpdate::lock(locked_until, reason.clone(), LockKind::Manual),
                expected_prior,
            )
            .await?;

        let entry = AuditEntry::new(
            account_id,
            user_id,
            LockKind::Manual,
            Decimal::ZERO,
            Decimal::ZERO,
            reason.clone(),
        );
        if let Err(e) = self.accounts.append_audit(&entry).await {
            error!(
                "Failed to record audit entry for account {}: {}",
                account_id, e
            );
        }

        self.outbox.enqueue(
            account_id,
            AlertMessage {
                kind: AlertKind::ManualLock,
                title: "Account locked by risk desk".to_string(),
                body: format!(
                    "Account {} locked until {} UTC. {}",
                    account_id,
                    locked_until.format("%Y-%m-%d %H:%M"),
                    reason
                ),
            },
        );

        info!("Manual lock applied to account {}", account_id);

        let (daily_loss_pct, daily_profit_pct) = circuit_breaker::daily_percentages(&account);
        Ok(CircuitBreakerResult {
            is_locked: true,
            breaker: LockKind::Manual,
            lock_reason: Some(reason),
            locked_until: Some(locked_until),
            daily_loss_pct,
            daily_profit_pct,
        })
    }

    /// Run mistake detection on a freshly closed trade.
    ///
    /// This sits on the trade-close path, so it never returns an error:
    /// a missing account or unavailable history degrades detection to
    /// whatever inputs remain, and pattern or alert failures are logged
    /// and dropped. `user_id` is the acting user, carried for log
    /// attribution only.
    pub async fn detect_mistakes(
        &self,
        trade: &Trade,
        user_id: Option<Uuid>,
    ) -> BTreeSet<MistakeTag> {
        let Some(closed_at) = trade.closed_at else {
            warn!("Mistake detection called on open trade {}", trade.id);
            return BTreeSet::new();
        };

        let settings = match self.accounts.load(trade.account_id).await {
            Ok(account) => DetectorSettings::from_account(&account),
            Err(e) => {
                warn!(
                    "Failed to load account {} for mistake detection, using defaults: {}",
                    trade.account_id, e
                );
                DetectorSettings::default()
            }
        };

        let since = trade.opened_at - Duration::hours(self.detector.history_window_hours);
        let recent = match self.trades.recent_trades(trade.account_id, since).await {
            Ok(trades) => trades,
            Err(e) => {
                warn!(
                    "Failed to load trade history for account {}, detection degraded: {}",
                    trade.account_id, e
                );
                Vec::new()
            }
        };

        let tags = detect(trade, &recent, &settings, &self.detector);
        if tags.is_empty() {
            debug!("No mistakes detected on trade {}", trade.id);
            return tags;
        }

        let week_start = iso_week_start(closed_at);
        let pnl = trade.pnl.unwrap_or(Decimal::ZERO);
        for tag in &tags {
            if let Err(e) = self
                .patterns
                .upsert_weekly(trade.account_id, week_start, *tag, 1, pnl)
                .await
            {
                warn!(
                    "Failed to record {} pattern for account {}: {}",
                    tag.as_str(),
                    trade.account_id,
                    e
                );
            }
        }

        let names: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        self.outbox.enqueue(
            trade.account_id,
            AlertMessage {
                kind: AlertKind::MistakeDetected,
                title: "Trading mistakes detected".to_string(),
                body: format!(
                    "Trade {} on {} flagged: {}",
                    trade.id,
                    trade.symbol,
                    names.join(", ")
                ),
            },
        );

        info!(
            user_id = ?user_id,
            "Detected mistakes on trade {} for account {}: {}",
            trade.id,
            trade.account_id,
            names.join(", ")
        );
        tags
    }

    /// Load a trade by id and run mistake detection on it.
    pub async fn detect_mistakes_for_trade(
        &self,
        trade_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<BTreeSet<MistakeTag>> {
        let trade = self.trades.trade(trade_id).await?;
        Ok(self.detect_mistakes(&trade, user_id).await)
    }

    /// Quote a position size for a prospective trade.
    pub async fn compute_position_size(&self, request: &SizeRequest) -> Result<RiskComputation> {
        let account = self.accounts.load(request.account_id).await?;

        let class = classify_symbol(&request.symbol);
        let stop_pips = stop_distance_pips(class, request.entry_price, request.stop_price);
        let pip_value = pip_value_usd(&request.symbol);

        let computation = compute_lot_size(
            account.current_equity,
            request.risk_pct,
            stop_pips,
            pip_value,
            &account.firm.rules(),
        );

        debug!(
            "Sized {} for account {}: {} lots ({} pips risk)",
            request.symbol, request.account_id, computation.lot_size, computation.stop_distance_pips
        );
        Ok(computation)
    }

    /// Weekly mistake aggregates for an account.
    pub async fn weekly_patterns(
        &self,
        account_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Vec<MistakePattern>> {
        self.patterns.weekly_patterns(account_id, week_start).await
    }

    /// Account ids the scheduled sweep should evaluate.
    pub async fn active_account_ids(&self) -> Result<Vec<Uuid>> {
        self.accounts.active_account_ids().await
    }
}
