//! Mistake detection handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use prop_core::types::{iso_week_start, iso_week_start_date, MistakePattern};

use crate::error::ApiResult;
use crate::state::AppState;

/// Result of scanning one trade for behavioral mistakes.
#[derive(Debug, Serialize, ToSchema)]
pub struct MistakeScanResponse {
    pub trade_id: Uuid,
    /// Tags found on the trade: "fomo", "revenge", "oversized",
    /// "session_violation". Empty when the trade is clean.
    pub mistakes: Vec<String>,
}

/// Weekly aggregate of one mistake kind.
#[derive(Debug, Serialize, ToSchema)]
pub struct MistakePatternEntry {
    pub mistake: String,
    /// Trades that carried this tag during the week.
    pub count: i64,
    /// Cumulative signed P&L of the tagged trades.
    pub pnl_impact: Decimal,
}

impl From<MistakePattern> for MistakePatternEntry {
    fn from(pattern: MistakePattern) -> Self {
        Self {
            mistake: pattern.mistake.as_str().to_string(),
            count: pattern.count,
            pnl_impact: pattern.pnl_impact,
        }
    }
}

/// One week of mistake aggregates for an account.
#[derive(Debug, Serialize, ToSchema)]
pub struct MistakePatternsResponse {
    pub account_id: Uuid,
    /// Monday of the ISO week the aggregates cover.
    pub week_start: NaiveDate,
    pub patterns: Vec<MistakePatternEntry>,
}

/// Optional metadata for a mistake scan.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// User requesting the scan, recorded in the logs.
    pub user_id: Option<Uuid>,
}

/// Week selector for pattern queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct WeekQuery {
    /// Any date inside the week of interest; defaults to the current week.
    pub week: Option<NaiveDate>,
}

/// Scan a closed trade for behavioral mistakes.
///
/// Detected tags are folded into the account's weekly aggregates and an
/// alert goes out, so repeated scans of the same trade inflate the counts.
#[utoipa::path(
    post,
    path = "/api/v1/trades/{trade_id}/mistakes",
    params(
        ("trade_id" = Uuid, Path, description = "Trade ID")
    ),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan complete", body = MistakeScanResponse),
        (status = 404, description = "Trade not found"),
    ),
    tag = "mistakes"
)]
pub async fn scan_trade(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<Uuid>,
    body: Option<Json<ScanRequest>>,
) -> ApiResult<Json<MistakeScanResponse>> {
    let user_id = body.and_then(|Json(b)| b.user_id);
    let tags = state
        .engine
        .detect_mistakes_for_trade(trade_id, user_id)
        .await?;

    Ok(Json(MistakeScanResponse {
        trade_id,
        mistakes: tags.iter().map(|t| t.as_str().to_string()).collect(),
    }))
}

/// Weekly mistake aggregates for an account.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{account_id}/mistake-patterns",
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        WeekQuery
    ),
    responses(
        (status = 200, description = "Weekly aggregates", body = MistakePatternsResponse),
    ),
    tag = "mistakes"
)]
pub async fn get_mistake_patterns(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<MistakePatternsResponse>> {
    // Any date in the week selects that week's aggregates.
    let week_start = match query.week {
        Some(date) => iso_week_start_date(date),
        None => iso_week_start(Utc::now()),
    };

    let patterns = state.engine.weekly_patterns(account_id, week_start).await?;

    Ok(Json(MistakePatternsResponse {
        account_id,
        week_start,
        patterns: patterns.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prop_core::types::MistakeTag;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pattern_entry_from_domain() {
        let pattern = MistakePattern {
            account_id: Uuid::new_v4(),
            week_start: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            mistake: MistakeTag::Revenge,
            count: 3,
            pnl_impact: dec!(-210.50),
        };

        let entry = MistakePatternEntry::from(pattern);

        assert_eq!(entry.mistake, "revenge");
        assert_eq!(entry.count, 3);
        assert_eq!(entry.pnl_impact, dec!(-210.50));
    }
}
