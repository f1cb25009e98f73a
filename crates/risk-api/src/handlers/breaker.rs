//! Circuit breaker handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use risk_engine::CircuitBreakerResult;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Circuit breaker status for one account.
#[derive(Debug, Serialize, ToSchema)]
pub struct BreakerStatusResponse {
    pub account_id: Uuid,
    /// Whether the account may trade right now.
    pub is_locked: bool,
    /// Which breaker is in force: "none", "daily_loss", "profit_target",
    /// "session_time" or "manual".
    pub breaker: String,
    pub lock_reason: Option<String>,
    /// Lock expiry; absent for session locks, which end when the
    /// trading window opens.
    pub locked_until: Option<DateTime<Utc>>,
    pub daily_loss_pct: Decimal,
    pub daily_profit_pct: Decimal,
}

impl BreakerStatusResponse {
    fn from_result(account_id: Uuid, result: CircuitBreakerResult) -> Self {
        Self {
            account_id,
            is_locked: result.is_locked,
            breaker: result.breaker.as_str().to_string(),
            lock_reason: result.lock_reason,
            locked_until: result.locked_until,
            daily_loss_pct: result.daily_loss_pct,
            daily_profit_pct: result.daily_profit_pct,
        }
    }
}

/// Optional metadata for a breaker evaluation.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// User requesting the evaluation, recorded in the audit trail.
    pub user_id: Option<Uuid>,
}

/// Manual lock request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualLockRequest {
    /// When the lock expires.
    pub locked_until: DateTime<Utc>,
    /// Reason shown to the trader and stored in the audit trail.
    pub reason: String,
    /// User applying the lock.
    pub user_id: Option<Uuid>,
}

/// Read the breaker state without side effects.
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{account_id}/circuit-breaker",
    params(
        ("account_id" = Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Current breaker status", body = BreakerStatusResponse),
        (status = 404, description = "Account not found"),
    ),
    tag = "circuit-breaker"
)]
pub async fn get_breaker_status(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<BreakerStatusResponse>> {
    let result = state
        .engine
        .evaluate_circuit_breaker(account_id, None, true)
        .await?;

    Ok(Json(BreakerStatusResponse::from_result(account_id, result)))
}

/// Evaluate the breaker and apply any resulting lock.
#[utoipa::path(
    post,
    path = "/api/v1/accounts/{account_id}/circuit-breaker/evaluate",
    params(
        ("account_id" = Uuid, Path, description = "Account ID")
    ),
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Breaker evaluated", body = BreakerStatusResponse),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Concurrent evaluation conflict"),
    ),
    tag = "circuit-breaker"
)]
pub async fn evaluate_breaker(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
    body: Option<Json<EvaluateRequest>>,
) -> ApiResult<Json<BreakerStatusResponse>> {
    let user_id = body.and_then(|Json(b)| b.user_id);

    let result = match state
        .engine
        .evaluate_circuit_breaker(account_id, user_id, false)
        .await
    {
        Ok(result) => result,
        // Another writer locked the account between our read and write.
        // One re-read reports the fresh state; a second conflict is a 409.
        Err(e) if e.is_conflict() => {
            state
                .engine
                .evaluate_circuit_breaker(account_id, user_id, false)
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(BreakerStatusResponse::from_result(account_id, result)))
}

/// Lock an account by hand.
#[utoipa::path(
    post,
    path = "/api/v1/accounts/{account_id}/lock",
    params(
        ("account_id" = Uuid, Path, description = "Account ID")
    ),
    request_body = ManualLockRequest,
    responses(
        (status = 200, description = "Account locked", body = BreakerStatusResponse),
        (status = 400, description = "Malformed request body"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Concurrent evaluation conflict"),
        (status = 422, description = "Invalid lock parameters"),
    ),
    tag = "circuit-breaker"
)]
pub async fn apply_manual_lock(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
    body: Result<Json<ManualLockRequest>, JsonRejection>,
) -> ApiResult<Json<BreakerStatusResponse>> {
    let Json(request) = body?;

    if request.reason.trim().is_empty() {
        return Err(ApiError::Validation("reason must not be empty".into()));
    }
    if request.locked_until <= Utc::now() {
        return Err(ApiError::Validation(
            "locked_until must be in the future".into(),
        ));
    }

    let result = state
        .engine
        .apply_manual_lock(
            account_id,
            request.user_id,
            request.locked_until,
            request.reason,
        )
        .await?;

    Ok(Json(BreakerStatusResponse::from_result(account_id, result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prop_core::types::LockKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_breaker_status_from_result() {
        let account_id = Uuid::new_v4();
        let result = CircuitBreakerResult {
            is_locked: true,
            breaker: LockKind::DailyLoss,
            lock_reason: Some("Daily loss limit hit: 3.50% loss (limit 3.00%)".to_string()),
            locked_until: None,
            daily_loss_pct: dec!(3.5),
            daily_profit_pct: dec!(0),
        };

        let response = BreakerStatusResponse::from_result(account_id, result);

        assert_eq!(response.account_id, account_id);
        assert!(response.is_locked);
        assert_eq!(response.breaker, "daily_loss");
        assert_eq!(response.daily_loss_pct, dec!(3.5));
    }
}
