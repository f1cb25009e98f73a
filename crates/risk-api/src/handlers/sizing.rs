//! Position sizing handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use prop_core::rules::classify_symbol;
use risk_engine::SizeRequest;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Position size request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PositionSizeRequest {
    pub account_id: Uuid,
    /// Instrument symbol, e.g. "EURUSD" or "XAUUSD".
    pub symbol: String,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    /// Percent of equity to risk, e.g. 1.0 for 1%.
    pub risk_pct: Decimal,
}

/// Computed position size with its breakdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct PositionSizeResponse {
    pub account_id: Uuid,
    pub symbol: String,
    /// Instrument class the stop distance was priced under: "crypto",
    /// "metal", "jpy_pair" or "forex".
    pub instrument_class: String,
    /// Final lot size, rounded down to two decimals and clamped to the
    /// broker minimum and the firm cap.
    pub lot_size: Decimal,
    /// Dollar amount at risk if the stop is hit.
    pub risk_amount: Decimal,
    /// Pip value used, in USD per pip per standard lot.
    pub pip_value: Decimal,
    pub stop_distance_pips: Decimal,
    /// Position size in base currency units.
    pub units: Decimal,
    pub standard_lots: u32,
    pub mini_lots: u32,
    pub micro_lots: u32,
    /// True when the firm's position cap reduced the lot size.
    pub firm_capped: bool,
    /// True when the inputs were unusable and the minimum lot was
    /// returned as a fallback.
    pub degraded: bool,
}

/// Compute a risk-based position size.
#[utoipa::path(
    post,
    path = "/api/v1/position-size",
    request_body = PositionSizeRequest,
    responses(
        (status = 200, description = "Computed position size", body = PositionSizeResponse),
        (status = 400, description = "Malformed request body"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Invalid sizing parameters"),
    ),
    tag = "position-sizing"
)]
pub async fn compute_position_size(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PositionSizeRequest>, JsonRejection>,
) -> ApiResult<Json<PositionSizeResponse>> {
    let Json(request) = body?;

    if request.symbol.trim().is_empty() {
        return Err(ApiError::Validation("symbol must not be empty".into()));
    }
    if request.entry_price <= Decimal::ZERO {
        return Err(ApiError::Validation("entry_price must be positive".into()));
    }
    if request.stop_price <= Decimal::ZERO {
        return Err(ApiError::Validation("stop_price must be positive".into()));
    }

    let size_request = SizeRequest {
        account_id: request.account_id,
        symbol: request.symbol.clone(),
        entry_price: request.entry_price,
        stop_price: request.stop_price,
        risk_pct: request.risk_pct,
    };

    let computation = state.engine.compute_position_size(&size_request).await?;

    Ok(Json(PositionSizeResponse {
        account_id: request.account_id,
        instrument_class: classify_symbol(&request.symbol).as_str().to_string(),
        symbol: request.symbol,
        lot_size: computation.lot_size,
        risk_amount: computation.risk_amount,
        pip_value: computation.pip_value,
        stop_distance_pips: computation.stop_distance_pips,
        units: computation.units,
        standard_lots: computation.standard_lots,
        mini_lots: computation.mini_lots,
        micro_lots: computation.micro_lots,
        firm_capped: computation.firm_capped,
        degraded: computation.degraded,
    }))
}
