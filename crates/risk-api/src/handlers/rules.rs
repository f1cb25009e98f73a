//! Firm rule catalog handlers.

use axum::extract::Path;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use prop_core::rules::{FirmRules, PropFirm};

use crate::error::{ApiError, ApiResult};

/// One firm's limits.
#[derive(Debug, Serialize, ToSchema)]
pub struct FirmRulesResponse {
    /// Firm identifier: "ftmo", "funded_next", "e8_markets" or "in_house".
    pub firm: String,
    /// Hard ceiling on the daily loss limit, in percent of day-start equity.
    pub max_daily_loss_pct: Decimal,
    /// Maximum drawdown from starting balance before the firm fails the account.
    pub max_total_drawdown_pct: Decimal,
    /// Position cap, in lots per 10 000 of account balance.
    pub max_lots_per_10k: Decimal,
}

impl FirmRulesResponse {
    fn new(firm: PropFirm, rules: FirmRules) -> Self {
        Self {
            firm: firm.as_str().to_string(),
            max_daily_loss_pct: rules.max_daily_loss_pct,
            max_total_drawdown_pct: rules.max_total_drawdown_pct,
            max_lots_per_10k: rules.max_lots_per_10k,
        }
    }
}

/// The full rule catalog.
#[derive(Debug, Serialize, ToSchema)]
pub struct FirmCatalogResponse {
    pub firms: Vec<FirmRulesResponse>,
}

/// List every supported firm and its limits.
#[utoipa::path(
    get,
    path = "/api/v1/firms",
    responses(
        (status = 200, description = "Rule catalog", body = FirmCatalogResponse),
    ),
    tag = "firms"
)]
pub async fn list_firms() -> Json<FirmCatalogResponse> {
    let firms = PropFirm::ALL
        .iter()
        .map(|firm| FirmRulesResponse::new(*firm, firm.rules()))
        .collect();

    Json(FirmCatalogResponse { firms })
}

/// Limits for one firm.
#[utoipa::path(
    get,
    path = "/api/v1/firms/{firm}/rules",
    params(
        ("firm" = String, Path, description = "Firm identifier, e.g. \"ftmo\"")
    ),
    responses(
        (status = 200, description = "Firm limits", body = FirmRulesResponse),
        (status = 400, description = "Unknown firm"),
    ),
    tag = "firms"
)]
pub async fn get_firm_rules(Path(firm): Path<String>) -> ApiResult<Json<FirmRulesResponse>> {
    let firm = PropFirm::parse_str(&firm)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown firm: {}", firm)))?;

    Ok(Json(FirmRulesResponse::new(firm, firm.rules())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_catalog_lists_all_firms() {
        let Json(catalog) = list_firms().await;

        assert_eq!(catalog.firms.len(), 4);
        assert_eq!(catalog.firms[0].firm, "ftmo");
        assert_eq!(catalog.firms[0].max_daily_loss_pct, dec!(5));
    }

    #[tokio::test]
    async fn test_unknown_firm_rejected() {
        let result = get_firm_rules(Path("atlas_capital".to_string())).await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
