//! API route definitions.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{breaker, health, mistakes, rules, sizing};
use crate::state::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PropDesk Risk API",
        version = "1.0.0",
        description = "REST API for the PropDesk trading risk engine"
    ),
    paths(
        health::health_check,
        health::readiness,
        breaker::get_breaker_status,
        breaker::evaluate_breaker,
        breaker::apply_manual_lock,
        sizing::compute_position_size,
        mistakes::scan_trade,
        mistakes::get_mistake_patterns,
        rules::list_firms,
        rules::get_firm_rules,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            health::HealthResponse,
            health::ReadyResponse,
            breaker::BreakerStatusResponse,
            breaker::EvaluateRequest,
            breaker::ManualLockRequest,
            sizing::PositionSizeRequest,
            sizing::PositionSizeResponse,
            mistakes::ScanRequest,
            mistakes::MistakeScanResponse,
            mistakes::MistakePatternEntry,
            mistakes::MistakePatternsResponse,
            rules::FirmRulesResponse,
            rules::FirmCatalogResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "circuit-breaker", description = "Account lock state and evaluation"),
        (name = "position-sizing", description = "Risk-based position sizing"),
        (name = "mistakes", description = "Behavioral mistake detection"),
        (name = "firms", description = "Prop-firm rule catalog"),
    )
)]
pub struct ApiDoc;

/// Create the main router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))

        // Circuit breaker endpoints
        .route("/api/v1/accounts/{account_id}/circuit-breaker", get(breaker::get_breaker_status))
        .route(
            "/api/v1/accounts/{account_id}/circuit-breaker/evaluate",
            post(breaker::evaluate_breaker),
        )
        .route("/api/v1/accounts/{account_id}/lock", post(breaker::apply_manual_lock))

        // Position sizing
        .route("/api/v1/position-size", post(sizing::compute_position_size))

        // Mistake detection
        .route("/api/v1/trades/{trade_id}/mistakes", post(mistakes::scan_trade))
        .route(
            "/api/v1/accounts/{account_id}/mistake-patterns",
            get(mistakes::get_mistake_patterns),
        )

        // Rule catalog
        .route("/api/v1/firms", get(rules::list_firms))
        .route("/api/v1/firms/{firm}/rules", get(rules::get_firm_rules))

        // Swagger UI
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))

        // Add state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("PropDesk Risk API"));
        assert!(json.contains("circuit-breaker"));
        assert!(json.contains("position-size"));
        assert!(json.contains("mistake-patterns"));
    }
}
