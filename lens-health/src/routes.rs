//! HTTP API routes.

use crate::bridge::{ApprovalGate, ApprovalOutcome, LiquidityBridge, RandomRate, RateRange};
use crate::diagnosis::{diagnose, FundingPolicy};
use crate::error::{HealthError, LedgerError};
use crate::ledger::Ledger;
use crate::narrative::Narrator;
use crate::reliability::StrategyKind;
use crate::report::{ExamineOptions, HealthDoctor};
use crate::runway::RunwayUnit;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use lens_common::config::Config;
use serde::Deserialize;
use std::sync::Arc;

/// Application state. Read-only for the lifetime of the server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub narrator: Option<Arc<dyn Narrator>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            narrator: None,
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    fn funding_policy(&self) -> Result<FundingPolicy, LedgerError> {
        let bridge = &self.config.bridge;
        FundingPolicy::from_config(&bridge.funding_policy, bridge.buffer, bridge.receivables_fraction)
    }

    /// Fresh generator per request; seeded when the config pins one.
    fn bridge(&self) -> Result<LiquidityBridge<RandomRate<rand::rngs::StdRng>>, HealthError> {
        let bridge = &self.config.bridge;
        let range = RateRange::new(bridge.rate_min, bridge.rate_max)?;
        let source = match bridge.seed {
            Some(seed) => RandomRate::seeded(seed),
            None => RandomRate::from_entropy(),
        };
        Ok(LiquidityBridge::new(range, source))
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Diagnosis
        .route("/api/v1/diagnose", post(diagnose_ledger))
        // Liquidity bridge
        .route("/api/v1/bridge/offer", post(bridge_offer))
        .route("/api/v1/bridge/approve", post(bridge_approve))
        .with_state(state)
}

// ============ Health Check ============

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "lens-health",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============ Diagnosis ============

#[derive(Debug, Deserialize)]
struct DiagnoseRequest {
    csv: String,
    /// Whole-percent slider position
    drop_percent: Option<f64>,
    strategy: Option<String>,
    runway_unit: Option<String>,
    /// Native price of one ledger unit
    price: Option<f64>,
    #[serde(default)]
    narrate: bool,
}

/// The slider moves in whole percents between 0 and 100.
fn drop_percent(requested: Option<f64>, default: u8) -> Result<f64, LedgerError> {
    let percent = requested.unwrap_or(f64::from(default));
    if !(0.0..=100.0).contains(&percent) {
        return Err(LedgerError::invalid(
            "drop_percent",
            format!("{} is outside [0, 100]", percent),
        ));
    }
    if percent.fract() != 0.0 {
        return Err(LedgerError::invalid(
            "drop_percent",
            format!("{} is not a whole percent", percent),
        ));
    }
    Ok(percent)
}

async fn diagnose_ledger(
    State(state): State<AppState>,
    payload: Result<Json<DiagnoseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HealthError> {
    let Json(req) = payload?;
    let defaults = &state.config.diagnosis;

    let strategy: StrategyKind = req
        .strategy
        .as_deref()
        .unwrap_or(&defaults.reliability_strategy)
        .parse()?;
    let runway_unit: RunwayUnit = req
        .runway_unit
        .as_deref()
        .unwrap_or(&defaults.runway_unit)
        .parse()?;

    let options = ExamineOptions {
        strategy,
        drop_percent: drop_percent(req.drop_percent, defaults.default_drop_percent)?,
        runway_unit,
        funding_policy: state.funding_policy()?,
        price: req.price,
    };

    let ledger = Ledger::from_csv(&req.csv)?;
    let mut report = HealthDoctor::new().examine(&ledger, &options)?;

    if req.narrate {
        match &state.narrator {
            Some(narrator) => report.attach_narrative(narrator.as_ref()).await,
            None => report.narrative_error = Some("Narrative service is not configured".into()),
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": report
    })))
}

// ============ Liquidity Bridge ============

#[derive(Debug, Deserialize)]
struct OfferRequest {
    csv: String,
    funding_policy: Option<FundingPolicy>,
}

async fn bridge_offer(
    State(state): State<AppState>,
    payload: Result<Json<OfferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HealthError> {
    let Json(req) = payload?;
    let policy = match req.funding_policy {
        Some(policy) => {
            policy.validate()?;
            policy
        }
        None => state.funding_policy()?,
    };

    let ledger = Ledger::from_csv(&req.csv)?;
    let diagnosis = diagnose(&ledger)?;

    let mut bridge = state.bridge()?;
    let offer = bridge.offer_for(&diagnosis, diagnosis.funding_need(policy))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": offer
    })))
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    token: String,
}

async fn bridge_approve(
    State(state): State<AppState>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HealthError> {
    let Json(req) = payload?;
    let gate = ApprovalGate::new(state.config.bridge.approval_token.as_str());
    let outcome = gate.evaluate(&req.token);
    let message = match outcome {
        ApprovalOutcome::Executed => "Bridge execution simulated; no funds were moved",
        ApprovalOutcome::PendingAuthorization => "Awaiting authorization",
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "outcome": outcome,
            "message": message
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const TRAPPED: &str = "revenue,expenses,cash\n100,40,5\n100,40,5\n";
    const HEALTHY: &str = "revenue,expenses,cash\n100,40,500\n";

    fn test_app() -> Router {
        let mut config = Config::default();
        config.bridge.seed = Some(7);
        build_router(AppState::new(config))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_diagnose() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": TRAPPED, "drop_percent": 50 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["diagnosis"]["paper_profit_trap"], true);
        assert_eq!(json["data"]["stress"]["shocked_value"], 5.0);
    }

    #[tokio::test]
    async fn test_diagnose_rejects_drop_out_of_range() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": TRAPPED, "drop_percent": 101 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_diagnose_rejects_fractional_drop() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": TRAPPED, "drop_percent": 30.5 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_diagnose_accepts_whole_float_drop() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": TRAPPED, "drop_percent": 50.0 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["stress"]["shocked_value"], 5.0);
    }

    #[tokio::test]
    async fn test_body_rejections_use_error_envelope() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "drop_percent": 30 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INVALID_REQUEST");
        assert!(json["error"]["message"].as_str().unwrap().contains("csv"));

        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": TRAPPED, "drop_percent": "thirty" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_REQUEST");

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/bridge/approve")
                    .body(Body::from(r#"{"token": "APPROVE-BRIDGE"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_diagnose_missing_column() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": "revenue,expenses\n1,2\n" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_narrate_without_narrator() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/diagnose",
                serde_json::json!({ "csv": TRAPPED, "narrate": true }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["data"]["narrative_error"],
            "Narrative service is not configured"
        );
    }

    #[tokio::test]
    async fn test_offer_not_eligible() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/bridge/offer",
                serde_json::json!({ "csv": HEALTHY }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_offer_for_trapped_ledger() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/bridge/offer",
                serde_json::json!({
                    "csv": TRAPPED,
                    "funding_policy": { "kind": "profit_plus_buffer", "buffer": 10.0 }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["amount"], 130.0);
        assert_eq!(json["data"]["status"], "simulated");
        let rate = json["data"]["interest_rate"].as_f64().unwrap();
        assert!((0.01..=0.05).contains(&rate));
    }

    #[tokio::test]
    async fn test_offer_rejects_invalid_policy() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/bridge/offer",
                serde_json::json!({
                    "csv": TRAPPED,
                    "funding_policy": { "kind": "receivables_fraction", "fraction": 40.0 }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_PARAMETER");

        let response = test_app()
            .oneshot(post_json(
                "/api/v1/bridge/offer",
                serde_json::json!({
                    "csv": TRAPPED,
                    "funding_policy": { "kind": "profit_plus_buffer", "buffer": -10.0 }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_approve() {
        let response = test_app()
            .oneshot(post_json(
                "/api/v1/bridge/approve",
                serde_json::json!({ "token": "APPROVE-BRIDGE" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["outcome"], "executed");

        let response = test_app()
            .oneshot(post_json(
                "/api/v1/bridge/approve",
                serde_json::json!({ "token": "approve" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["data"]["outcome"],
            "pending_authorization"
        );
    }
}
