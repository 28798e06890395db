//! REST API server for the report pipeline
//!
//! Exposes the supervisor via HTTP endpoints. The audit log lives here, not
//! in the supervisor, so the pipeline itself stays stateless.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{AuditLog, ReportRecord};
use crate::error::ReportError;
use crate::supervisor::Supervisor;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReportApiRequest {
    pub request: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReportListQuery {
    pub region: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub supervisor: Arc<Supervisor>,
    pub audit_log: Arc<AuditLog>,
    pub deadline: Duration,
}

fn status_for(err: &ReportError) -> StatusCode {
    match err {
        ReportError::SourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_integrity_error() => StatusCode::UNPROCESSABLE_ENTITY,
        ReportError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
        ReportError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Report Endpoints
/// =============================

async fn create_report(
    State(state): State<ApiState>,
    Json(req): Json<ReportApiRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.request.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("request must not be empty".into())),
        );
    }

    let request = state.supervisor.parse(&req.request);
    info!(
        request_id = %request.request_id,
        region = %request.region,
        "Received report request"
    );

    let start = Instant::now();
    match state
        .supervisor
        .run_request_with_deadline(&request, state.deadline)
        .await
    {
        Ok(report) => {
            let execution_time_ms = start.elapsed().as_millis() as u64;
            let record = match ReportRecord::new(request, &report, execution_time_ms) {
                Ok(record) => record,
                Err(e) => {
                    error!(error = %e, "Failed to build audit record");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ApiResponse::error(format!("Report failed: {}", e))),
                    );
                }
            };

            if let Err(e) = state.audit_log.record(record.clone()).await {
                error!(error = %e, "Failed to record audit entry");
            }

            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "report_id": record.report_id,
                    "region": record.request.region,
                    "period": record.request.period,
                    "verified": report.verified,
                    "state": report.state,
                    "ebitda": record.ebitda,
                    "health_status": record.health_status,
                    "report": report.text,
                    "analysis_fingerprint": record.analysis_fingerprint,
                    "execution_time_ms": execution_time_ms,
                }))),
            )
        }
        Err(e) => {
            error!(request_id = %request.request_id, error = %e, "Report failed");
            (
                status_for(&e),
                Json(ApiResponse::error(format!("Report failed: {}", e))),
            )
        }
    }
}

async fn get_report(
    State(state): State<ApiState>,
    Path(report_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let Ok(report_id) = Uuid::parse_str(&report_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid report id: {}", report_id))),
        );
    };

    match state.audit_log.get(report_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::success(record))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Report {} not found", report_id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

async fn list_reports(
    State(state): State<ApiState>,
    Query(query): Query<ReportListQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.audit_log.list_for_region(&query.region).await {
        Ok(report_ids) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "region": query.region,
                "report_ids": report_ids,
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// Re-run retrieval and analysis for a recorded report and compare
/// fingerprints with the original run.
async fn replay_report(
    State(state): State<ApiState>,
    Path(report_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let Ok(report_id) = Uuid::parse_str(&report_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid report id: {}", report_id))),
        );
    };

    let region = match state.audit_log.get(report_id).await {
        Ok(Some(record)) => record.request.region,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("Report {} not found", report_id))),
            )
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    };

    let replay = match tokio::time::timeout(
        state.deadline,
        state.supervisor.analyze_region(&region),
    )
    .await
    {
        Ok(Ok(analysis)) => analysis,
        Ok(Err(e)) => {
            error!(%report_id, error = %e, "Replay failed");
            return (
                status_for(&e),
                Json(ApiResponse::error(format!("Replay failed: {}", e))),
            );
        }
        Err(_) => {
            let e = ReportError::DeadlineExceeded(state.deadline.as_millis() as u64);
            return (status_for(&e), Json(ApiResponse::error(e.to_string())));
        }
    };

    match state.audit_log.verify_replay(report_id, &replay).await {
        Ok(Some(matches)) => {
            info!(%report_id, matches, "Replay compared");
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "report_id": report_id,
                    "region": region,
                    "matches": matches,
                    "ebitda": replay.ebitda,
                }))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Report {} not found", report_id))),
        ),
        Err(e) => (
            status_for(&e),
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/reports", post(create_report).get(list_reports))
        .route("/api/v1/reports/:report_id", get(get_report))
        .route("/api/v1/reports/:report_id/replay", post(replay_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::narrative::TextGenerator;
    use crate::sources::{MockBudgetSource, MockLedgerSource};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> crate::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn state(reply: &'static str) -> ApiState {
        let config = ReportConfig::with_api_key("test");
        let supervisor = Supervisor::from_config(
            &config,
            Arc::new(MockLedgerSource::new(Duration::from_millis(5))),
            Arc::new(MockBudgetSource::new(Duration::from_millis(5))),
            Arc::new(CannedGenerator(reply)),
        );

        ApiState {
            supervisor: Arc::new(supervisor),
            audit_log: Arc::new(AuditLog::new()),
            deadline: Duration::from_secs(5),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_fetch_report() {
        let state = state("EBITDA reached 150,000 USD.");
        let router = create_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::post("/api/v1/reports")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"request":"Q4 2025 report for EMEA"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["verified"], true);
        assert_eq!(body["data"]["ebitda"], 150_000);
        assert_eq!(body["data"]["period"], "Q4 2025");

        let report_id = body["data"]["report_id"].as_str().unwrap().to_string();
        let response = router
            .oneshot(
                Request::get(format!("/api/v1/reports/{}", report_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["state"], "verified");
    }

    async fn create(router: &Router, request: &str) -> String {
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/v1/reports")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "request": request }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        body_json(response).await["data"]["report_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_list_reports_by_region() {
        let router = create_router(state("EBITDA reached 150,000 USD."));
        let emea = create(&router, "Q4 report for EMEA").await;
        let apac = create(&router, "Q4 report for APAC").await;

        let response = router
            .clone()
            .oneshot(
                Request::get("/api/v1/reports?region=emea")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let ids: Vec<String> = body["data"]["report_ids"]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| id.as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec![emea]);
        assert!(!ids.contains(&apac));
    }

    #[tokio::test]
    async fn test_replay_matches_recorded_analysis() {
        let router = create_router(state("EBITDA reached 150,000 USD."));
        let report_id = create(&router, "Q4 report for EMEA").await;

        let response = router
            .clone()
            .oneshot(
                Request::post(format!("/api/v1/reports/{}/replay", report_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["matches"], true);
        assert_eq!(body["data"]["ebitda"], 150_000);
    }

    #[tokio::test]
    async fn test_replay_of_unknown_report_is_not_found() {
        let response = create_router(state("unused"))
            .oneshot(
                Request::post(format!("/api/v1/reports/{}/replay", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let response = create_router(state("unused"))
            .oneshot(
                Request::post("/api/v1/reports")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"request":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_report_is_not_found() {
        let response = create_router(state("unused"))
            .oneshot(
                Request::get(format!("/api/v1/reports/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&ReportError::GenerationFailed("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ReportError::DivisionByZero { category: "Tax".into() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ReportError::AmountOverflow { category: "EBITDA".into() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ReportError::DeadlineExceeded(10)),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
