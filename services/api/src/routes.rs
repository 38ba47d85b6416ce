use crate::infra::{AppState, CoreServices};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;

use cadence_ai::workflows::followup::followup_router;
use cadence_ai::workflows::goals::goal_router;
use cadence_ai::workflows::leads::lead_router;

pub(crate) fn with_core_routes(core: &CoreServices) -> axum::Router {
    lead_router(core.activity.clone())
        .merge(followup_router(core.followup_api.clone()))
        .merge(goal_router(core.goal_api.clone()))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

/// Prometheus text exposition format, as `metrics-exporter-prometheus` renders it.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness reflects engine state, not just the bind: before the listener is
/// up we report initializing, afterwards the probe carries the follow-up
/// tick's dead-letter count so stuck suggestions show up in orchestration.
pub(crate) async fn readiness_endpoint(
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    if !state.readiness.load(std::sync::atomic::Ordering::Acquire) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        );
    }

    let dead_lettered = state.tick.dead_letters().len();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "dead_lettered_followups": dead_lettered,
        })),
    )
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use cadence_ai::config::EngineConfig;

    fn router() -> axum::Router {
        let core = crate::infra::build_core(&EngineConfig::default());
        with_core_routes(&core)
    }

    #[tokio::test]
    async fn health_endpoint_identifies_the_service() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("status"), Some(&serde_json::json!("ok")));
        assert_eq!(
            payload.get("service"),
            Some(&serde_json::json!("cadence-api"))
        );
    }

    #[tokio::test]
    async fn readiness_carries_the_dead_letter_backlog() {
        use crate::infra::AppState;
        use axum_prometheus::PrometheusMetricLayer;
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let core = crate::infra::build_core(&EngineConfig::default());
        let (_layer, handle) = PrometheusMetricLayer::pair();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(handle),
            tick: core.followup_tick.clone(),
        };
        let router = with_core_routes(&core).layer(Extension(state));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("status"), Some(&serde_json::json!("ready")));
        assert_eq!(
            payload.get("dead_lettered_followups"),
            Some(&serde_json::json!(0))
        );
    }

    #[tokio::test]
    async fn plan_endpoint_serves_builtin_reference_data() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/plans/vitalux?region=dach")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("company_id"), Some(&serde_json::json!("vitalux")));
        assert_eq!(
            payload
                .get("ranks")
                .and_then(Value::as_array)
                .map(Vec::len),
            Some(5)
        );
    }

    #[tokio::test]
    async fn daily_flow_endpoint_computes_targets() {
        let request_body = serde_json::json!({
            "company_id": "vitalux",
            "region": "dach",
            "goal_type": "rank",
            "target_rank_id": "team_leader",
            "timeframe_months": 5,
            "current_group_volume": 0.0
        });
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/goals/daily-flow")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("estimated_customers"), Some(&serde_json::json!(59)));
        assert_eq!(payload.get("estimated_partners"), Some(&serde_json::json!(15)));
    }

    #[tokio::test]
    async fn unknown_lead_returns_not_found() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/leads/00000000-0000-0000-0000-000000000001")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
