//! Goal-to-targets scenarios through the public engine and the HTTP router.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use cadence_ai::storage::memory::InMemoryLeadStore;
use cadence_ai::workflows::goals::{
    derive_daily_flow, goal_router, DailyFlowConfig, GoalApi, GoalError, GoalService, GoalTarget,
};
use cadence_ai::workflows::plans::{CompanyId, PlanRegistry, RankId};

fn vitalux_plan() -> cadence_ai::workflows::plans::CompensationPlan {
    PlanRegistry::standard()
        .get(&CompanyId("vitalux".to_string()), "dach")
        .expect("built-in plan")
        .clone()
}

fn goal_api() -> GoalApi<InMemoryLeadStore> {
    let store = Arc::new(InMemoryLeadStore::new());
    let registry = Arc::new(PlanRegistry::standard());
    GoalApi {
        registry: registry.clone(),
        service: Arc::new(GoalService::new(store, registry)),
    }
}

/// 5,000 missing group volume over five months, default 70/30 split:
/// ceil(3500/60) = 59 customers, ceil(1500/100) = 15 partners, and the
/// volume pacing rounds to 1000 / 231 / 46.
#[test]
fn rank_goal_produces_the_documented_targets() {
    let plan = vitalux_plan();
    let targets = derive_daily_flow(
        &plan,
        &GoalTarget::Rank {
            target_rank_id: RankId("team_leader".to_string()),
        },
        5,
        0.0,
        &DailyFlowConfig::default(),
    )
    .expect("targets derive");

    assert_eq!(targets.estimated_customers, 59);
    assert_eq!(targets.estimated_partners, 15);
    assert_eq!(targets.pacing.per_month, 1_000);
    assert_eq!(targets.pacing.per_week, 231);
    assert_eq!(targets.pacing.per_day, 46);
    assert_eq!(
        targets.weekly.new_contacts,
        targets.daily.new_contacts * 5
    );
}

#[test]
fn income_beyond_the_top_rank_fails_without_partial_output() {
    let plan = vitalux_plan();
    let result = derive_daily_flow(
        &plan,
        &GoalTarget::Income {
            target_monthly_income: 100_000.0,
        },
        5,
        0.0,
        &DailyFlowConfig::default(),
    );
    assert!(matches!(result, Err(GoalError::NoRankMeetsTarget { .. })));
}

#[tokio::test]
async fn daily_flow_endpoint_round_trips() {
    let router = goal_router(goal_api());
    let body = json!({
        "company_id": "vitalux",
        "region": "dach",
        "goal_type": "income",
        "target_monthly_income": 1200.0,
        "timeframe_months": 5,
        "current_group_volume": 0.0
    });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/goals/daily-flow")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(
        payload["target_rank"]["id"],
        json!("team_leader"),
        "first rank covering 1200 income"
    );
    assert_eq!(payload["estimated_customers"], json!(59));
    assert!(payload["daily"]["new_contacts"].as_u64().is_some());
}

#[tokio::test]
async fn infeasible_income_is_unprocessable_over_http() {
    let router = goal_router(goal_api());
    let body = json!({
        "company_id": "vitalux",
        "goal_type": "income",
        "target_monthly_income": 1_000_000.0,
        "timeframe_months": 5
    });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/goals/daily-flow")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn zero_rate_config_is_rejected() {
    let router = goal_router(goal_api());
    let body = json!({
        "company_id": "vitalux",
        "goal_type": "rank",
        "target_rank_id": "builder",
        "timeframe_months": 3,
        "config": {
            "contact_to_customer_rate": 0.0
        }
    });

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/goals/daily-flow")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_plan_is_not_found() {
    let router = goal_router(goal_api());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/plans/ghost-company")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stored_goal_serves_its_targets_back() {
    let user_id = "3b1f7a52-8f21-4f2e-9d7e-0a6c33f7b001";
    let router = goal_router(goal_api());

    let body = json!({
        "user_id": user_id,
        "company_id": "vitalux",
        "region": "dach",
        "goal_type": "rank",
        "target_rank_id": "team_leader",
        "timeframe_months": 5,
        "current_group_volume": 0.0
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/goals")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/goals/{user_id}/daily-flow-targets"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(payload["estimated_customers"], json!(59));
}

/// An infeasible goal is rejected outright: neither the goal nor any
/// partially derived targets reach the store.
#[tokio::test]
async fn infeasible_goal_persists_nothing() {
    let user_id = "3b1f7a52-8f21-4f2e-9d7e-0a6c33f7b002";
    let router = goal_router(goal_api());

    let body = json!({
        "user_id": user_id,
        "company_id": "vitalux",
        "goal_type": "income",
        "target_monthly_income": 1_000_000.0,
        "timeframe_months": 5
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/goals")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/goals/{user_id}/daily-flow-targets"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
