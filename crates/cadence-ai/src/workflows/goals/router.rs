use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::domain::{DailyFlowConfig, DailyFlowTargets, Goal, GoalStatus, GoalTarget};
use super::engine::{derive_daily_flow, GoalError};
use super::service::{GoalService, GoalServiceError};
use crate::storage::LeadStore;
use crate::workflows::leads::domain::UserId;
use crate::workflows::plans::{CompanyId, CompensationPlan, PlanRegistry};

/// Shared state for the goal endpoints: the read-only plan registry plus the
/// persisting goal service.
pub struct GoalApi<S> {
    pub registry: Arc<PlanRegistry>,
    pub service: Arc<GoalService<S>>,
}

impl<S> Clone for GoalApi<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            service: self.service.clone(),
        }
    }
}

/// Router builder exposing goal math, goal persistence, and plan lookups.
pub fn goal_router<S: LeadStore + 'static>(state: GoalApi<S>) -> Router {
    Router::new()
        .route("/api/v1/goals/daily-flow", post(daily_flow_handler::<S>))
        .route("/api/v1/goals", post(set_goal_handler::<S>))
        .route(
            "/api/v1/goals/:user_id/daily-flow-targets",
            get(stored_targets_handler::<S>),
        )
        .route("/api/v1/plans/:company_id", get(plan_handler::<S>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct DailyFlowRequest {
    pub company_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(flatten)]
    pub target: GoalTarget,
    pub timeframe_months: u32,
    #[serde(default)]
    pub current_group_volume: f64,
    #[serde(default)]
    pub config: Option<DailyFlowConfig>,
}

fn default_region() -> String {
    "dach".to_string()
}

#[derive(Debug, Serialize)]
pub struct DailyFlowResponse {
    pub company_id: String,
    pub region: String,
    pub timeframe_months: u32,
    #[serde(flatten)]
    pub targets: DailyFlowTargets,
}

fn goal_error_response(err: GoalError) -> Response {
    match err {
        err @ (GoalError::NoRankMeetsTarget { .. } | GoalError::InvalidConfig(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        err @ (GoalError::RankNotFound(_) | GoalError::Plan(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Stateless computation: derive targets without storing anything.
async fn daily_flow_handler<S: LeadStore>(
    State(state): State<GoalApi<S>>,
    Json(request): Json<DailyFlowRequest>,
) -> Response {
    let company = CompanyId(request.company_id.clone());
    let plan = match state.registry.get(&company, &request.region) {
        Ok(plan) => plan,
        Err(err) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    };

    let config = request.config.unwrap_or_default();
    match derive_daily_flow(
        plan,
        &request.target,
        request.timeframe_months,
        request.current_group_volume,
        &config,
    ) {
        Ok(targets) => (
            StatusCode::OK,
            Json(DailyFlowResponse {
                company_id: request.company_id,
                region: request.region,
                timeframe_months: request.timeframe_months,
                targets,
            }),
        )
            .into_response(),
        Err(err) => goal_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct SetGoalRequest {
    user_id: Uuid,
    company_id: String,
    #[serde(default = "default_region")]
    region: String,
    #[serde(flatten)]
    target: GoalTarget,
    timeframe_months: u32,
    #[serde(default)]
    current_group_volume: f64,
    #[serde(default)]
    config: Option<DailyFlowConfig>,
}

/// Persisting command: store the goal and its derived targets together. A
/// failed derivation stores neither.
async fn set_goal_handler<S: LeadStore>(
    State(state): State<GoalApi<S>>,
    Json(request): Json<SetGoalRequest>,
) -> Response {
    let goal = Goal {
        user_id: UserId(request.user_id),
        company_id: CompanyId(request.company_id),
        region: request.region,
        target: request.target,
        timeframe_months: request.timeframe_months,
        current_group_volume: request.current_group_volume,
        status: GoalStatus::Active,
    };
    let config = request.config.unwrap_or_default();

    match state.service.set_goal(goal, &config) {
        Ok(targets) => (StatusCode::CREATED, Json(targets)).into_response(),
        Err(GoalServiceError::Goal(err)) => goal_error_response(err),
        Err(GoalServiceError::Plan(err)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(other) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": other.to_string() })),
        )
            .into_response(),
    }
}

async fn stored_targets_handler<S: LeadStore>(
    State(state): State<GoalApi<S>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match state.service.targets(&UserId(user_id)) {
        Ok(Some(targets)) => (StatusCode::OK, Json(targets)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no daily-flow targets stored for this user" })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn plan_handler<S: LeadStore>(
    State(state): State<GoalApi<S>>,
    Path(company_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let region = params
        .get("region")
        .cloned()
        .unwrap_or_else(default_region);
    match state.registry.get(&CompanyId(company_id), &region) {
        Ok(plan) => (StatusCode::OK, Json(PlanView::from(plan))).into_response(),
        Err(err) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Plan as exposed to clients; identical to the domain type today but kept
/// separate so storage details never leak by accident.
#[derive(Debug, Serialize)]
struct PlanView {
    company_id: String,
    region: String,
    unit_label: String,
    currency: String,
    avg_volume_per_customer: f64,
    avg_volume_per_partner: f64,
    ranks: Vec<RankView>,
}

#[derive(Debug, Serialize)]
struct RankView {
    id: String,
    display_name: String,
    order: u32,
    min_personal_volume: f64,
    min_group_volume: f64,
    avg_monthly_income: f64,
}

impl From<&CompensationPlan> for PlanView {
    fn from(plan: &CompensationPlan) -> Self {
        let mut ranks: Vec<RankView> = plan
            .ranks
            .iter()
            .map(|rank| RankView {
                id: rank.id.0.clone(),
                display_name: rank.display_name.clone(),
                order: rank.order,
                min_personal_volume: rank.requirements.min_personal_volume,
                min_group_volume: rank.requirements.min_group_volume,
                avg_monthly_income: rank.earning_estimate.avg_monthly_income,
            })
            .collect();
        ranks.sort_by_key(|rank| rank.order);
        Self {
            company_id: plan.company_id.0.clone(),
            region: plan.region.clone(),
            unit_label: plan.unit_label.clone(),
            currency: plan.currency.clone(),
            avg_volume_per_customer: plan.avg_volume_per_customer,
            avg_volume_per_partner: plan.avg_volume_per_partner,
            ranks,
        }
    }
}
