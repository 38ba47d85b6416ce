use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{Channel, LeadId, LifecycleState};
use super::events::{Direction, EventDraft, EventPayload, EventType};
use super::service::{LeadActivityService, NewLead};
use crate::error::AppError;
use crate::storage::LeadStore;

/// Router builder for lead CRUD, event ingress, transitions, scores, and the
/// next-best-action read.
pub fn lead_router<S: LeadStore + 'static>(service: Arc<LeadActivityService<S>>) -> Router {
    Router::new()
        .route("/api/v1/leads", post(create_handler::<S>))
        .route("/api/v1/leads/:lead_id", get(get_handler::<S>))
        .route("/api/v1/leads/:lead_id/events", post(event_handler::<S>))
        .route(
            "/api/v1/leads/:lead_id/transition",
            post(transition_handler::<S>),
        )
        .route("/api/v1/leads/:lead_id/score", get(score_handler::<S>))
        .route(
            "/api/v1/leads/:lead_id/next-best-action",
            get(nba_handler::<S>),
        )
        .with_state(service)
}

async fn create_handler<S: LeadStore>(
    State(service): State<Arc<LeadActivityService<S>>>,
    Json(request): Json<NewLead>,
) -> Result<impl IntoResponse, AppError> {
    let lead = service.create_lead(request)?;
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_handler<S: LeadStore>(
    State(service): State<Arc<LeadActivityService<S>>>,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lead = service.get_lead(&LeadId(lead_id))?;
    Ok(Json(lead))
}

/// Event as accepted at the ingress boundary; `occurred_at` defaults to the
/// receive instant so webhook relays without timestamps stay usable.
#[derive(Debug, Deserialize)]
struct EventRequest {
    event_type: EventType,
    #[serde(default)]
    direction: Option<Direction>,
    #[serde(default)]
    channel: Option<Channel>,
    #[serde(default)]
    occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    payload: Option<EventPayload>,
}

async fn event_handler<S: LeadStore>(
    State(service): State<Arc<LeadActivityService<S>>>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<EventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let draft = EventDraft {
        lead_id: LeadId(lead_id),
        event_type: request.event_type,
        direction: request.direction,
        channel: request.channel,
        occurred_at: request.occurred_at.unwrap_or_else(Utc::now),
        payload: request.payload.unwrap_or_default(),
    };
    let outcome = service.record_event(draft)?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    to: LifecycleState,
}

async fn transition_handler<S: LeadStore>(
    State(service): State<Arc<LeadActivityService<S>>>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let lead = service.transition(&LeadId(lead_id), request.to)?;
    Ok(Json(lead))
}

async fn score_handler<S: LeadStore>(
    State(service): State<Arc<LeadActivityService<S>>>,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let scores = service.scores(&LeadId(lead_id))?;
    match scores {
        Some(scores) => Ok(Json(scores).into_response()),
        None => Ok((
            StatusCode::OK,
            Json(json!({ "status": "not_scored_yet" })),
        )
            .into_response()),
    }
}

async fn nba_handler<S: LeadStore>(
    State(service): State<Arc<LeadActivityService<S>>>,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let action = service.next_best_action(&LeadId(lead_id))?;
    Ok(Json(action))
}
