use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{
    SequenceEnrollment, SequenceId, SnoozeOption, StepAction, Suggestion, SuggestionId,
};
use super::engine::FollowUpEngine;
use crate::error::AppError;
use crate::generator::{
    generate_with_timeout, sanitize_skeleton, DraftLeadAttributes, DraftRequest, GenerationTask,
    MessageGenerator,
};
use crate::storage::LeadStore;
use crate::workflows::leads::domain::{LeadId, UserId};

/// Shared state for the follow-up endpoints: the engine plus the lazily
/// invoked draft generator.
pub struct FollowUpApi<S, G> {
    pub engine: Arc<FollowUpEngine<S>>,
    pub generator: Arc<G>,
    pub generator_timeout: Duration,
}

impl<S, G> Clone for FollowUpApi<S, G> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            generator: self.generator.clone(),
            generator_timeout: self.generator_timeout,
        }
    }
}

/// Router builder exposing enroll, the due-item work queue, sent/snooze
/// acknowledgements, and draft generation.
pub fn followup_router<S, G>(state: FollowUpApi<S, G>) -> Router
where
    S: LeadStore + 'static,
    G: MessageGenerator + 'static,
{
    Router::new()
        .route(
            "/api/v1/followups/enrollments",
            post(enroll_handler::<S, G>),
        )
        .route("/api/v1/followups/due", get(due_handler::<S, G>))
        .route(
            "/api/v1/followups/suggestions/:suggestion_id/sent",
            post(sent_handler::<S, G>),
        )
        .route(
            "/api/v1/followups/suggestions/:suggestion_id/snooze",
            post(snooze_handler::<S, G>),
        )
        .route(
            "/api/v1/followups/suggestions/:suggestion_id/draft",
            post(draft_handler::<S, G>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct EnrollRequest {
    lead_id: Uuid,
    #[serde(default)]
    sequence_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnrollResponse {
    enrollment: SequenceEnrollment,
    suggestion: Suggestion,
}

async fn enroll_handler<S, G>(
    State(state): State<FollowUpApi<S, G>>,
    Json(request): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: LeadStore + 'static,
    G: MessageGenerator + 'static,
{
    let sequence_id = request.sequence_id.map(SequenceId);
    let (enrollment, suggestion) = state
        .engine
        .enroll(&LeadId(request.lead_id), sequence_id.as_ref())?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            enrollment,
            suggestion,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct DueQuery {
    user_id: Uuid,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

async fn due_handler<S, G>(
    State(state): State<FollowUpApi<S, G>>,
    Query(query): Query<DueQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: LeadStore + 'static,
    G: MessageGenerator + 'static,
{
    let due = state
        .engine
        .due_suggestions(&UserId(query.user_id), Utc::now(), query.limit)?;
    let views: Vec<_> = due.iter().map(|suggestion| suggestion.queue_view()).collect();
    Ok(Json(views))
}

#[derive(Debug, Serialize)]
struct SentResponse {
    enrollment: SequenceEnrollment,
    sent: Suggestion,
    #[serde(skip_serializing_if = "Option::is_none")]
    emitted: Option<Suggestion>,
}

async fn sent_handler<S, G>(
    State(state): State<FollowUpApi<S, G>>,
    Path(suggestion_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: LeadStore + 'static,
    G: MessageGenerator + 'static,
{
    let outcome = state.engine.process_sent(&SuggestionId(suggestion_id))?;
    Ok(Json(SentResponse {
        enrollment: outcome.enrollment,
        sent: outcome.sent,
        emitted: outcome.emitted,
    }))
}

async fn snooze_handler<S, G>(
    State(state): State<FollowUpApi<S, G>>,
    Path(suggestion_id): Path<String>,
    Json(option): Json<SnoozeOption>,
) -> Result<impl IntoResponse, AppError>
where
    S: LeadStore + 'static,
    G: MessageGenerator + 'static,
{
    let suggestion = state.engine.snooze(&SuggestionId(suggestion_id), option)?;
    Ok(Json(suggestion))
}

#[derive(Debug, Serialize)]
struct DraftResponse {
    content: String,
    model_id: String,
    tokens_used: u32,
    prompt_version: String,
}

async fn draft_handler<S, G>(
    State(state): State<FollowUpApi<S, G>>,
    Path(suggestion_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: LeadStore + 'static,
    G: MessageGenerator + 'static,
{
    let (suggestion, lead) = state
        .engine
        .draft_context(&SuggestionId(suggestion_id))?;

    let task = match suggestion.meta.step_action {
        StepAction::CallAttempt => GenerationTask::FollowupGeneration,
        _ if suggestion.meta.template_key.starts_with("icebreaker") => GenerationTask::Icebreaker,
        _ if suggestion.meta.template_key.starts_with("objection") => {
            GenerationTask::ObjectionResponse
        }
        _ => GenerationTask::FollowupGeneration,
    };

    let request = DraftRequest {
        task,
        lead: DraftLeadAttributes {
            display_name: lead.display_name.clone(),
            vertical: lead.vertical,
            disc: lead.disc,
            channel: Some(suggestion.channel),
        },
        template_key: suggestion.meta.template_key.clone(),
        step_action: Some(suggestion.meta.step_action),
    };

    let message =
        generate_with_timeout(state.generator.as_ref(), request, state.generator_timeout).await?;

    Ok(Json(DraftResponse {
        content: sanitize_skeleton(&message.content),
        model_id: message.model_id,
        tokens_used: message.tokens_used,
        prompt_version: message.prompt_version,
    }))
}
