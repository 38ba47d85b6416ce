use crate::config::ConfigError;
use crate::generator::GeneratorError;
use crate::storage::StoreError;
use crate::telemetry::TelemetryError;
use crate::workflows::followup::engine::FollowUpError;
use crate::workflows::goals::engine::GoalError;
use crate::workflows::leads::domain::LifecycleError;
use crate::workflows::plans::PlanRegistryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Boundary error surfaced by the HTTP layer. Engine-internal messages are
/// preserved for logs; response bodies only carry the display string.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    NotFound(String),
    InvalidTransition(String),
    InvalidConfig(String),
    NoRankMeetsTarget(String),
    GeneratorTimeout(String),
    GeneratorFailed(String),
    Conflict(String),
    Inconsistent(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::NotFound(detail) => write!(f, "not found: {}", detail),
            AppError::InvalidTransition(detail) => write!(f, "invalid transition: {}", detail),
            AppError::InvalidConfig(detail) => write!(f, "invalid config: {}", detail),
            AppError::NoRankMeetsTarget(detail) => write!(f, "{}", detail),
            AppError::GeneratorTimeout(detail) => write!(f, "{}", detail),
            AppError::GeneratorFailed(detail) => write!(f, "{}", detail),
            AppError::Conflict(detail) => write!(f, "conflict: {}", detail),
            AppError::Inconsistent(detail) => write!(f, "data inconsistency: {}", detail),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            _ => None,
        }
    }
}

impl AppError {
    /// Stable machine-readable code, mirrored in response payloads.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Telemetry(_) => "telemetry",
            AppError::Io(_) => "io",
            AppError::Server(_) => "server",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::InvalidConfig(_) => "invalid_config",
            AppError::NoRankMeetsTarget(_) => "no_rank_meets_target",
            AppError::GeneratorTimeout(_) => "generator_timeout",
            AppError::GeneratorFailed(_) => "generator_failed",
            AppError::Conflict(_) => "conflict",
            AppError::Inconsistent(_) => "inconsistent",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition(_)
            | AppError::InvalidConfig(_)
            | AppError::NoRankMeetsTarget(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::GeneratorTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::GeneratorFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => Self::NotFound("record not found".to_string()),
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Unavailable(detail) => {
                Self::Io(std::io::Error::new(std::io::ErrorKind::Other, detail))
            }
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(value: LifecycleError) -> Self {
        Self::InvalidTransition(value.to_string())
    }
}

impl From<GoalError> for AppError {
    fn from(value: GoalError) -> Self {
        match value {
            GoalError::InvalidConfig(detail) => Self::InvalidConfig(detail),
            err @ GoalError::NoRankMeetsTarget { .. } => Self::NoRankMeetsTarget(err.to_string()),
            err @ GoalError::RankNotFound(_) => Self::NotFound(err.to_string()),
            GoalError::Plan(err) => Self::NotFound(err.to_string()),
        }
    }
}

impl From<PlanRegistryError> for AppError {
    fn from(value: PlanRegistryError) -> Self {
        Self::NotFound(value.to_string())
    }
}

impl From<crate::workflows::goals::service::GoalServiceError> for AppError {
    fn from(value: crate::workflows::goals::service::GoalServiceError) -> Self {
        use crate::workflows::goals::service::GoalServiceError;
        match value {
            GoalServiceError::Goal(err) => err.into(),
            GoalServiceError::Plan(err) => err.into(),
            GoalServiceError::Store(err) => err.into(),
        }
    }
}

impl From<GeneratorError> for AppError {
    fn from(value: GeneratorError) -> Self {
        match value {
            err @ GeneratorError::Timeout(_) => Self::GeneratorTimeout(err.to_string()),
            err @ GeneratorError::Failed(_) => Self::GeneratorFailed(err.to_string()),
        }
    }
}

impl From<crate::workflows::leads::service::LeadServiceError> for AppError {
    fn from(value: crate::workflows::leads::service::LeadServiceError) -> Self {
        use crate::workflows::leads::service::LeadServiceError;
        match value {
            err @ LeadServiceError::NotFound(_) => Self::NotFound(err.to_string()),
            LeadServiceError::Lifecycle(err) => err.into(),
            LeadServiceError::Store(err) => err.into(),
            LeadServiceError::FollowUp(err) => err.into(),
        }
    }
}

impl From<FollowUpError> for AppError {
    fn from(value: FollowUpError) -> Self {
        match value {
            err @ (FollowUpError::LeadNotFound(_)
            | FollowUpError::SequenceUnknown(_)
            | FollowUpError::NoSequenceForLead { .. }
            | FollowUpError::EnrollmentNotFound(_)
            | FollowUpError::SuggestionNotFound(_)) => Self::NotFound(err.to_string()),
            err @ FollowUpError::AlreadyEnrolled { .. } => Self::Conflict(err.to_string()),
            err @ (FollowUpError::LeadClosed { .. }
            | FollowUpError::EnrollmentClosed { .. }
            | FollowUpError::SuggestionClosed { .. }) => Self::InvalidTransition(err.to_string()),
            err @ FollowUpError::SnoozeInPast(_) => Self::InvalidConfig(err.to_string()),
            err @ FollowUpError::Inconsistent(_, _) => Self::Inconsistent(err.to_string()),
            err @ FollowUpError::Contention { .. } => Self::Conflict(err.to_string()),
            FollowUpError::Store(err) => err.into(),
        }
    }
}
