pub mod memory;

use chrono::{DateTime, Utc};

use crate::workflows::followup::domain::{
    EnrollmentId, SequenceEnrollment, SequenceId, Suggestion, SuggestionId,
};
use crate::workflows::goals::domain::{DailyFlowTargets, Goal};
use crate::workflows::leads::domain::{Lead, LeadId, UserId};
use crate::workflows::leads::events::{EventDraft, EventType, LeadEvent};
use crate::workflows::plans::CompanyId;
use crate::workflows::scoring::ScoreSet;

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("stale write rejected: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The persistence port the engines consume. Implementations must keep
/// `upsert_enrollment` compare-and-swap on `version`; that single check is
/// what serializes writers per (lead, sequence).
pub trait LeadStore: Send + Sync {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError>;
    fn get_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError>;
    fn update_lead(&self, lead: Lead) -> Result<(), StoreError>;

    /// Append-only; the store assigns a monotonic id used as the tiebreaker
    /// in `(occurred_at, id)` ordering.
    fn append_event(&self, draft: EventDraft) -> Result<LeadEvent, StoreError>;
    fn list_events(
        &self,
        lead_id: &LeadId,
        since: Option<DateTime<Utc>>,
        types: Option<&[EventType]>,
    ) -> Result<Vec<LeadEvent>, StoreError>;

    fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<SequenceEnrollment>, StoreError>;
    fn find_enrollment(
        &self,
        lead_id: &LeadId,
        sequence_id: &SequenceId,
    ) -> Result<Option<SequenceEnrollment>, StoreError>;
    fn enrollments_for_lead(&self, lead_id: &LeadId)
        -> Result<Vec<SequenceEnrollment>, StoreError>;
    /// Compare-and-swap upsert: the write is accepted only when `version`
    /// matches the stored row (or 0 for an insert); the stored copy comes
    /// back with the version bumped.
    fn upsert_enrollment(
        &self,
        enrollment: SequenceEnrollment,
    ) -> Result<SequenceEnrollment, StoreError>;

    fn get_suggestion(&self, id: &SuggestionId) -> Result<Option<Suggestion>, StoreError>;
    fn pending_suggestion(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Option<Suggestion>, StoreError>;
    fn upsert_suggestion(&self, suggestion: Suggestion) -> Result<(), StoreError>;
    /// Pending items due before `before`, ordered
    /// `(priority desc, due_at asc, lead_id asc)`.
    fn list_due_suggestions(
        &self,
        owner: &UserId,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Suggestion>, StoreError>;

    fn put_scores(&self, lead_id: &LeadId, scores: ScoreSet) -> Result<(), StoreError>;
    fn get_scores(&self, lead_id: &LeadId) -> Result<Option<ScoreSet>, StoreError>;

    /// One goal per (user, company); setting again replaces it.
    fn put_goal(&self, goal: Goal) -> Result<(), StoreError>;
    fn get_goal(
        &self,
        user_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Goal>, StoreError>;
    fn put_daily_flow_targets(
        &self,
        user_id: &UserId,
        targets: DailyFlowTargets,
    ) -> Result<(), StoreError>;
    fn get_daily_flow_targets(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DailyFlowTargets>, StoreError>;

    /// Leads touched since `since`; drives the score-maintenance job.
    fn leads_with_events_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LeadId>, StoreError>;

    /// Non-terminal, non-dormant leads whose last contact (or creation)
    /// predates `cutoff`; drives the dormancy sweep.
    fn leads_idle_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LeadId>, StoreError>;

    /// Distinct owners that currently have pending suggestions; the
    /// follow-up tick iterates these.
    fn owners_with_pending_suggestions(&self, limit: usize) -> Result<Vec<UserId>, StoreError>;
}
