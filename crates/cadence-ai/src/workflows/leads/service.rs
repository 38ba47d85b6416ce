use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    ContactChannels, DiscProfile, EnrichmentSnapshot, Lead, LeadCounters, LeadId, LifecycleError,
    LifecycleState, UserId, Vertical,
};
use super::events::{Direction, EventDraft, EventPayload, EventType, LeadEvent};
use crate::clock::Clock;
use crate::storage::{LeadStore, StoreError};
use crate::workflows::followup::engine::{EnrollmentChange, FollowUpEngine, FollowUpError};
use crate::workflows::nba::{self, NextBestAction};
use crate::workflows::scoring::{ScoreSet, ScoringEngine};

/// Days without contact after which the dormancy sweep parks a lead.
pub const DORMANCY_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum LeadServiceError {
    #[error("lead {0} not found")]
    NotFound(LeadId),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    FollowUp(#[from] FollowUpError),
}

/// Payload for registering a lead.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewLead {
    pub owner: UserId,
    pub display_name: String,
    #[serde(default)]
    pub channels: ContactChannels,
    pub vertical: Vertical,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub enrichment: Option<EnrichmentSnapshot>,
    #[serde(default)]
    pub disc: Option<DiscProfile>,
}

/// Everything one appended event caused.
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub event: LeadEvent,
    pub scores: ScoreSet,
    pub enrollment_changes: Vec<EnrollmentChange>,
    /// Set when the event pulled a dormant lead back to engaged.
    pub revived: bool,
}

/// Single entry point for lead mutations. Appending an event maintains the
/// lead row, recomputes scores, and forwards the event to the follow-up
/// engine; lifecycle transitions cancel open enrollments in the same
/// operation when they reach a terminal state.
pub struct LeadActivityService<S> {
    store: Arc<S>,
    scoring: ScoringEngine,
    followup: Arc<FollowUpEngine<S>>,
    clock: Arc<dyn Clock>,
}

impl<S: LeadStore> LeadActivityService<S> {
    pub fn new(
        store: Arc<S>,
        scoring: ScoringEngine,
        followup: Arc<FollowUpEngine<S>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            scoring,
            followup,
            clock,
        }
    }

    pub fn followup(&self) -> &FollowUpEngine<S> {
        &self.followup
    }

    pub fn create_lead(&self, request: NewLead) -> Result<Lead, LeadServiceError> {
        let lead = Lead {
            id: LeadId::new(),
            owner: request.owner,
            display_name: request.display_name,
            channels: request.channels,
            lifecycle: LifecycleState::New,
            vertical: request.vertical,
            timezone: request.timezone,
            last_contact_at: None,
            counters: LeadCounters::default(),
            enrichment: request.enrichment,
            disc: request.disc,
            hot: false,
            opted_out: false,
            created_at: self.clock.now_utc(),
        };
        Ok(self.store.insert_lead(lead)?)
    }

    pub fn get_lead(&self, id: &LeadId) -> Result<Lead, LeadServiceError> {
        self.store
            .get_lead(id)?
            .ok_or_else(|| LeadServiceError::NotFound(id.clone()))
    }

    pub fn scores(&self, id: &LeadId) -> Result<Option<ScoreSet>, LeadServiceError> {
        self.get_lead(id)?;
        Ok(self.store.get_scores(id)?)
    }

    /// Append an event and run every downstream reaction: lead row upkeep,
    /// score recompute, follow-up cancel/advance. Recomputing over the same
    /// event prefix is idempotent, so a retried call converges.
    pub fn record_event(&self, draft: EventDraft) -> Result<EventOutcome, LeadServiceError> {
        let mut lead = self.get_lead(&draft.lead_id)?;
        let event = self.store.append_event(draft)?;

        if event.direction.is_some() {
            lead.last_contact_at = Some(
                lead.last_contact_at
                    .map_or(event.occurred_at, |previous| previous.max(event.occurred_at)),
            );
        }
        match event.event_type {
            EventType::MessageSent => lead.counters.outbound_messages += 1,
            EventType::MessageReceived => lead.counters.inbound_messages += 1,
            EventType::MeetingBooked => lead.counters.meetings_booked += 1,
            EventType::OptOut => lead.opted_out = true,
            EventType::EnrichmentUpdated => {
                if let EventPayload::EnrichmentUpdated { snapshot } = &event.payload {
                    lead.enrichment = Some(snapshot.clone());
                }
            }
            _ => {}
        }

        // An inbound signal wakes a dormant lead back up.
        let mut revived = false;
        if lead.lifecycle == LifecycleState::Dormant
            && event.direction == Some(Direction::Inbound)
            && event.event_type != EventType::OptOut
        {
            lead.transition(LifecycleState::Engaged)?;
            revived = true;
            info!(lead = %lead.id, "dormant lead revived by inbound activity");
        }

        self.store.update_lead(lead.clone())?;

        let now = self.clock.now_utc();
        let events = self.store.list_events(&lead.id, None, None)?;
        let scores = self.scoring.score(&lead, &events, now);
        self.store.put_scores(&lead.id, scores.clone())?;

        let enrollment_changes = self.followup.handle_event(&lead, &event)?;
        debug!(
            lead = %lead.id,
            event = ?event.event_type,
            composite = scores.composite,
            changes = enrollment_changes.len(),
            "event recorded"
        );

        Ok(EventOutcome {
            event,
            scores,
            enrollment_changes,
            revived,
        })
    }

    /// Move a lead through the lifecycle. Entering `won`, `lost`, or
    /// `churned` cancels all open enrollments within the same operation.
    pub fn transition(
        &self,
        id: &LeadId,
        to: LifecycleState,
    ) -> Result<Lead, LeadServiceError> {
        let mut lead = self.get_lead(id)?;
        lead.transition(to)?;
        self.store.update_lead(lead.clone())?;

        if to.is_terminal() {
            let cancelled = self.followup.cancel_all_for_lead(id)?;
            if !cancelled.is_empty() {
                info!(
                    lead = %lead.id,
                    state = to.label(),
                    cancelled = cancelled.len(),
                    "terminal transition cancelled open enrollments"
                );
            }
        }
        Ok(lead)
    }

    /// Park leads whose last contact is older than the dormancy threshold.
    /// Chunked and idempotent; scheduled from the maintenance worker.
    pub fn sweep_dormant(&self, limit: usize) -> Result<usize, LeadServiceError> {
        let cutoff = self.clock.now_utc() - Duration::days(DORMANCY_DAYS);
        let mut parked = 0;
        for lead_id in self.store.leads_idle_since(cutoff, limit)? {
            let mut lead = self.get_lead(&lead_id)?;
            if !lead.lifecycle.can_transition(LifecycleState::Dormant) {
                continue;
            }
            lead.transition(LifecycleState::Dormant)?;
            self.store.update_lead(lead)?;
            parked += 1;
        }
        Ok(parked)
    }

    /// Answer "what should I do with this lead right now?" from persisted
    /// state only: the resolver joins lifecycle, last score, last event, and
    /// the earliest due pending suggestion.
    pub fn next_best_action(&self, id: &LeadId) -> Result<NextBestAction, LeadServiceError> {
        let lead = self.get_lead(id)?;
        let now = self.clock.now_utc();
        let scores = self.store.get_scores(id)?;
        let last_event = self.store.list_events(id, None, None)?.into_iter().last();
        let due = self.earliest_due_suggestion(&lead, now)?;
        Ok(nba::resolve(
            &lead,
            scores.as_ref(),
            last_event.as_ref(),
            due.as_ref(),
            now,
        ))
    }

    fn earliest_due_suggestion(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Option<crate::workflows::followup::domain::Suggestion>, LeadServiceError> {
        let mut earliest: Option<crate::workflows::followup::domain::Suggestion> = None;
        for enrollment in self.store.enrollments_for_lead(&lead.id)? {
            let Some(pending) = self.store.pending_suggestion(&enrollment.id)? else {
                continue;
            };
            if pending.due_at > now {
                continue;
            }
            let is_earlier = earliest
                .as_ref()
                .map_or(true, |current| pending.due_at < current.due_at);
            if is_earlier {
                earliest = Some(pending);
            }
        }
        Ok(earliest)
    }
}
