use std::sync::Arc;

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{error, info};

use super::catalog::SequenceCatalog;
use super::domain::{
    EnrollmentId, EnrollmentStatus, Priority, Sequence, SequenceEnrollment, SequenceId,
    SequenceStep, SnoozeOption, StepAction, Suggestion, SuggestionId, SuggestionMeta,
    SuggestionStatus,
};
use crate::clock::{self, Clock, ContactWindow};
use crate::storage::{LeadStore, StoreError};
use crate::workflows::leads::domain::{Lead, LeadId, LifecycleState, UserId};
use crate::workflows::leads::events::{EventType, LeadEvent};

const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum FollowUpError {
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error("sequence {0} is not in the catalog")]
    SequenceUnknown(SequenceId),
    #[error("no sequence covers state {state} for vertical {vertical}")]
    NoSequenceForLead { state: String, vertical: String },
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("suggestion {0} not found")]
    SuggestionNotFound(SuggestionId),
    #[error("lead {lead} already has an active enrollment in {sequence}")]
    AlreadyEnrolled { lead: LeadId, sequence: SequenceId },
    #[error("lead {lead} is {state} and cannot take follow-ups", state = .state.label())]
    LeadClosed { lead: LeadId, state: LifecycleState },
    #[error("enrollment {id} is {status} and accepts no further work", status = .status.label())]
    EnrollmentClosed {
        id: EnrollmentId,
        status: EnrollmentStatus,
    },
    #[error("suggestion {id} was already {status}", status = .status.label())]
    SuggestionClosed {
        id: SuggestionId,
        status: SuggestionStatus,
    },
    #[error("snooze target {0} is not in the future")]
    SnoozeInPast(DateTime<Utc>),
    #[error("enrollment {0} references missing data: {1}")]
    Inconsistent(EnrollmentId, String),
    #[error("gave up after {attempts} conflicting writes: {last}")]
    Contention { attempts: u32, last: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an incoming event did to one enrollment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum EnrollmentChange {
    Cancelled {
        enrollment_id: EnrollmentId,
    },
    Advanced {
        enrollment_id: EnrollmentId,
        to_step: u32,
        emitted: SuggestionId,
    },
    Completed {
        enrollment_id: EnrollmentId,
    },
}

/// Result of acknowledging a sent suggestion.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub enrollment: SequenceEnrollment,
    pub sent: Suggestion,
    pub emitted: Option<Suggestion>,
}

/// Drives leads through sequences: one pending suggestion per active
/// enrollment, timezone-correct due instants, cancel-before-advance on
/// conflicting events. All writes go through the store's compare-and-swap,
/// with a bounded internal retry before `Contention` surfaces.
pub struct FollowUpEngine<S> {
    store: Arc<S>,
    catalog: Arc<SequenceCatalog>,
    clock: Arc<dyn Clock>,
    window: ContactWindow,
    default_timezone: String,
}

impl<S: LeadStore> FollowUpEngine<S> {
    pub fn new(
        store: Arc<S>,
        catalog: Arc<SequenceCatalog>,
        clock: Arc<dyn Clock>,
        window: ContactWindow,
        default_timezone: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            window,
            default_timezone: default_timezone.into(),
        }
    }

    pub fn catalog(&self) -> &SequenceCatalog {
        &self.catalog
    }

    /// Enroll a lead, either into an explicit sequence or into the catalog's
    /// pick for the lead's lifecycle state and vertical. Returns the stored
    /// enrollment together with its initial pending suggestion.
    pub fn enroll(
        &self,
        lead_id: &LeadId,
        sequence_id: Option<&SequenceId>,
    ) -> Result<(SequenceEnrollment, Suggestion), FollowUpError> {
        self.with_retry(|| self.try_enroll(lead_id, sequence_id))
    }

    fn try_enroll(
        &self,
        lead_id: &LeadId,
        sequence_id: Option<&SequenceId>,
    ) -> Result<(SequenceEnrollment, Suggestion), FollowUpError> {
        let lead = self
            .store
            .get_lead(lead_id)?
            .ok_or_else(|| FollowUpError::LeadNotFound(lead_id.clone()))?;
        if lead.opted_out || lead.lifecycle.is_terminal() {
            return Err(FollowUpError::LeadClosed {
                lead: lead.id.clone(),
                state: lead.lifecycle,
            });
        }

        let sequence = match sequence_id {
            Some(id) => self
                .catalog
                .get(id)
                .ok_or_else(|| FollowUpError::SequenceUnknown(id.clone()))?,
            None => self
                .catalog
                .select(lead.lifecycle, lead.vertical)
                .ok_or_else(|| FollowUpError::NoSequenceForLead {
                    state: lead.lifecycle.label().to_string(),
                    vertical: lead.vertical.label().to_string(),
                })?,
        };

        let existing = self.store.find_enrollment(lead_id, &sequence.id)?;
        if let Some(existing) = &existing {
            if existing.status.is_open() {
                return Err(FollowUpError::AlreadyEnrolled {
                    lead: lead.id.clone(),
                    sequence: sequence.id.clone(),
                });
            }
        }

        let step = sequence.step(0).ok_or_else(|| {
            FollowUpError::Inconsistent(
                EnrollmentId::for_pair(lead_id, &sequence.id),
                "sequence has no steps".to_string(),
            )
        })?;

        let now = self.clock.now_utc();
        let due = self.scheduled_due(&lead, step, now);
        let enrollment = SequenceEnrollment {
            id: EnrollmentId::for_pair(lead_id, &sequence.id),
            lead_id: lead.id.clone(),
            sequence_id: sequence.id.clone(),
            current_step: 0,
            status: EnrollmentStatus::Active,
            enrolled_at: now,
            next_due_at: Some(due),
            generation: existing.as_ref().map(|e| e.generation + 1).unwrap_or(1),
            version: existing.map(|e| e.version).unwrap_or(0),
        };
        let enrollment = self.store.upsert_enrollment(enrollment)?;

        let suggestion = self.emit_for(&lead, &enrollment, sequence, step)?;
        info!(lead = %lead.id, sequence = %sequence.id, due = %due, "lead enrolled");
        Ok((enrollment, suggestion))
    }

    /// Idempotent per (enrollment, current step): a retried emit returns the
    /// stored suggestion instead of minting a duplicate.
    pub fn emit(&self, enrollment_id: &EnrollmentId) -> Result<Suggestion, FollowUpError> {
        self.with_retry(|| self.try_emit(enrollment_id))
    }

    fn try_emit(&self, enrollment_id: &EnrollmentId) -> Result<Suggestion, FollowUpError> {
        let enrollment = self
            .store
            .get_enrollment(enrollment_id)?
            .ok_or_else(|| FollowUpError::EnrollmentNotFound(enrollment_id.clone()))?;
        if enrollment.status != EnrollmentStatus::Active {
            return Err(FollowUpError::EnrollmentClosed {
                id: enrollment.id.clone(),
                status: enrollment.status,
            });
        }

        let (lead, sequence) = self.load_pair(&enrollment)?;
        let step = sequence.step(enrollment.current_step).ok_or_else(|| {
            FollowUpError::Inconsistent(
                enrollment.id.clone(),
                format!("step {} out of range", enrollment.current_step),
            )
        })?;

        self.emit_for(&lead, &enrollment, sequence, step)
    }

    fn emit_for(
        &self,
        lead: &Lead,
        enrollment: &SequenceEnrollment,
        sequence: &Sequence,
        step: &SequenceStep,
    ) -> Result<Suggestion, FollowUpError> {
        let id = SuggestionId::for_step(&enrollment.id, enrollment.generation, enrollment.current_step);
        if let Some(existing) = self.store.get_suggestion(&id)? {
            return Ok(existing);
        }

        // A pending item from an earlier step was superseded by an advance.
        if let Some(mut stale) = self.store.pending_suggestion(&enrollment.id)? {
            if stale.step != enrollment.current_step {
                stale.status = SuggestionStatus::Skipped;
                self.store.upsert_suggestion(stale)?;
            }
        }

        let now = self.clock.now_utc();
        let due_at = enrollment
            .next_due_at
            .unwrap_or_else(|| self.scheduled_due(lead, step, now));
        let channel = lead
            .channels
            .first_of(&step.channel_preference)
            .or_else(|| lead.channels.preferred())
            .unwrap_or(crate::workflows::leads::domain::Channel::Email);
        let priority = self.priority_for(&lead.id)?;

        let suggestion = Suggestion {
            id,
            lead_id: lead.id.clone(),
            owner: lead.owner.clone(),
            enrollment_id: enrollment.id.clone(),
            step: enrollment.current_step,
            due_at,
            channel,
            priority,
            meta: SuggestionMeta {
                template_key: step.template_key.to_string(),
                step_action: step.action,
                reason: format!(
                    "{} · step {} of {}",
                    sequence.name,
                    enrollment.current_step + 1,
                    sequence.steps.len()
                ),
            },
            status: SuggestionStatus::Pending,
            snoozed_until: None,
            created_at: now,
        };
        self.store.upsert_suggestion(suggestion.clone())?;
        Ok(suggestion)
    }

    /// Acknowledge that the pending suggestion went out, advance the
    /// enrollment, and schedule the next item. Steps whose `advance_on` was
    /// already satisfied by an event newer than the sent suggestion are
    /// caught up without emitting a superseded item.
    pub fn process_sent(
        &self,
        suggestion_id: &SuggestionId,
    ) -> Result<ProcessOutcome, FollowUpError> {
        self.with_retry(|| self.try_finish(suggestion_id, SuggestionStatus::Sent))
    }

    /// Complete an elapsed wait step: the pending item is marked skipped
    /// (nothing was sent) and the enrollment advances exactly as after a
    /// sent acknowledgement. Driven by the follow-up tick worker.
    pub fn complete_wait(
        &self,
        suggestion_id: &SuggestionId,
    ) -> Result<ProcessOutcome, FollowUpError> {
        self.with_retry(|| self.try_finish(suggestion_id, SuggestionStatus::Skipped))
    }

    fn try_finish(
        &self,
        suggestion_id: &SuggestionId,
        mark: SuggestionStatus,
    ) -> Result<ProcessOutcome, FollowUpError> {
        let mut suggestion = self
            .store
            .get_suggestion(suggestion_id)?
            .ok_or_else(|| FollowUpError::SuggestionNotFound(suggestion_id.clone()))?;

        let Some(enrollment) = self.store.get_enrollment(&suggestion.enrollment_id)? else {
            error!(
                suggestion = %suggestion.id,
                enrollment = %suggestion.enrollment_id,
                "suggestion references a missing enrollment; refusing further emission"
            );
            suggestion.status = SuggestionStatus::Cancelled;
            self.store.upsert_suggestion(suggestion.clone())?;
            return Err(FollowUpError::Inconsistent(
                suggestion.enrollment_id.clone(),
                "enrollment row is missing".to_string(),
            ));
        };

        match suggestion.status {
            SuggestionStatus::Pending => {}
            // A retried acknowledgement is a no-op, not a duplicate.
            status if status == mark => {
                return Ok(ProcessOutcome {
                    enrollment,
                    sent: suggestion,
                    emitted: None,
                })
            }
            status => {
                return Err(FollowUpError::SuggestionClosed {
                    id: suggestion.id.clone(),
                    status,
                })
            }
        }

        if enrollment.status != EnrollmentStatus::Active {
            return Err(FollowUpError::EnrollmentClosed {
                id: enrollment.id.clone(),
                status: enrollment.status,
            });
        }
        if enrollment.current_step != suggestion.step {
            return Err(FollowUpError::Inconsistent(
                enrollment.id.clone(),
                format!(
                    "suggestion for step {} but enrollment sits at {}",
                    suggestion.step, enrollment.current_step
                ),
            ));
        }

        let (lead, sequence) = self.load_pair(&enrollment)?;

        suggestion.status = mark;
        self.store.upsert_suggestion(suggestion.clone())?;

        let now = self.clock.now_utc();
        let mut since_sent = self
            .store
            .list_events(&lead.id, Some(suggestion.created_at), None)?;

        let mut enrollment = enrollment;
        loop {
            let next = enrollment.current_step + 1;
            let Some(step) = sequence.step(next) else {
                let enrollment = self.close(enrollment, EnrollmentStatus::Completed)?;
                return Ok(ProcessOutcome {
                    enrollment,
                    sent: suggestion,
                    emitted: None,
                });
            };
            if step.action == StepAction::End {
                let enrollment = self.close(enrollment, EnrollmentStatus::Completed)?;
                return Ok(ProcessOutcome {
                    enrollment,
                    sent: suggestion,
                    emitted: None,
                });
            }

            // Cancel beats advance when both sets match an event.
            if since_sent
                .iter()
                .any(|event| step.cancel_on.contains(&event.event_type))
            {
                let enrollment = self.close(enrollment, EnrollmentStatus::Cancelled)?;
                return Ok(ProcessOutcome {
                    enrollment,
                    sent: suggestion,
                    emitted: None,
                });
            }

            enrollment.current_step = next;
            // Each backlogged event satisfies at most one step; consume it so
            // a single reply cannot fast-forward the whole sequence.
            if let Some(position) = since_sent
                .iter()
                .position(|event| step.advance_on.contains(&event.event_type))
            {
                since_sent.remove(position);
                continue;
            }

            enrollment.next_due_at = Some(self.scheduled_due(&lead, step, now));
            let enrollment = self.store.upsert_enrollment(enrollment)?;
            let emitted = self.emit_for(&lead, &enrollment, sequence, step)?;
            return Ok(ProcessOutcome {
                enrollment,
                sent: suggestion,
                emitted: Some(emitted),
            });
        }
    }

    /// React to a freshly appended event: cancel or advance every active
    /// enrollment of the lead. An `opt_out` cancels them all.
    pub fn handle_event(
        &self,
        lead: &Lead,
        event: &LeadEvent,
    ) -> Result<Vec<EnrollmentChange>, FollowUpError> {
        if event.event_type == EventType::OptOut {
            let cancelled = self.cancel_all_for_lead(&lead.id)?;
            return Ok(cancelled
                .into_iter()
                .map(|enrollment_id| EnrollmentChange::Cancelled { enrollment_id })
                .collect());
        }

        let mut changes = Vec::new();
        for enrollment in self.store.enrollments_for_lead(&lead.id)? {
            if enrollment.status != EnrollmentStatus::Active {
                continue;
            }
            let change =
                self.with_retry(|| self.apply_event_to(&enrollment.id, lead, event))?;
            if let Some(change) = change {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    fn apply_event_to(
        &self,
        enrollment_id: &EnrollmentId,
        lead: &Lead,
        event: &LeadEvent,
    ) -> Result<Option<EnrollmentChange>, FollowUpError> {
        let Some(mut enrollment) = self.store.get_enrollment(enrollment_id)? else {
            return Ok(None);
        };
        if enrollment.status != EnrollmentStatus::Active {
            return Ok(None);
        }
        let sequence = self
            .catalog
            .get(&enrollment.sequence_id)
            .ok_or_else(|| FollowUpError::SequenceUnknown(enrollment.sequence_id.clone()))?;
        let step = sequence.step(enrollment.current_step).ok_or_else(|| {
            FollowUpError::Inconsistent(
                enrollment.id.clone(),
                format!("step {} out of range", enrollment.current_step),
            )
        })?;

        if step.cancel_on.contains(&event.event_type) {
            let enrollment = self.close(enrollment, EnrollmentStatus::Cancelled)?;
            return Ok(Some(EnrollmentChange::Cancelled {
                enrollment_id: enrollment.id,
            }));
        }

        if !step.advance_on.contains(&event.event_type) {
            return Ok(None);
        }

        if let Some(mut pending) = self.store.pending_suggestion(&enrollment.id)? {
            pending.status = SuggestionStatus::Skipped;
            self.store.upsert_suggestion(pending)?;
        }

        let next = enrollment.current_step + 1;
        match sequence.step(next) {
            None => {
                let enrollment = self.close(enrollment, EnrollmentStatus::Completed)?;
                Ok(Some(EnrollmentChange::Completed {
                    enrollment_id: enrollment.id,
                }))
            }
            Some(step) if step.action == StepAction::End => {
                let enrollment = self.close(enrollment, EnrollmentStatus::Completed)?;
                Ok(Some(EnrollmentChange::Completed {
                    enrollment_id: enrollment.id,
                }))
            }
            Some(step) => {
                // An answered lead should be worked immediately, whatever
                // the local hour.
                let now = self.clock.now_utc();
                enrollment.current_step = next;
                enrollment.next_due_at = Some(now);
                let enrollment = self.store.upsert_enrollment(enrollment)?;
                let emitted = self.emit_for(lead, &enrollment, sequence, step)?;
                Ok(Some(EnrollmentChange::Advanced {
                    enrollment_id: enrollment.id,
                    to_step: next,
                    emitted: emitted.id,
                }))
            }
        }
    }

    /// Push the pending suggestion's due instant forward. The item stays
    /// pending; it simply drops out of the due list until the new instant.
    pub fn snooze(
        &self,
        suggestion_id: &SuggestionId,
        option: SnoozeOption,
    ) -> Result<Suggestion, FollowUpError> {
        self.with_retry(|| self.try_snooze(suggestion_id, option))
    }

    fn try_snooze(
        &self,
        suggestion_id: &SuggestionId,
        option: SnoozeOption,
    ) -> Result<Suggestion, FollowUpError> {
        let mut suggestion = self
            .store
            .get_suggestion(suggestion_id)?
            .ok_or_else(|| FollowUpError::SuggestionNotFound(suggestion_id.clone()))?;
        if suggestion.status != SuggestionStatus::Pending {
            return Err(FollowUpError::SuggestionClosed {
                id: suggestion.id.clone(),
                status: suggestion.status,
            });
        }

        let lead = self
            .store
            .get_lead(&suggestion.lead_id)?
            .ok_or_else(|| FollowUpError::LeadNotFound(suggestion.lead_id.clone()))?;

        let now = self.clock.now_utc();
        let tz = self.zone_for(&lead);
        let target = match option {
            SnoozeOption::PlusDays { days } => now + chrono::Duration::days(i64::from(days)),
            SnoozeOption::UntilNextMonday18 => clock::next_weekday(tz, now, Weekday::Mon, 18),
            SnoozeOption::UntilMorning9 => clock::next_morning(tz, now, 9),
            SnoozeOption::Until { at } => at,
        };
        if target <= now {
            return Err(FollowUpError::SnoozeInPast(target));
        }

        suggestion.due_at = target;
        suggestion.snoozed_until = Some(target);
        self.store.upsert_suggestion(suggestion.clone())?;

        if let Some(mut enrollment) = self.store.get_enrollment(&suggestion.enrollment_id)? {
            if enrollment.status == EnrollmentStatus::Active {
                enrollment.next_due_at = Some(target);
                self.store.upsert_enrollment(enrollment)?;
            }
        }

        Ok(suggestion)
    }

    /// Cancel every open enrollment of a lead; used on opt-out and when the
    /// lifecycle reaches a terminal state. Returns the cancelled ids.
    pub fn cancel_all_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<EnrollmentId>, FollowUpError> {
        let mut cancelled = Vec::new();
        for enrollment in self.store.enrollments_for_lead(lead_id)? {
            if !enrollment.status.is_open() {
                continue;
            }
            let closed = self.with_retry(|| {
                let Some(current) = self.store.get_enrollment(&enrollment.id)? else {
                    return Ok(None);
                };
                if !current.status.is_open() {
                    return Ok(None);
                }
                Ok(Some(self.close(current, EnrollmentStatus::Cancelled)?))
            })?;
            if let Some(closed) = closed {
                cancelled.push(closed.id);
            }
        }
        Ok(cancelled)
    }

    /// Work-queue read: pending items due before `before`, ordered by
    /// priority, due instant, then lead id.
    pub fn due_suggestions(
        &self,
        owner: &UserId,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Suggestion>, FollowUpError> {
        Ok(self.store.list_due_suggestions(owner, before, limit)?)
    }

    /// Load a suggestion together with its lead, as the draft endpoint needs
    /// both to assemble a generator request.
    pub fn draft_context(
        &self,
        suggestion_id: &SuggestionId,
    ) -> Result<(Suggestion, Lead), FollowUpError> {
        let suggestion = self
            .store
            .get_suggestion(suggestion_id)?
            .ok_or_else(|| FollowUpError::SuggestionNotFound(suggestion_id.clone()))?;
        let lead = self
            .store
            .get_lead(&suggestion.lead_id)?
            .ok_or_else(|| FollowUpError::LeadNotFound(suggestion.lead_id.clone()))?;
        Ok((suggestion, lead))
    }

    fn close(
        &self,
        mut enrollment: SequenceEnrollment,
        status: EnrollmentStatus,
    ) -> Result<SequenceEnrollment, FollowUpError> {
        enrollment.status = status;
        enrollment.next_due_at = None;
        let enrollment = self.store.upsert_enrollment(enrollment)?;
        if let Some(mut pending) = self.store.pending_suggestion(&enrollment.id)? {
            pending.status = match status {
                EnrollmentStatus::Completed => SuggestionStatus::Skipped,
                _ => SuggestionStatus::Cancelled,
            };
            self.store.upsert_suggestion(pending)?;
        }
        Ok(enrollment)
    }

    fn load_pair(
        &self,
        enrollment: &SequenceEnrollment,
    ) -> Result<(Lead, &Sequence), FollowUpError> {
        let lead = self.store.get_lead(&enrollment.lead_id)?.ok_or_else(|| {
            FollowUpError::Inconsistent(enrollment.id.clone(), "lead row is missing".to_string())
        })?;
        let sequence = self
            .catalog
            .get(&enrollment.sequence_id)
            .ok_or_else(|| FollowUpError::SequenceUnknown(enrollment.sequence_id.clone()))?;
        Ok((lead, sequence))
    }

    fn zone_for(&self, lead: &Lead) -> Tz {
        clock::resolve_zone(lead.timezone.as_deref(), &self.default_timezone)
    }

    fn scheduled_due(
        &self,
        lead: &Lead,
        step: &SequenceStep,
        completed_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.window
            .align(self.zone_for(lead), completed_at + step.delay)
    }

    fn priority_for(&self, lead_id: &LeadId) -> Result<Priority, FollowUpError> {
        let composite = self
            .store
            .get_scores(lead_id)?
            .map(|scores| scores.composite);
        Ok(Priority::from_composite(composite))
    }

    fn with_retry<T>(
        &self,
        mut op: impl FnMut() -> Result<T, FollowUpError>,
    ) -> Result<T, FollowUpError> {
        let mut last = String::new();
        for _ in 0..MAX_WRITE_ATTEMPTS {
            match op() {
                Err(FollowUpError::Store(StoreError::Conflict(detail))) => last = detail,
                other => return other,
            }
        }
        Err(FollowUpError::Contention {
            attempts: MAX_WRITE_ATTEMPTS,
            last,
        })
    }
}
