use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{LeadStore, StoreError};
use crate::workflows::followup::domain::{
    EnrollmentId, SequenceEnrollment, SequenceId, Suggestion, SuggestionId, SuggestionStatus,
};
use crate::workflows::goals::domain::{DailyFlowTargets, Goal};
use crate::workflows::leads::domain::{Lead, LeadId, UserId};
use crate::workflows::leads::events::{EventDraft, EventType, LeadEvent};
use crate::workflows::plans::CompanyId;
use crate::workflows::scoring::ScoreSet;

#[derive(Default)]
struct Inner {
    leads: HashMap<LeadId, Lead>,
    events: Vec<LeadEvent>,
    next_event_id: u64,
    enrollments: HashMap<EnrollmentId, SequenceEnrollment>,
    suggestions: HashMap<SuggestionId, Suggestion>,
    scores: HashMap<LeadId, ScoreSet>,
    goals: HashMap<(UserId, CompanyId), Goal>,
    daily_flow_targets: HashMap<UserId, DailyFlowTargets>,
}

/// Reference adapter backing the API service, the demo command, and the
/// test suites. A relational adapter substitutes row locks for the mutex.
#[derive(Default)]
pub struct InMemoryLeadStore {
    inner: Mutex<Inner>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl LeadStore for InMemoryLeadStore {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut guard = self.lock()?;
        if guard.leads.contains_key(&lead.id) {
            return Err(StoreError::Conflict(format!("lead {} exists", lead.id)));
        }
        guard.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn get_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.lock()?.leads.get(id).cloned())
    }

    fn update_lead(&self, lead: Lead) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if !guard.leads.contains_key(&lead.id) {
            return Err(StoreError::NotFound);
        }
        guard.leads.insert(lead.id.clone(), lead);
        Ok(())
    }

    fn append_event(&self, draft: EventDraft) -> Result<LeadEvent, StoreError> {
        let mut guard = self.lock()?;
        if !guard.leads.contains_key(&draft.lead_id) {
            return Err(StoreError::NotFound);
        }
        guard.next_event_id += 1;
        let event = LeadEvent {
            id: guard.next_event_id,
            lead_id: draft.lead_id,
            event_type: draft.event_type,
            direction: draft.direction,
            channel: draft.channel,
            occurred_at: draft.occurred_at,
            payload: draft.payload,
        };
        guard.events.push(event.clone());
        Ok(event)
    }

    fn list_events(
        &self,
        lead_id: &LeadId,
        since: Option<DateTime<Utc>>,
        types: Option<&[EventType]>,
    ) -> Result<Vec<LeadEvent>, StoreError> {
        let guard = self.lock()?;
        let mut events: Vec<LeadEvent> = guard
            .events
            .iter()
            .filter(|event| &event.lead_id == lead_id)
            .filter(|event| since.map_or(true, |cutoff| event.occurred_at >= cutoff))
            .filter(|event| {
                types.map_or(true, |wanted| wanted.contains(&event.event_type))
            })
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    fn get_enrollment(&self, id: &EnrollmentId) -> Result<Option<SequenceEnrollment>, StoreError> {
        Ok(self.lock()?.enrollments.get(id).cloned())
    }

    fn find_enrollment(
        &self,
        lead_id: &LeadId,
        sequence_id: &SequenceId,
    ) -> Result<Option<SequenceEnrollment>, StoreError> {
        Ok(self
            .lock()?
            .enrollments
            .get(&EnrollmentId::for_pair(lead_id, sequence_id))
            .cloned())
    }

    fn enrollments_for_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<SequenceEnrollment>, StoreError> {
        let guard = self.lock()?;
        let mut enrollments: Vec<SequenceEnrollment> = guard
            .enrollments
            .values()
            .filter(|enrollment| &enrollment.lead_id == lead_id)
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(enrollments)
    }

    fn upsert_enrollment(
        &self,
        enrollment: SequenceEnrollment,
    ) -> Result<SequenceEnrollment, StoreError> {
        let mut guard = self.lock()?;
        let stored_version = guard
            .enrollments
            .get(&enrollment.id)
            .map(|existing| existing.version)
            .unwrap_or(0);
        if enrollment.version != stored_version {
            return Err(StoreError::Conflict(format!(
                "enrollment {} at version {}, write carried {}",
                enrollment.id, stored_version, enrollment.version
            )));
        }
        let mut accepted = enrollment;
        accepted.version += 1;
        guard
            .enrollments
            .insert(accepted.id.clone(), accepted.clone());
        Ok(accepted)
    }

    fn get_suggestion(&self, id: &SuggestionId) -> Result<Option<Suggestion>, StoreError> {
        Ok(self.lock()?.suggestions.get(id).cloned())
    }

    fn pending_suggestion(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Option<Suggestion>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .suggestions
            .values()
            .find(|suggestion| {
                &suggestion.enrollment_id == enrollment_id
                    && suggestion.status == SuggestionStatus::Pending
            })
            .cloned())
    }

    fn upsert_suggestion(&self, suggestion: Suggestion) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.suggestions.insert(suggestion.id.clone(), suggestion);
        Ok(())
    }

    fn list_due_suggestions(
        &self,
        owner: &UserId,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Suggestion>, StoreError> {
        let guard = self.lock()?;
        let mut due: Vec<Suggestion> = guard
            .suggestions
            .values()
            .filter(|suggestion| {
                &suggestion.owner == owner
                    && suggestion.status == SuggestionStatus::Pending
                    && suggestion.due_at <= before
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.due_at.cmp(&b.due_at))
                .then_with(|| a.lead_id.0.cmp(&b.lead_id.0))
        });
        due.truncate(limit);
        Ok(due)
    }

    fn put_scores(&self, lead_id: &LeadId, scores: ScoreSet) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if !guard.leads.contains_key(lead_id) {
            return Err(StoreError::NotFound);
        }
        guard.scores.insert(lead_id.clone(), scores);
        Ok(())
    }

    fn get_scores(&self, lead_id: &LeadId) -> Result<Option<ScoreSet>, StoreError> {
        Ok(self.lock()?.scores.get(lead_id).cloned())
    }

    fn leads_with_events_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LeadId>, StoreError> {
        let guard = self.lock()?;
        let mut seen = Vec::new();
        for event in guard.events.iter().rev() {
            if event.occurred_at < since {
                continue;
            }
            if !seen.contains(&event.lead_id) {
                seen.push(event.lead_id.clone());
                if seen.len() >= limit {
                    break;
                }
            }
        }
        Ok(seen)
    }

    fn leads_idle_since(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LeadId>, StoreError> {
        let guard = self.lock()?;
        let mut idle: Vec<(&Lead, DateTime<Utc>)> = guard
            .leads
            .values()
            .filter(|lead| {
                !lead.lifecycle.is_terminal()
                    && lead.lifecycle != crate::workflows::leads::domain::LifecycleState::Dormant
            })
            .map(|lead| (lead, lead.last_contact_at.unwrap_or(lead.created_at)))
            .filter(|(_, reference)| *reference < cutoff)
            .collect();
        idle.sort_by_key(|(_, reference)| *reference);
        Ok(idle
            .into_iter()
            .take(limit)
            .map(|(lead, _)| lead.id.clone())
            .collect())
    }

    fn put_goal(&self, goal: Goal) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard
            .goals
            .insert((goal.user_id.clone(), goal.company_id.clone()), goal);
        Ok(())
    }

    fn get_goal(
        &self,
        user_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Goal>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .goals
            .get(&(user_id.clone(), company_id.clone()))
            .cloned())
    }

    fn put_daily_flow_targets(
        &self,
        user_id: &UserId,
        targets: DailyFlowTargets,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.daily_flow_targets.insert(user_id.clone(), targets);
        Ok(())
    }

    fn get_daily_flow_targets(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DailyFlowTargets>, StoreError> {
        Ok(self.lock()?.daily_flow_targets.get(user_id).cloned())
    }

    fn owners_with_pending_suggestions(&self, limit: usize) -> Result<Vec<UserId>, StoreError> {
        let guard = self.lock()?;
        let mut owners = Vec::new();
        for suggestion in guard.suggestions.values() {
            if suggestion.status != SuggestionStatus::Pending {
                continue;
            }
            if !owners.contains(&suggestion.owner) {
                owners.push(suggestion.owner.clone());
                if owners.len() >= limit {
                    break;
                }
            }
        }
        Ok(owners)
    }
}
