use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::storage::LeadStore;
use crate::workflows::followup::domain::{StepAction, SuggestionId};
use crate::workflows::followup::engine::{FollowUpEngine, FollowUpError};
use crate::workflows::leads::domain::UserId;
use crate::workflows::scoring::ScoringEngine;

const MAX_JOB_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 200;

/// Recomputes scores for leads with recent activity. Chunked, pure per lead,
/// and idempotent, so overlapping runs converge on the same rows.
pub struct ScoreMaintenance<S> {
    store: Arc<S>,
    scoring: Arc<ScoringEngine>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

impl<S: LeadStore> ScoreMaintenance<S> {
    pub fn new(
        store: Arc<S>,
        scoring: Arc<ScoringEngine>,
        clock: Arc<dyn Clock>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            scoring,
            clock,
            chunk_size,
        }
    }

    /// One maintenance pass over leads touched since `since`. Returns how
    /// many leads were rescored.
    pub fn run_once(&self, since: DateTime<Utc>) -> Result<usize, crate::storage::StoreError> {
        let now = self.clock.now_utc();
        let lead_ids = self.store.leads_with_events_since(since, self.chunk_size)?;
        let mut rescored = 0;
        for lead_id in lead_ids {
            let Some(lead) = self.store.get_lead(&lead_id)? else {
                continue;
            };
            let events = self.store.list_events(&lead_id, None, None)?;
            let scores = self.scoring.score(&lead, &events, now);
            self.store.put_scores(&lead_id, scores)?;
            rescored += 1;
        }
        if rescored > 0 {
            info!(rescored, "score maintenance pass finished");
        }
        Ok(rescored)
    }
}

/// Drains a user's due queue: elapsed wait steps advance automatically, and
/// items that keep failing are dead-lettered for operator review after
/// `MAX_JOB_ATTEMPTS` tries with exponential backoff and jitter.
pub struct FollowupTick<S> {
    engine: Arc<FollowUpEngine<S>>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
    dead_letter: Mutex<Vec<SuggestionId>>,
}

impl<S: LeadStore> FollowupTick<S> {
    pub fn new(engine: Arc<FollowUpEngine<S>>, clock: Arc<dyn Clock>, chunk_size: usize) -> Self {
        Self {
            engine,
            clock,
            chunk_size,
            dead_letter: Mutex::new(Vec::new()),
        }
    }

    /// Suggestion ids that exhausted their retries. Kept until an operator
    /// inspects them; never retried automatically.
    pub fn dead_letters(&self) -> Vec<SuggestionId> {
        self.dead_letter
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// One pass over a user's due items. Safe to run concurrently with
    /// request handling: every mutation goes through the engine's
    /// compare-and-swap path.
    pub async fn run_once(&self, owner: &UserId) -> Result<TickSummary, FollowUpError> {
        let now = self.clock.now_utc();
        let due = self.engine.due_suggestions(owner, now, self.chunk_size)?;

        let mut summary = TickSummary::default();
        for suggestion in due {
            summary.due_seen += 1;
            if suggestion.meta.step_action != StepAction::Wait {
                continue;
            }
            match self.advance_wait_with_backoff(&suggestion.id).await {
                Ok(()) => summary.waits_advanced += 1,
                Err(err) => {
                    warn!(
                        suggestion = %suggestion.id,
                        error = %err,
                        "wait advancement dead-lettered"
                    );
                    if let Ok(mut guard) = self.dead_letter.lock() {
                        guard.push(suggestion.id.clone());
                    }
                    summary.dead_lettered += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn advance_wait_with_backoff(&self, id: &SuggestionId) -> Result<(), FollowUpError> {
        let mut attempt = 0;
        loop {
            match self.engine.complete_wait(id) {
                Ok(_) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_JOB_ATTEMPTS || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                    let jitter = rand::thread_rng().gen_range(0..=backoff / 2);
                    tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                }
            }
        }
    }
}

fn is_retryable(err: &FollowUpError) -> bool {
    matches!(
        err,
        FollowUpError::Contention { .. }
            | FollowUpError::Store(crate::storage::StoreError::Conflict(_))
            | FollowUpError::Store(crate::storage::StoreError::Unavailable(_))
    )
}

/// Counters from one `FollowupTick::run_once` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub due_seen: usize,
    pub waits_advanced: usize,
    pub dead_lettered: usize,
}
