mod config;
mod icp;
mod rules;
mod verification;

pub use config::{
    CompositeWeights, IcpRuleTable, KeywordRule, ScoringConfig, SizeBand, VerificationDeltas,
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::workflows::leads::domain::Lead;
use crate::workflows::leads::events::{EventPayload, EventType, LeadEvent, VerificationReport};

/// Persisted outcome of one scoring pass over a lead's event window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub predictive: u8,
    pub intent: u8,
    pub icp_fit: u8,
    pub verification: u8,
    pub composite: u8,
    pub computed_at: DateTime<Utc>,
    #[serde(default)]
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ScoreSet {
    /// Ranking order for work queues: higher composite first, ties broken by
    /// the more recently active lead.
    pub fn compare_for_priority(&self, other: &ScoreSet) -> Ordering {
        other
            .composite
            .cmp(&self.composite)
            .then_with(|| other.last_event_at.cmp(&self.last_event_at))
    }
}

/// Deterministic scoring pass. Pure: identical inputs produce identical
/// output, so recomputing over the same event prefix is idempotent.
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, lead: &Lead, events: &[LeadEvent], as_of: DateTime<Utc>) -> ScoreSet {
        let window_start = as_of - Duration::days(i64::from(self.config.window_days));
        let window: Vec<LeadEvent> = events
            .iter()
            .filter(|event| event.occurred_at > window_start && event.occurred_at <= as_of)
            .cloned()
            .collect();

        let predictive = rules::predictive(lead, &window, as_of);
        let intent = rules::intent(&window, as_of);
        let icp_fit = icp::icp_fit(lead.enrichment.as_ref(), &self.config.icp);
        let verification =
            verification::verification(latest_report(&window).as_ref(), &self.config.verification);

        let weights = &self.config.weights;
        let composite = rules::clamp_score(
            weights.predictive * f64::from(predictive)
                + weights.intent * f64::from(intent)
                + weights.icp_fit * f64::from(icp_fit)
                + weights.verification * f64::from(verification),
        );

        ScoreSet {
            predictive,
            intent,
            icp_fit,
            verification,
            composite,
            computed_at: as_of,
            last_event_at: window.iter().map(|event| event.occurred_at).max(),
        }
    }
}

fn latest_report(window: &[LeadEvent]) -> Option<VerificationReport> {
    window
        .iter()
        .filter(|event| event.event_type == EventType::VerificationResult)
        .max_by_key(|event| (event.occurred_at, event.id))
        .and_then(|event| match &event.payload {
            EventPayload::VerificationResult { report } => Some(report.clone()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::workflows::leads::domain::{
        ContactChannels, LeadCounters, LeadId, LifecycleState, UserId, Vertical,
    };
    use crate::workflows::leads::events::{Direction, EventDraft};

    fn fixed(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn lead(lifecycle: LifecycleState) -> Lead {
        Lead {
            id: LeadId(Uuid::from_u128(7)),
            owner: UserId(Uuid::from_u128(1)),
            display_name: "Jonas Probe".to_string(),
            channels: ContactChannels::default(),
            lifecycle,
            vertical: Vertical::NetworkMarketing,
            timezone: Some("Europe/Vienna".to_string()),
            last_contact_at: None,
            counters: LeadCounters::default(),
            enrichment: None,
            disc: None,
            hot: false,
            opted_out: false,
            created_at: fixed(2024, 10, 1, 8),
        }
    }

    fn event(id: u64, draft: EventDraft) -> LeadEvent {
        LeadEvent {
            id,
            lead_id: draft.lead_id,
            event_type: draft.event_type,
            direction: draft.direction,
            channel: draft.channel,
            occurred_at: draft.occurred_at,
            payload: draft.payload,
        }
    }

    /// Three outbound, one inbound three days ago, one link click, engaged:
    /// P = 20 + 24 + 12 + 15 + 5 = 76.
    #[test]
    fn predictive_matches_hand_computed_example() {
        let as_of = fixed(2024, 12, 10, 12);
        let lead = lead(LifecycleState::Engaged);
        let mut events = Vec::new();
        for (idx, day) in [1u32, 3, 5].iter().enumerate() {
            events.push(event(
                idx as u64 + 1,
                EventDraft::message_sent(
                    lead.id.clone(),
                    crate::workflows::leads::domain::Channel::Whatsapp,
                    fixed(2024, 12, *day, 9),
                ),
            ));
        }
        events.push(event(
            4,
            EventDraft::message_received(
                lead.id.clone(),
                crate::workflows::leads::domain::Channel::Whatsapp,
                fixed(2024, 12, 7, 12),
            ),
        ));
        events.push(LeadEvent {
            id: 5,
            lead_id: lead.id.clone(),
            event_type: EventType::LinkClick,
            direction: Some(Direction::Inbound),
            channel: None,
            occurred_at: fixed(2024, 12, 6, 15),
            payload: EventPayload::LinkClick {
                url: "https://example.com/deck".to_string(),
            },
        });

        let engine = ScoringEngine::new(ScoringConfig::default());
        let scores = engine.score(&lead, &events, as_of);
        assert_eq!(scores.predictive, 76);
        assert_eq!(scores.icp_fit, 40, "no enrichment -> neutral prior");
        assert_eq!(scores.verification, 50, "no report -> baseline");

        let expected = (0.45 * 76.0
            + 0.25 * f64::from(scores.intent)
            + 0.20 * 40.0
            + 0.10 * 50.0)
            .round() as u8;
        assert_eq!(scores.composite, expected);
    }

    #[test]
    fn won_and_lost_short_circuit() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let as_of = fixed(2024, 12, 10, 12);
        let won = engine.score(&lead(LifecycleState::Won), &[], as_of);
        assert_eq!(won.predictive, 100);
        let lost = engine.score(&lead(LifecycleState::Lost), &[], as_of);
        assert_eq!(lost.predictive, 0);
    }

    #[test]
    fn recompute_over_same_prefix_is_identical() {
        let as_of = fixed(2024, 12, 10, 12);
        let lead = lead(LifecycleState::Engaged);
        let events = vec![event(
            1,
            EventDraft::message_received(
                lead.id.clone(),
                crate::workflows::leads::domain::Channel::Email,
                fixed(2024, 12, 8, 10),
            ),
        )];
        let engine = ScoringEngine::new(ScoringConfig::default());
        let first = engine.score(&lead, &events, as_of);
        let second = engine.score(&lead, &events, as_of);
        assert_eq!(first, second);
    }

    #[test]
    fn idle_leads_decay_but_not_below_zero() {
        let as_of = fixed(2025, 3, 1, 12);
        let lead = lead(LifecycleState::New);
        // Single outbound 50 days before as_of: 20 + 8 - 30 (capped) = -2 -> 0.
        let events = vec![event(
            1,
            EventDraft::message_sent(
                lead.id.clone(),
                crate::workflows::leads::domain::Channel::Email,
                fixed(2025, 1, 10, 9),
            ),
        )];
        let engine = ScoringEngine::new(ScoringConfig::default());
        let scores = engine.score(&lead, &events, as_of);
        assert_eq!(scores.predictive, 0);
    }

    #[test]
    fn priority_ranking_prefers_recent_activity_on_ties() {
        let newer = ScoreSet {
            predictive: 70,
            intent: 60,
            icp_fit: 40,
            verification: 50,
            composite: 61,
            computed_at: fixed(2024, 12, 10, 12),
            last_event_at: Some(fixed(2024, 12, 9, 12)),
        };
        let older = ScoreSet {
            last_event_at: Some(fixed(2024, 12, 1, 12)),
            ..newer.clone()
        };
        assert_eq!(newer.compare_for_priority(&older), Ordering::Less);
    }
}
