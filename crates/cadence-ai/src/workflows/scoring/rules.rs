use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::workflows::leads::domain::{Lead, LifecycleState};
use crate::workflows::leads::events::{EventType, LeadEvent};

const PREDICTIVE_BASE: f64 = 20.0;
const OUTBOUND_POINTS: f64 = 8.0;
const OUTBOUND_CAP: f64 = 24.0;
const INBOUND_POINTS: f64 = 12.0;
const INBOUND_CAP: f64 = 36.0;
const LINK_CLICK_BONUS: f64 = 15.0;
const FORM_SUBMIT_BONUS: f64 = 20.0;
const IDLE_GRACE_DAYS: i64 = 7;
const IDLE_PENALTY_CAP: f64 = 30.0;
const ENGAGED_BONUS: f64 = 5.0;
const OPPORTUNITY_BONUS: f64 = 15.0;

const RECENCY_HALFLIFE_DAYS: f64 = 14.0;
const FREQUENCY_POINTS_PER_DAY: f64 = 10.0;
const FREQUENCY_CAP: f64 = 40.0;

/// Predictive component: weighted activity sum with stage bonus and idle decay.
pub(crate) fn predictive(lead: &Lead, window: &[LeadEvent], as_of: DateTime<Utc>) -> u8 {
    match lead.lifecycle {
        LifecycleState::Won => return 100,
        LifecycleState::Lost | LifecycleState::Churned => return 0,
        _ => {}
    }

    let outbound = window
        .iter()
        .filter(|event| event.event_type == EventType::MessageSent)
        .count() as f64;
    let inbound = window
        .iter()
        .filter(|event| event.event_type == EventType::MessageReceived)
        .count() as f64;
    let any_click = window
        .iter()
        .any(|event| event.event_type == EventType::LinkClick);
    let any_form = window
        .iter()
        .any(|event| event.event_type == EventType::FormSubmit);

    let mut score = PREDICTIVE_BASE;
    score += (outbound * OUTBOUND_POINTS).min(OUTBOUND_CAP);
    score += (inbound * INBOUND_POINTS).min(INBOUND_CAP);
    if any_click {
        score += LINK_CLICK_BONUS;
    }
    if any_form {
        score += FORM_SUBMIT_BONUS;
    }

    let reference = window
        .iter()
        .map(|event| event.occurred_at)
        .max()
        .unwrap_or(lead.created_at);
    let idle_days = (as_of - reference).num_days();
    if idle_days > IDLE_GRACE_DAYS {
        score -= ((idle_days - IDLE_GRACE_DAYS) as f64).min(IDLE_PENALTY_CAP);
    }

    score += match lead.lifecycle {
        LifecycleState::Engaged => ENGAGED_BONUS,
        LifecycleState::Opportunity => OPPORTUNITY_BONUS,
        _ => 0.0,
    };

    clamp_score(score)
}

/// Intent component: RFM-style recency, frequency, and depth of engagement.
pub(crate) fn intent(window: &[LeadEvent], as_of: DateTime<Utc>) -> u8 {
    let engagement: Vec<&LeadEvent> = window
        .iter()
        .filter(|event| event.event_type.is_engagement())
        .collect();

    let recency = match engagement.iter().map(|event| event.occurred_at).max() {
        Some(latest) => {
            let delta_days = (as_of - latest).num_seconds().max(0) as f64 / 86_400.0;
            100.0 * (-delta_days / RECENCY_HALFLIFE_DAYS).exp()
        }
        None => 0.0,
    };

    let distinct_days: BTreeSet<_> = engagement
        .iter()
        .map(|event| event.occurred_at.date_naive())
        .collect();
    let frequency = (FREQUENCY_POINTS_PER_DAY * distinct_days.len() as f64).min(FREQUENCY_CAP);

    let has_depth = engagement.iter().any(|event| {
        matches!(
            event.event_type,
            EventType::MeetingBooked | EventType::FormSubmit
        )
    });
    let depth = if has_depth { 100.0 } else { 0.0 };

    clamp_score(0.5 * recency + 0.3 * frequency + 0.2 * depth)
}

pub(crate) fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
