use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::generator::sanitize_skeleton;
use crate::workflows::followup::domain::{Priority, Suggestion, SuggestionId};
use crate::workflows::leads::domain::{Channel, Lead, LifecycleState};
use crate::workflows::leads::events::{Direction, LeadEvent};
use crate::workflows::scoring::ScoreSet;

const RECENT_CONTACT_DAYS: i64 = 7;
const HOT_COMPOSITE_CUTOFF: u8 = 85;

/// Closed set of situations the resolver can land on, checked in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NbaCase {
    Closed,
    HotLead,
    ResponseReceived,
    FollowupDue,
    Waiting,
    GoneCold,
    Qualified,
    NewLead,
}

impl NbaCase {
    pub const fn action_label(self) -> &'static str {
        match self {
            Self::Closed => "No action - lead is closed",
            Self::HotLead => "Call now",
            Self::ResponseReceived => "Reply to their message",
            Self::FollowupDue => "Work the due follow-up",
            Self::Waiting => "Wait for a reply",
            Self::GoneCold => "Send a reactivation message",
            Self::Qualified => "Push the opportunity forward",
            Self::NewLead => "Make the first touch",
        }
    }
}

/// Exactly one recommended action for a lead at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextBestAction {
    pub case: NbaCase,
    pub priority: Option<Priority>,
    pub action_label: &'static str,
    pub reason: String,
    pub suggested_channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_id: Option<SuggestionId>,
    pub message_skeleton: String,
}

/// Map lead state, the last persisted score, the most recent event, and the
/// due suggestion (if any) onto one action. First matching case wins; the
/// resolver never recomputes scores.
pub fn resolve(
    lead: &Lead,
    scores: Option<&ScoreSet>,
    last_event: Option<&LeadEvent>,
    due_suggestion: Option<&Suggestion>,
    now: DateTime<Utc>,
) -> NextBestAction {
    let first_name = lead
        .display_name
        .split_whitespace()
        .next()
        .unwrap_or("there");
    let composite = scores.map(|set| set.composite);

    if matches!(lead.lifecycle, LifecycleState::Won | LifecycleState::Lost) {
        return build(
            NbaCase::Closed,
            None,
            format!("lead is {}", lead.lifecycle.label()),
            None,
            None,
            String::new(),
        );
    }

    if composite.is_some_and(|score| score >= HOT_COMPOSITE_CUTOFF) || lead.hot {
        return build(
            NbaCase::HotLead,
            Some(Priority::Critical),
            match composite {
                Some(score) if score >= HOT_COMPOSITE_CUTOFF => {
                    format!("composite score {score} is in the critical tier")
                }
                _ => "lead is tagged hot".to_string(),
            },
            Some(Channel::Phone),
            None,
            format!("{first_name}, do you have two minutes for a quick call today?"),
        );
    }

    if let Some(event) = last_event {
        if event.direction == Some(Direction::Inbound) {
            return build(
                NbaCase::ResponseReceived,
                Some(Priority::High),
                "the most recent event is an inbound message".to_string(),
                event.channel.or_else(|| lead.channels.preferred()),
                None,
                format!("Thanks for getting back to me, {first_name} - here is what I'd suggest next."),
            );
        }
    }

    if let Some(suggestion) = due_suggestion {
        if suggestion.due_at <= now {
            return build(
                NbaCase::FollowupDue,
                Some(suggestion.priority),
                suggestion.meta.reason.clone(),
                Some(suggestion.channel),
                Some(suggestion.id.clone()),
                format!("{first_name}, following up as promised - is this still on your radar?"),
            );
        }
    }

    if let Some(event) = last_event {
        if event.direction == Some(Direction::Outbound)
            && now - event.occurred_at <= Duration::days(RECENT_CONTACT_DAYS)
        {
            return build(
                NbaCase::Waiting,
                Some(Priority::Low),
                "an outbound message went out within the last seven days".to_string(),
                None,
                None,
                String::new(),
            );
        }
    }

    if let Some(last_contact) = lead.last_contact_at {
        if now - last_contact > Duration::days(RECENT_CONTACT_DAYS) {
            return build(
                NbaCase::GoneCold,
                Some(Priority::Med),
                format!(
                    "no contact for {} days",
                    (now - last_contact).num_days()
                ),
                lead.channels.preferred(),
                None,
                format!("Hi {first_name}, it has been a while - still interested in what we discussed?"),
            );
        }
    }

    if lead.lifecycle == LifecycleState::Opportunity {
        return build(
            NbaCase::Qualified,
            Some(Priority::High),
            "lead is a qualified opportunity".to_string(),
            Some(Channel::Phone),
            None,
            format!("{first_name}, shall we settle the open questions in a short call?"),
        );
    }

    build(
        NbaCase::NewLead,
        Some(Priority::from_composite(composite)),
        "no touch recorded yet".to_string(),
        lead.channels
            .first_of(&[Channel::Instagram, Channel::Whatsapp, Channel::Email]),
        None,
        format!("Hi {first_name}, great to connect - open to a quick exchange?"),
    )
}

fn build(
    case: NbaCase,
    priority: Option<Priority>,
    reason: String,
    suggested_channel: Option<Channel>,
    followup_id: Option<SuggestionId>,
    skeleton: String,
) -> NextBestAction {
    NextBestAction {
        case,
        priority,
        action_label: case.action_label(),
        reason,
        suggested_channel,
        followup_id,
        message_skeleton: sanitize_skeleton(&skeleton),
    }
}
