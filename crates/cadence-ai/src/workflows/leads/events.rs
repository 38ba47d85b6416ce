use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Channel, EnrichmentSnapshot, LeadId};

/// Closed set of event kinds the engines react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MessageSent,
    MessageReceived,
    LinkClick,
    FormSubmit,
    MeetingBooked,
    EnrichmentUpdated,
    VerificationResult,
    OptOut,
}

impl EventType {
    /// Events that count as engagement for intent scoring.
    pub const fn is_engagement(self) -> bool {
        matches!(
            self,
            Self::MessageSent
                | Self::MessageReceived
                | Self::LinkClick
                | Self::FormSubmit
                | Self::MeetingBooked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Structured verification signals attached to a `verification_result` event.
/// Absent fields are neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    #[serde(default)]
    pub email_syntax_valid: Option<bool>,
    #[serde(default)]
    pub email_domain_resolves: Option<bool>,
    #[serde(default)]
    pub smtp_reachable: Option<bool>,
    #[serde(default)]
    pub disposable_domain: Option<bool>,
    #[serde(default)]
    pub phone_format_valid: Option<bool>,
    #[serde(default)]
    pub social_profile_found: Option<bool>,
    /// 0.0 (human) ..= 1.0 (certain bot).
    #[serde(default)]
    pub bot_likelihood: Option<f32>,
}

/// Event payload variants; free-form webhook dictionaries never reach the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    #[default]
    Empty,
    Message {
        #[serde(default)]
        snippet: Option<String>,
    },
    LinkClick {
        url: String,
    },
    FormSubmit {
        form: String,
    },
    MeetingBooked {
        starts_at: DateTime<Utc>,
    },
    EnrichmentUpdated {
        snapshot: EnrichmentSnapshot,
    },
    VerificationResult {
        report: VerificationReport,
    },
    OptOut {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Immutable, append-only activity record. `occurred_at` is UTC; ordering
/// ties are broken by the store-assigned monotonic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEvent {
    pub id: u64,
    pub lead_id: LeadId,
    pub event_type: EventType,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub channel: Option<Channel>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: EventPayload,
}

/// Event as submitted by the host; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub lead_id: LeadId,
    pub event_type: EventType,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub channel: Option<Channel>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: EventPayload,
}

impl EventDraft {
    pub fn message_sent(lead_id: LeadId, channel: Channel, occurred_at: DateTime<Utc>) -> Self {
        Self {
            lead_id,
            event_type: EventType::MessageSent,
            direction: Some(Direction::Outbound),
            channel: Some(channel),
            occurred_at,
            payload: EventPayload::Message { snippet: None },
        }
    }

    pub fn message_received(lead_id: LeadId, channel: Channel, occurred_at: DateTime<Utc>) -> Self {
        Self {
            lead_id,
            event_type: EventType::MessageReceived,
            direction: Some(Direction::Inbound),
            channel: Some(channel),
            occurred_at,
            payload: EventPayload::Message { snippet: None },
        }
    }

    pub fn opt_out(lead_id: LeadId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            lead_id,
            event_type: EventType::OptOut,
            direction: Some(Direction::Inbound),
            channel: None,
            occurred_at,
            payload: EventPayload::OptOut { reason: None },
        }
    }
}
