use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::workflows::leads::domain::{Channel, LeadId, LifecycleState, UserId, Vertical};
use crate::workflows::leads::events::EventType;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub String);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One enrollment row exists per (lead, sequence); the id is derived so the
/// pair can be addressed without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

impl EnrollmentId {
    pub fn for_pair(lead_id: &LeadId, sequence_id: &SequenceId) -> Self {
        Self(format!("enr-{}-{}", lead_id.0, sequence_id.0))
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Suggestion ids are derived from (enrollment, generation, step) so a
/// retried emit reproduces the same id instead of a duplicate row, while a
/// re-enrollment starts a fresh id space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(pub String);

impl SuggestionId {
    pub fn for_step(enrollment_id: &EnrollmentId, generation: u32, step: u32) -> Self {
        Self(format!("sug-{}-g{}-step{}", enrollment_id.0, generation, step))
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    SendMessage,
    Wait,
    Task,
    CallAttempt,
    End,
}

impl StepAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SendMessage => "Send Message",
            Self::Wait => "Wait",
            Self::Task => "Task",
            Self::CallAttempt => "Call Attempt",
            Self::End => "End",
        }
    }
}

/// One step in a cadence. `delay` counts from completion of the prior step;
/// the engine aligns the result into the lead's local contact window.
#[derive(Debug, Clone)]
pub struct SequenceStep {
    pub order: u32,
    pub action: StepAction,
    pub channel_preference: Vec<Channel>,
    pub delay: Duration,
    pub template_key: &'static str,
    pub cancel_on: Vec<EventType>,
    pub advance_on: Vec<EventType>,
}

/// A named cadence, selected by the lead's lifecycle state and vertical.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub id: SequenceId,
    pub name: &'static str,
    pub entry_state: LifecycleState,
    /// `None` means the sequence applies to every vertical.
    pub vertical: Option<Vertical>,
    pub steps: Vec<SequenceStep>,
}

impl Sequence {
    pub fn step(&self, order: u32) -> Option<&SequenceStep> {
        self.steps.get(order as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

/// A lead's progress through one sequence. `version` backs the store's
/// compare-and-swap contract: concurrent writers lose with `Conflict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEnrollment {
    pub id: EnrollmentId,
    pub lead_id: LeadId,
    pub sequence_id: SequenceId,
    pub current_step: u32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    /// Non-null exactly while the enrollment is active.
    #[serde(default)]
    pub next_due_at: Option<DateTime<Utc>>,
    /// Bumped on re-enrollment so old suggestions never shadow new ones.
    pub generation: u32,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Med,
    High,
    Critical,
}

impl Priority {
    /// Work-queue tier from the last persisted composite score.
    pub fn from_composite(composite: Option<u8>) -> Self {
        match composite {
            Some(score) if score >= 85 => Self::Critical,
            Some(score) if score >= 70 => Self::High,
            Some(score) if score >= 50 => Self::Med,
            Some(_) => Self::Low,
            None => Self::Low,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Med => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Sent,
    Skipped,
    Cancelled,
}

impl SuggestionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Sent => "Sent",
            Self::Skipped => "Skipped",
            Self::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionMeta {
    pub template_key: String,
    pub step_action: StepAction,
    pub reason: String,
}

/// The single externally visible artifact of an active enrollment. Exactly
/// one pending suggestion exists per active enrollment at any moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub lead_id: LeadId,
    pub owner: UserId,
    pub enrollment_id: EnrollmentId,
    pub step: u32,
    pub due_at: DateTime<Utc>,
    pub channel: Channel,
    pub priority: Priority,
    pub meta: SuggestionMeta,
    pub status: SuggestionStatus,
    /// Set while a snooze pushed `due_at` forward; such items stay pending
    /// but are not counted as overdue.
    #[serde(default)]
    pub snoozed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Work-queue item as rendered to clients, with display labels resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionView {
    pub id: SuggestionId,
    pub lead_id: LeadId,
    pub due_at: DateTime<Utc>,
    pub channel: Channel,
    pub channel_label: &'static str,
    pub priority: Priority,
    pub priority_label: &'static str,
    pub template_key: String,
    pub step_action: StepAction,
    pub action_label: &'static str,
    pub reason: String,
    pub snoozed: bool,
}

impl Suggestion {
    pub fn queue_view(&self) -> SuggestionView {
        SuggestionView {
            id: self.id.clone(),
            lead_id: self.lead_id.clone(),
            due_at: self.due_at,
            channel: self.channel,
            channel_label: self.channel.label(),
            priority: self.priority,
            priority_label: self.priority.label(),
            template_key: self.meta.template_key.clone(),
            step_action: self.meta.step_action,
            action_label: self.meta.step_action.label(),
            reason: self.meta.reason.clone(),
            snoozed: self.snoozed_until.is_some(),
        }
    }
}

/// Supported snooze shapes; resolved against the lead's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnoozeOption {
    PlusDays { days: u32 },
    UntilNextMonday18,
    UntilMorning9,
    Until { at: DateTime<Utc> },
}
