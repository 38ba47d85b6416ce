use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub Uuid);

impl LeadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outreach channel a lead can be contacted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Instagram,
    Whatsapp,
    Email,
    Phone,
}

impl Channel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Instagram => "Instagram",
            Self::Whatsapp => "WhatsApp",
            Self::Email => "Email",
            Self::Phone => "Phone",
        }
    }
}

/// Contact handles captured for a lead. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactChannels {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
}

impl ContactChannels {
    pub fn has(&self, channel: Channel) -> bool {
        let value = match channel {
            Channel::Email => &self.email,
            Channel::Phone => &self.phone,
            Channel::Whatsapp => &self.whatsapp,
            Channel::Instagram => &self.instagram,
        };
        value.as_deref().is_some_and(|handle| !handle.trim().is_empty())
    }

    /// First populated channel out of `preference`, in order.
    pub fn first_of(&self, preference: &[Channel]) -> Option<Channel> {
        preference.iter().copied().find(|channel| self.has(*channel))
    }

    /// Default acquisition order used when a step preference matches nothing.
    pub fn preferred(&self) -> Option<Channel> {
        self.first_of(&[
            Channel::Instagram,
            Channel::Whatsapp,
            Channel::Email,
            Channel::Phone,
        ])
    }
}

/// Sales vertical the lead belongs to; drives sequence selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    NetworkMarketing,
    RealEstate,
    Finance,
    Coaching,
}

impl Vertical {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NetworkMarketing => "Network Marketing",
            Self::RealEstate => "Real Estate",
            Self::Finance => "Finance",
            Self::Coaching => "Coaching",
        }
    }
}

/// Lead lifecycle. Transitions are restricted; see `LifecycleState::can_transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    New,
    Engaged,
    Opportunity,
    Won,
    Lost,
    Churned,
    Dormant,
}

impl LifecycleState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Engaged => "Engaged",
            Self::Opportunity => "Opportunity",
            Self::Won => "Won",
            Self::Lost => "Lost",
            Self::Churned => "Churned",
            Self::Dormant => "Dormant",
        }
    }

    /// Terminal states cancel every active sequence enrollment.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Churned)
    }

    pub fn can_transition(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (New, Engaged)
                | (Engaged, Opportunity)
                | (Opportunity, Won)
                | (Opportunity, Lost)
                | (Won, Churned)
                | (New, Dormant)
                | (Engaged, Dormant)
                | (Opportunity, Dormant)
                | (Dormant, Engaged)
        )
    }

    /// The closest legal move from this state, surfaced in error details.
    pub fn suggested_next(self) -> Option<LifecycleState> {
        use LifecycleState::*;
        match self {
            New => Some(Engaged),
            Engaged => Some(Opportunity),
            Opportunity => Some(Won),
            Won => Some(Churned),
            Dormant => Some(Engaged),
            Lost | Churned => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot move lead from {from} to {to}{hint}", from = .from.label(), to = .to.label(), hint = hint_suffix(.hint))]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
        hint: Option<LifecycleState>,
    },
}

fn hint_suffix(hint: &Option<LifecycleState>) -> String {
    match hint {
        Some(state) => format!(" (closest legal move: {})", state.label()),
        None => String::new(),
    }
}

/// DISC behavioral profile, when a coaching assessment supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscProfile {
    Dominance,
    Influence,
    Steadiness,
    Conscientiousness,
}

/// Firmographic snapshot delivered by the enrichment provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSnapshot {
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<u32>,
    #[serde(default)]
    pub role_title: Option<String>,
    #[serde(default)]
    pub tech_keywords: Vec<String>,
    #[serde(default)]
    pub competitor_keywords: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Aggregate counters maintained on every recorded event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadCounters {
    pub outbound_messages: u32,
    pub inbound_messages: u32,
    pub meetings_booked: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub owner: UserId,
    pub display_name: String,
    pub channels: ContactChannels,
    pub lifecycle: LifecycleState,
    pub vertical: Vertical,
    /// IANA zone; `None` falls back to the configured regional default.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub last_contact_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub counters: LeadCounters,
    #[serde(default)]
    pub enrichment: Option<EnrichmentSnapshot>,
    #[serde(default)]
    pub disc: Option<DiscProfile>,
    #[serde(default)]
    pub hot: bool,
    #[serde(default)]
    pub opted_out: bool,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn transition(&mut self, to: LifecycleState) -> Result<(), LifecycleError> {
        if !self.lifecycle.can_transition(to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.lifecycle,
                to,
                hint: self.lifecycle.suggested_next(),
            });
        }
        self.lifecycle = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_in(state: LifecycleState) -> Lead {
        Lead {
            id: LeadId::new(),
            owner: UserId::new(),
            display_name: "Maria Example".to_string(),
            channels: ContactChannels::default(),
            lifecycle: state,
            vertical: Vertical::NetworkMarketing,
            timezone: None,
            last_contact_at: None,
            counters: LeadCounters::default(),
            enrichment: None,
            disc: None,
            hot: false,
            opted_out: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn happy_path_transitions_are_allowed() {
        let mut lead = lead_in(LifecycleState::New);
        lead.transition(LifecycleState::Engaged).expect("engage");
        lead.transition(LifecycleState::Opportunity)
            .expect("opportunity");
        lead.transition(LifecycleState::Won).expect("win");
        lead.transition(LifecycleState::Churned).expect("churn");
    }

    #[test]
    fn skipping_stages_is_rejected_with_hint() {
        let mut lead = lead_in(LifecycleState::New);
        let err = lead
            .transition(LifecycleState::Won)
            .expect_err("new cannot win directly");
        let message = err.to_string();
        assert!(message.contains("New"));
        assert!(message.contains("Engaged"), "hint names the legal move");
        assert_eq!(lead.lifecycle, LifecycleState::New);
    }

    #[test]
    fn dormant_is_reversible_to_engaged_only() {
        let mut lead = lead_in(LifecycleState::Dormant);
        assert!(lead.transition(LifecycleState::Opportunity).is_err());
        lead.transition(LifecycleState::Engaged).expect("revive");
    }

    #[test]
    fn channel_preference_respects_population() {
        let channels = ContactChannels {
            email: Some("maria@example.com".to_string()),
            phone: None,
            whatsapp: Some(" ".to_string()),
            instagram: None,
        };
        assert_eq!(
            channels.first_of(&[Channel::Whatsapp, Channel::Email]),
            Some(Channel::Email)
        );
        assert_eq!(channels.preferred(), Some(Channel::Email));
    }
}
