use std::collections::HashMap;

use chrono::Duration;

use super::domain::{Sequence, SequenceId, SequenceStep, StepAction};
use crate::workflows::leads::domain::{Channel, LifecycleState, Vertical};
use crate::workflows::leads::events::EventType;

/// Compiled library of cadences. Selection prefers a vertical-specific
/// sequence for the lead's lifecycle state and falls back to the generic one.
#[derive(Debug)]
pub struct SequenceCatalog {
    sequences: HashMap<SequenceId, Sequence>,
}

impl SequenceCatalog {
    pub fn standard() -> Self {
        Self::with_sequences(standard_sequences())
    }

    pub fn with_sequences(sequences: Vec<Sequence>) -> Self {
        Self {
            sequences: sequences
                .into_iter()
                .map(|sequence| (sequence.id.clone(), sequence))
                .collect(),
        }
    }

    pub fn get(&self, id: &SequenceId) -> Option<&Sequence> {
        self.sequences.get(id)
    }

    pub fn select(&self, entry_state: LifecycleState, vertical: Vertical) -> Option<&Sequence> {
        self.sequences
            .values()
            .filter(|sequence| sequence.entry_state == entry_state)
            .filter(|sequence| {
                sequence.vertical.is_none() || sequence.vertical == Some(vertical)
            })
            .max_by_key(|sequence| sequence.vertical.is_some())
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }
}

fn step(
    order: u32,
    action: StepAction,
    channels: &[Channel],
    delay: Duration,
    template_key: &'static str,
) -> SequenceStep {
    SequenceStep {
        order,
        action,
        channel_preference: channels.to_vec(),
        delay,
        template_key,
        cancel_on: vec![EventType::OptOut],
        advance_on: vec![EventType::MessageReceived],
    }
}

fn end(order: u32) -> SequenceStep {
    SequenceStep {
        order,
        action: StepAction::End,
        channel_preference: Vec::new(),
        delay: Duration::zero(),
        template_key: "none",
        cancel_on: Vec::new(),
        advance_on: Vec::new(),
    }
}

fn standard_sequences() -> Vec<Sequence> {
    use Channel::*;

    vec![
        Sequence {
            id: SequenceId("new_lead_intro".to_string()),
            name: "New Lead Intro",
            entry_state: LifecycleState::New,
            vertical: None,
            steps: vec![
                step(
                    0,
                    StepAction::SendMessage,
                    &[Instagram, Whatsapp, Email],
                    Duration::zero(),
                    "icebreaker_first_touch",
                ),
                step(1, StepAction::Wait, &[], Duration::hours(48), "none"),
                step(
                    2,
                    StepAction::SendMessage,
                    &[Whatsapp, Instagram, Email],
                    Duration::zero(),
                    "value_followup",
                ),
                step(3, StepAction::Wait, &[], Duration::hours(72), "none"),
                {
                    let mut call = step(
                        4,
                        StepAction::CallAttempt,
                        &[Phone, Whatsapp],
                        Duration::hours(24),
                        "call_breakthrough",
                    );
                    call.advance_on = vec![EventType::MessageReceived, EventType::MeetingBooked];
                    call
                },
                end(5),
            ],
        },
        Sequence {
            id: SequenceId("engaged_nurture".to_string()),
            name: "Engaged Nurture",
            entry_state: LifecycleState::Engaged,
            vertical: None,
            steps: vec![
                {
                    let mut checkin = step(
                        0,
                        StepAction::SendMessage,
                        &[Whatsapp, Email],
                        Duration::zero(),
                        "nurture_checkin",
                    );
                    checkin.cancel_on = vec![EventType::OptOut, EventType::MeetingBooked];
                    checkin
                },
                step(1, StepAction::Wait, &[], Duration::hours(48), "none"),
                {
                    let mut value_drop = step(
                        2,
                        StepAction::SendMessage,
                        &[Whatsapp, Email],
                        Duration::zero(),
                        "nurture_value_drop",
                    );
                    value_drop.cancel_on = vec![EventType::OptOut, EventType::MeetingBooked];
                    value_drop
                },
                end(3),
            ],
        },
        Sequence {
            id: SequenceId("opportunity_close".to_string()),
            name: "Opportunity Close",
            entry_state: LifecycleState::Opportunity,
            vertical: None,
            steps: vec![
                step(
                    0,
                    StepAction::Task,
                    &[],
                    Duration::zero(),
                    "prep_offer_review",
                ),
                step(
                    1,
                    StepAction::SendMessage,
                    &[Whatsapp, Phone],
                    Duration::hours(24),
                    "objection_check",
                ),
                {
                    let mut closing = step(
                        2,
                        StepAction::CallAttempt,
                        &[Phone],
                        Duration::hours(48),
                        "closing_call",
                    );
                    closing.advance_on = vec![EventType::MeetingBooked];
                    closing
                },
                end(3),
            ],
        },
        Sequence {
            id: SequenceId("dormant_reactivation".to_string()),
            name: "Dormant Reactivation",
            entry_state: LifecycleState::Dormant,
            vertical: None,
            steps: vec![
                step(
                    0,
                    StepAction::SendMessage,
                    &[Whatsapp, Instagram, Email],
                    Duration::zero(),
                    "reactivation_ping",
                ),
                step(1, StepAction::Wait, &[], Duration::hours(120), "none"),
                step(
                    2,
                    StepAction::SendMessage,
                    &[Whatsapp, Instagram, Email],
                    Duration::zero(),
                    "reactivation_last_call",
                ),
                end(3),
            ],
        },
        Sequence {
            id: SequenceId("re_new_lead_viewing".to_string()),
            name: "New Lead Viewing Invite",
            entry_state: LifecycleState::New,
            vertical: Some(Vertical::RealEstate),
            steps: vec![
                step(
                    0,
                    StepAction::SendMessage,
                    &[Email, Whatsapp, Phone],
                    Duration::zero(),
                    "viewing_invite",
                ),
                step(1, StepAction::Wait, &[], Duration::hours(48), "none"),
                {
                    let mut call = step(
                        2,
                        StepAction::CallAttempt,
                        &[Phone],
                        Duration::hours(24),
                        "viewing_call",
                    );
                    call.advance_on = vec![EventType::MessageReceived, EventType::MeetingBooked];
                    call
                },
                end(3),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_prefers_vertical_specific_sequences() {
        let catalog = SequenceCatalog::standard();
        let generic = catalog
            .select(LifecycleState::New, Vertical::NetworkMarketing)
            .expect("generic intro");
        assert_eq!(generic.id.0, "new_lead_intro");

        let real_estate = catalog
            .select(LifecycleState::New, Vertical::RealEstate)
            .expect("vertical override");
        assert_eq!(real_estate.id.0, "re_new_lead_viewing");
    }

    #[test]
    fn every_sequence_terminates_with_an_end_step() {
        for sequence in SequenceCatalog::standard().sequences() {
            let last = sequence.steps.last().expect("non-empty sequence");
            assert_eq!(last.action, StepAction::End, "{}", sequence.id);
            for (index, step) in sequence.steps.iter().enumerate() {
                assert_eq!(step.order as usize, index, "{}", sequence.id);
            }
        }
    }

    #[test]
    fn no_sequence_is_defined_for_terminal_states() {
        let catalog = SequenceCatalog::standard();
        assert!(catalog
            .select(LifecycleState::Won, Vertical::Finance)
            .is_none());
        assert!(catalog
            .select(LifecycleState::Churned, Vertical::Finance)
            .is_none());
    }
}
