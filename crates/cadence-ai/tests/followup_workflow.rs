//! Integration specifications for the follow-up engine: enrollment timing,
//! event-driven advancement, cancellation semantics, and the HTTP surface.
//!
//! Scenarios run against the in-memory store with a pinned clock so every
//! due instant is checked against the wall clock in the lead's timezone.

mod common {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use cadence_ai::clock::{ContactWindow, FixedClock};
    use cadence_ai::generator::TemplateGenerator;
    use cadence_ai::storage::memory::InMemoryLeadStore;
    use cadence_ai::workflows::followup::{
        FollowUpApi, FollowUpEngine, Sequence, SequenceCatalog, SequenceId, SequenceStep,
        StepAction,
    };
    use cadence_ai::workflows::leads::{
        Channel, ContactChannels, EventType, Lead, LeadActivityService, LeadId, LifecycleState,
        NewLead, UserId, Vertical,
    };
    use cadence_ai::workflows::scoring::{ScoringConfig, ScoringEngine};

    pub(crate) const OWNER: Uuid = Uuid::from_u128(0xA11CE);

    pub(crate) fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    /// Three actionable steps: send, wait 2 days, send.
    pub(crate) fn three_step_sequence() -> Sequence {
        fn touch(order: u32, action: StepAction, delay: Duration, key: &'static str) -> SequenceStep {
            SequenceStep {
                order,
                action,
                channel_preference: vec![Channel::Whatsapp, Channel::Email],
                delay,
                template_key: key,
                cancel_on: vec![EventType::OptOut],
                advance_on: vec![EventType::MessageReceived],
            }
        }

        Sequence {
            id: SequenceId("short_intro".to_string()),
            name: "Short Intro",
            entry_state: LifecycleState::Engaged,
            vertical: None,
            steps: vec![
                touch(0, StepAction::SendMessage, Duration::zero(), "first_touch"),
                touch(1, StepAction::Wait, Duration::hours(48), "none"),
                touch(2, StepAction::SendMessage, Duration::zero(), "second_touch"),
                SequenceStep {
                    order: 3,
                    action: StepAction::End,
                    channel_preference: Vec::new(),
                    delay: Duration::zero(),
                    template_key: "none",
                    cancel_on: Vec::new(),
                    advance_on: Vec::new(),
                },
            ],
        }
    }

    /// A sequence whose wait step both cancels and advances on the same
    /// event, to pin down the conflict resolution.
    pub(crate) fn conflicted_sequence() -> Sequence {
        let mut sequence = three_step_sequence();
        sequence.id = SequenceId("conflicted".to_string());
        sequence.name = "Conflicted";
        sequence.steps[1].cancel_on = vec![EventType::OptOut, EventType::MessageReceived];
        sequence
    }

    pub(crate) struct Harness {
        pub(crate) store: Arc<InMemoryLeadStore>,
        pub(crate) engine: Arc<FollowUpEngine<InMemoryLeadStore>>,
        pub(crate) activity: LeadActivityService<InMemoryLeadStore>,
    }

    pub(crate) fn harness(now: DateTime<Utc>) -> Harness {
        let store = Arc::new(InMemoryLeadStore::new());
        let clock = Arc::new(FixedClock(now));
        let catalog = Arc::new(SequenceCatalog::with_sequences(vec![
            three_step_sequence(),
            conflicted_sequence(),
        ]));
        let engine = Arc::new(FollowUpEngine::new(
            store.clone(),
            catalog,
            clock.clone(),
            ContactWindow::default(),
            "Europe/Vienna",
        ));
        let activity = LeadActivityService::new(
            store.clone(),
            ScoringEngine::new(ScoringConfig::default()),
            engine.clone(),
            clock,
        );
        Harness {
            store,
            engine,
            activity,
        }
    }

    pub(crate) fn vienna_lead(harness: &Harness) -> Lead {
        let lead = harness
            .activity
            .create_lead(NewLead {
                owner: UserId(OWNER),
                display_name: "Lena Muster".to_string(),
                channels: ContactChannels {
                    email: Some("lena@example.com".to_string()),
                    phone: None,
                    whatsapp: Some("+43 660 7654321".to_string()),
                    instagram: None,
                },
                vertical: Vertical::NetworkMarketing,
                timezone: Some("Europe/Vienna".to_string()),
                enrichment: None,
                disc: None,
            })
            .expect("lead registers");
        harness
            .activity
            .transition(&lead.id, LifecycleState::Engaged)
            .expect("lead engages")
    }

    pub(crate) fn short_intro() -> SequenceId {
        SequenceId("short_intro".to_string())
    }

    pub(crate) fn followup_api(
        harness: &Harness,
    ) -> FollowUpApi<InMemoryLeadStore, TemplateGenerator> {
        FollowUpApi {
            engine: harness.engine.clone(),
            generator: Arc::new(TemplateGenerator),
            generator_timeout: StdDuration::from_secs(5),
        }
    }

    pub(crate) fn lead_id_of(lead: &Lead) -> LeadId {
        lead.id.clone()
    }
}

mod enrollment {
    use super::common::*;
    use cadence_ai::workflows::followup::{EnrollmentStatus, FollowUpError, StepAction};
    use cadence_ai::workflows::leads::Channel;

    /// Enrolling at 09:00 UTC in Vienna (10:00 local) parks the first touch
    /// at the same day's 18:00 local, i.e. 17:00 UTC in winter.
    #[test]
    fn first_step_lands_on_the_evening_contact_window() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);

        let (enrollment, suggestion) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert_eq!(enrollment.current_step, 0);
        assert_eq!(suggestion.due_at, at(2024, 12, 1, 17, 0));
        assert_eq!(enrollment.next_due_at, Some(at(2024, 12, 1, 17, 0)));
        assert_eq!(suggestion.channel, Channel::Whatsapp);
        assert_eq!(suggestion.meta.step_action, StepAction::SendMessage);
    }

    #[test]
    fn sent_acknowledgement_schedules_the_wait_step_two_days_out() {
        let harness = harness(at(2024, 12, 1, 17, 0));
        let lead = vienna_lead(&harness);
        let (_, suggestion) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        let outcome = harness
            .engine
            .process_sent(&suggestion.id)
            .expect("acknowledges send");

        let emitted = outcome.emitted.expect("wait step emitted");
        assert_eq!(outcome.enrollment.current_step, 1);
        // 17:00 UTC + 48h = 18:00 Vienna two days later, already in window.
        assert_eq!(emitted.due_at, at(2024, 12, 3, 17, 0));
        assert_eq!(emitted.meta.step_action, StepAction::Wait);
    }

    #[test]
    fn double_enrollment_in_the_same_sequence_is_refused() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);
        harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("first enrollment");

        let result = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()));
        assert!(matches!(result, Err(FollowUpError::AlreadyEnrolled { .. })));
    }

    #[test]
    fn emit_is_idempotent_per_step() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);
        let (enrollment, first) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        let second = harness.engine.emit(&enrollment.id).expect("re-emit");
        assert_eq!(first.id, second.id);
        assert_eq!(first.due_at, second.due_at);
    }
}

mod event_reactions {
    use super::common::*;
    use cadence_ai::storage::LeadStore;
    use cadence_ai::workflows::followup::{EnrollmentChange, EnrollmentStatus, SuggestionStatus};
    use cadence_ai::workflows::leads::{Channel, EventDraft};

    /// An inbound reply during the wait step advances immediately; the fresh
    /// suggestion is due right now, not at the next evening window.
    #[test]
    fn inbound_reply_short_circuits_the_wait() {
        let now = at(2024, 12, 1, 17, 0);
        let harness = harness(now);
        let lead = vienna_lead(&harness);
        let (enrollment, first) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");
        harness.engine.process_sent(&first.id).expect("first sent");

        let outcome = harness
            .activity
            .record_event(EventDraft::message_received(
                lead_id_of(&lead),
                Channel::Whatsapp,
                at(2024, 12, 2, 10, 0),
            ))
            .expect("event recorded");

        let advanced = outcome
            .enrollment_changes
            .iter()
            .find_map(|change| match change {
                EnrollmentChange::Advanced {
                    to_step, emitted, ..
                } => Some((*to_step, emitted.clone())),
                _ => None,
            })
            .expect("wait step advanced");
        assert_eq!(advanced.0, 2);

        let fresh = harness
            .store
            .get_suggestion(&advanced.1)
            .expect("store read")
            .expect("suggestion exists");
        assert_eq!(fresh.due_at, now, "advance-on items are due immediately");
        assert_eq!(fresh.status, SuggestionStatus::Pending);

        let stored = harness
            .store
            .get_enrollment(&enrollment.id)
            .expect("store read")
            .expect("enrollment exists");
        assert_eq!(stored.status, EnrollmentStatus::Active);
        assert_eq!(stored.current_step, 2);
    }

    #[test]
    fn opt_out_cancels_every_active_enrollment() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);
        let (enrollment, _) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        let outcome = harness
            .activity
            .record_event(EventDraft::opt_out(lead_id_of(&lead), at(2024, 12, 1, 12, 0)))
            .expect("opt-out recorded");
        assert!(matches!(
            outcome.enrollment_changes.as_slice(),
            [EnrollmentChange::Cancelled { .. }]
        ));

        let stored = harness
            .store
            .get_enrollment(&enrollment.id)
            .expect("store read")
            .expect("enrollment exists");
        assert_eq!(stored.status, EnrollmentStatus::Cancelled);
        assert_eq!(stored.next_due_at, None);

        // Further emission attempts are illegal transitions.
        let result = harness.engine.emit(&enrollment.id);
        assert!(matches!(
            result,
            Err(cadence_ai::workflows::followup::FollowUpError::EnrollmentClosed { .. })
        ));
    }

    /// When one event sits in both `cancel_on` and `advance_on` of the
    /// current step, cancellation wins.
    #[test]
    fn cancel_beats_advance_on_conflicting_steps() {
        let harness = harness(at(2024, 12, 1, 17, 0));
        let lead = vienna_lead(&harness);
        let conflicted = cadence_ai::workflows::followup::SequenceId("conflicted".to_string());
        let (enrollment, first) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&conflicted))
            .expect("enrolls");
        harness.engine.process_sent(&first.id).expect("first sent");

        let outcome = harness
            .activity
            .record_event(EventDraft::message_received(
                lead_id_of(&lead),
                Channel::Whatsapp,
                at(2024, 12, 2, 10, 0),
            ))
            .expect("event recorded");

        assert!(matches!(
            outcome.enrollment_changes.as_slice(),
            [EnrollmentChange::Cancelled { .. }]
        ));
        let stored = harness
            .store
            .get_enrollment(&enrollment.id)
            .expect("store read")
            .expect("enrollment exists");
        assert_eq!(stored.status, EnrollmentStatus::Cancelled);
    }

    /// An inbound event that reached the store between emission and the sent
    /// acknowledgement (bulk import, missed notification) satisfies the
    /// following wait step: the engine catches up past it without emitting a
    /// superseded item.
    #[test]
    fn satisfied_wait_steps_are_caught_up_on_sent() {
        let harness = harness(at(2024, 12, 1, 17, 0));
        let lead = vienna_lead(&harness);
        let (_, first) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        // Reply lands in the event log without the engine being told.
        harness
            .store
            .append_event(EventDraft::message_received(
                lead_id_of(&lead),
                Channel::Whatsapp,
                at(2024, 12, 1, 18, 0),
            ))
            .expect("reply appended");

        let outcome = harness.engine.process_sent(&first.id).expect("sent");
        // Step 1 (the wait) was already satisfied by the reply; the engine
        // lands on step 2 directly and emits only that item.
        assert_eq!(outcome.enrollment.current_step, 2);
        let emitted = outcome.emitted.expect("second touch emitted");
        assert_eq!(emitted.step, 2);
    }
}

mod lifecycle {
    use super::common::*;
    use cadence_ai::storage::LeadStore;
    use cadence_ai::workflows::followup::EnrollmentStatus;
    use cadence_ai::workflows::leads::LifecycleState;

    /// Entering a terminal lifecycle state cancels open enrollments in the
    /// same operation.
    #[test]
    fn winning_the_lead_cancels_open_enrollments() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);
        let (enrollment, _) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        harness
            .activity
            .transition(&lead_id_of(&lead), LifecycleState::Opportunity)
            .expect("opportunity");
        harness
            .activity
            .transition(&lead_id_of(&lead), LifecycleState::Won)
            .expect("won");

        let stored = harness
            .store
            .get_enrollment(&enrollment.id)
            .expect("store read")
            .expect("enrollment exists");
        assert_eq!(stored.status, EnrollmentStatus::Cancelled);
    }

    #[test]
    fn terminal_leads_cannot_be_enrolled() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);
        harness
            .activity
            .transition(&lead_id_of(&lead), LifecycleState::Opportunity)
            .expect("opportunity");
        harness
            .activity
            .transition(&lead_id_of(&lead), LifecycleState::Lost)
            .expect("lost");

        let result = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()));
        assert!(matches!(
            result,
            Err(cadence_ai::workflows::followup::FollowUpError::LeadClosed { .. })
        ));
    }
}

mod queue_and_snooze {
    use super::common::*;
    use cadence_ai::workflows::followup::{SnoozeOption, SuggestionStatus};
    use cadence_ai::workflows::leads::UserId;
    use chrono::Duration;

    #[test]
    fn due_queue_only_lists_items_past_their_instant() {
        let now = at(2024, 12, 1, 9, 0);
        let harness = harness(now);
        let lead = vienna_lead(&harness);
        harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        let owner = UserId(OWNER);
        let before_window = harness
            .engine
            .due_suggestions(&owner, now, 10)
            .expect("due query");
        assert!(before_window.is_empty(), "due at 18:00, not yet listed");

        let after_window = harness
            .engine
            .due_suggestions(&owner, at(2024, 12, 1, 17, 0), 10)
            .expect("due query");
        assert_eq!(after_window.len(), 1);
    }

    /// Exactly one pending suggestion exists per active enrollment, whatever
    /// the queue horizon.
    #[test]
    fn single_pending_invariant_holds_across_operations() {
        let harness = harness(at(2024, 12, 1, 17, 0));
        let lead = vienna_lead(&harness);
        let (enrollment, first) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");
        harness.engine.emit(&enrollment.id).expect("idempotent emit");
        harness.engine.process_sent(&first.id).expect("sent");

        let horizon = at(2025, 1, 1, 0, 0);
        let all_pending = harness
            .engine
            .due_suggestions(&UserId(OWNER), horizon, 50)
            .expect("due query");
        let for_enrollment: Vec<_> = all_pending
            .iter()
            .filter(|suggestion| suggestion.enrollment_id == enrollment.id)
            .collect();
        assert_eq!(for_enrollment.len(), 1);
        assert_eq!(for_enrollment[0].step, 1);
    }

    #[test]
    fn snooze_shifts_due_but_keeps_the_item_pending() {
        let now = at(2024, 12, 1, 9, 0);
        let harness = harness(now);
        let lead = vienna_lead(&harness);
        let (_, suggestion) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        let snoozed = harness
            .engine
            .snooze(&suggestion.id, SnoozeOption::PlusDays { days: 3 })
            .expect("snoozes");
        assert_eq!(snoozed.status, SuggestionStatus::Pending);
        assert_eq!(snoozed.due_at, now + Duration::days(3));
        assert_eq!(snoozed.snoozed_until, Some(now + Duration::days(3)));
    }

    /// `until_morning_9` resolves against the lead's zone: from 09:00 UTC
    /// (10:00 Vienna) the next 09:00 local is 08:00 UTC the next day.
    #[test]
    fn snooze_until_morning_resolves_in_the_lead_timezone() {
        let now = at(2024, 12, 1, 9, 0);
        let harness = harness(now);
        let lead = vienna_lead(&harness);
        let (_, suggestion) = harness
            .engine
            .enroll(&lead_id_of(&lead), Some(&short_intro()))
            .expect("enrolls");

        let snoozed = harness
            .engine
            .snooze(&suggestion.id, SnoozeOption::UntilMorning9)
            .expect("snoozes");
        assert_eq!(snoozed.due_at, at(2024, 12, 2, 8, 0));
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use cadence_ai::workflows::followup::followup_router;

    #[tokio::test]
    async fn enroll_due_sent_and_draft_round_trip() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let lead = vienna_lead(&harness);
        let router = followup_router(followup_api(&harness));

        // Enroll over HTTP.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/followups/enrollments")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "lead_id": lead.id.0, "sequence_id": "short_intro" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        let suggestion_id = payload["suggestion"]["id"]
            .as_str()
            .expect("suggestion id")
            .to_string();

        // The work queue lists it (the pinned clock is long in the past).
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/followups/due?user_id={}", OWNER))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let due: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(due.as_array().map(Vec::len), Some(1));

        // Draft generation is lazy and sanitized.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!(
                        "/api/v1/followups/suggestions/{suggestion_id}/draft"
                    ))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let draft: Value = serde_json::from_slice(&body).expect("json");
        let content = draft["content"].as_str().expect("content");
        assert!(!content.contains('\n'));
        assert!(content.contains("Lena"));

        // Acknowledge the send; the wait step comes back.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/followups/suggestions/{suggestion_id}/sent"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let outcome: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(outcome["enrollment"]["current_step"], json!(1));
        assert!(outcome["emitted"]["id"].is_string());
    }

    #[tokio::test]
    async fn sent_on_unknown_suggestion_is_not_found() {
        let harness = harness(at(2024, 12, 1, 9, 0));
        let router = followup_router(followup_api(&harness));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/followups/suggestions/sug-ghost-g1-step0/sent")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("dispatch");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
