pub mod catalog;
pub mod domain;
pub mod engine;
pub mod router;

pub use catalog::SequenceCatalog;
pub use domain::{
    EnrollmentId, EnrollmentStatus, Priority, Sequence, SequenceEnrollment, SequenceId,
    SequenceStep, SnoozeOption, StepAction, Suggestion, SuggestionId, SuggestionMeta,
    SuggestionStatus, SuggestionView,
};
pub use engine::{EnrollmentChange, FollowUpEngine, FollowUpError, ProcessOutcome};
pub use router::{followup_router, FollowUpApi};
