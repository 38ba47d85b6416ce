pub mod domain;
pub mod events;
pub mod router;
pub mod service;

pub use domain::{
    Channel, ContactChannels, DiscProfile, EnrichmentSnapshot, Lead, LeadCounters, LeadId,
    LifecycleError, LifecycleState, UserId, Vertical,
};
pub use events::{Direction, EventDraft, EventPayload, EventType, LeadEvent, VerificationReport};
pub use router::lead_router;
pub use service::{EventOutcome, LeadActivityService, LeadServiceError, NewLead, DORMANCY_DAYS};
