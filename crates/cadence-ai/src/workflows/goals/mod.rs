pub mod domain;
pub mod engine;
pub mod router;
pub mod service;

pub use domain::{
    DailyFlowConfig, DailyFlowTargets, DailyTargets, Goal, GoalStatus, GoalTarget,
    TargetRankSnapshot, VolumePacing, WeeklyTargets,
};
pub use engine::{derive_daily_flow, targets_for_goal, GoalError, WEEKS_PER_MONTH};
pub use router::{goal_router, GoalApi};
pub use service::{GoalService, GoalServiceError};
