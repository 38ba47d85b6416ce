pub mod domain;
pub mod registry;

pub use domain::{
    CompanyId, CompensationPlan, EarningEstimate, PlanType, Rank, RankId, RankRequirements,
};
pub use registry::{PlanRegistry, PlanRegistryError};
