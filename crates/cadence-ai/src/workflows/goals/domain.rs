use serde::{Deserialize, Serialize};

use crate::workflows::leads::domain::UserId;
use crate::workflows::plans::{CompanyId, RankId};

/// Either an income figure or a concrete rank; the sum type keeps the
/// "exactly one target" invariant out of runtime checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal_type", rename_all = "snake_case")]
pub enum GoalTarget {
    Income { target_monthly_income: f64 },
    Rank { target_rank_id: RankId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Achieved,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub region: String,
    #[serde(flatten)]
    pub target: GoalTarget,
    pub timeframe_months: u32,
    pub current_group_volume: f64,
    pub status: GoalStatus,
}

/// Tunable coefficients for the daily-flow derivation. All rates default to
/// safe non-zero values; an explicit zero is rejected as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyFlowConfig {
    pub working_days_per_week: u32,
    pub contact_to_customer_rate: f64,
    pub contact_to_partner_rate: f64,
    pub followups_per_customer: f64,
    pub followups_per_partner: f64,
    pub reactivation_share: f64,
    pub customer_volume_share: f64,
    pub partner_volume_share: f64,
}

impl Default for DailyFlowConfig {
    fn default() -> Self {
        Self {
            working_days_per_week: 5,
            contact_to_customer_rate: 0.10,
            contact_to_partner_rate: 0.05,
            followups_per_customer: 3.0,
            followups_per_partner: 5.0,
            reactivation_share: 0.15,
            customer_volume_share: 0.7,
            partner_volume_share: 0.3,
        }
    }
}

/// The rank the computation aimed at, echoed into the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRankSnapshot {
    pub id: RankId,
    pub display_name: String,
    pub required_group_volume: f64,
    pub avg_monthly_income: f64,
}

/// Volume spread over the timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePacing {
    pub per_month: u32,
    pub per_week: u32,
    pub per_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTargets {
    pub new_contacts: u32,
    pub followups: u32,
    pub reactivations: u32,
    pub new_customers: u32,
    pub new_partners: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTargets {
    pub new_contacts: u32,
    pub followups: u32,
    pub reactivations: u32,
}

/// Output of the goal engine; the denominators the follow-up and scoring
/// surfaces report progress against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFlowTargets {
    pub target_rank: TargetRankSnapshot,
    pub missing_volume: f64,
    pub estimated_customers: u32,
    pub estimated_partners: u32,
    pub pacing: VolumePacing,
    pub weekly: WeeklyTargets,
    pub daily: DailyTargets,
}
