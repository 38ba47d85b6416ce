use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankId(pub String);

impl fmt::Display for RankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Unilevel,
    Binary,
    Matrix,
    Hybrid,
}

/// Volume thresholds a rank demands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRequirements {
    pub min_personal_volume: f64,
    pub min_group_volume: f64,
    /// e.g. "max 50% volume from one leg"; informational for the UI.
    #[serde(default)]
    pub leg_constraints: Option<String>,
}

/// Published earnings guidance for a rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarningEstimate {
    pub avg_monthly_income: f64,
    pub range: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rank {
    pub id: RankId,
    pub display_name: String,
    pub order: u32,
    pub requirements: RankRequirements,
    pub earning_estimate: EarningEstimate,
}

/// Shared, read-only reference data describing one company's compensation
/// plan. Ranks are totally ordered by `order` with non-decreasing income
/// estimates; `PlanRegistry` enforces both on registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationPlan {
    pub company_id: CompanyId,
    pub region: String,
    pub plan_type: PlanType,
    pub unit_label: String,
    pub currency: String,
    pub ranks: Vec<Rank>,
    pub avg_volume_per_customer: f64,
    pub avg_volume_per_partner: f64,
}

impl CompensationPlan {
    pub fn rank(&self, id: &RankId) -> Option<&Rank> {
        self.ranks.iter().find(|rank| &rank.id == id)
    }

    pub fn top_rank(&self) -> Option<&Rank> {
        self.ranks.iter().max_by_key(|rank| rank.order)
    }

    /// First rank (walking the order) whose published average income covers
    /// the target.
    pub fn first_rank_covering_income(&self, target_monthly_income: f64) -> Option<&Rank> {
        let mut ordered: Vec<&Rank> = self.ranks.iter().collect();
        ordered.sort_by_key(|rank| rank.order);
        ordered
            .into_iter()
            .find(|rank| rank.earning_estimate.avg_monthly_income >= target_monthly_income)
    }
}
