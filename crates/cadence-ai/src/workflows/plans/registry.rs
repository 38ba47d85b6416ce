use std::collections::HashMap;

use super::domain::{
    CompanyId, CompensationPlan, EarningEstimate, PlanType, Rank, RankId, RankRequirements,
};

#[derive(Debug, thiserror::Error)]
pub enum PlanRegistryError {
    #[error("no plan registered for company {company} in region {region}")]
    PlanNotFound { company: String, region: String },
    #[error("plan for {company} is malformed: {detail}")]
    Malformed { company: String, detail: String },
}

/// In-process registry of compensation plans. Plans are compiled reference
/// data: registered once at startup, read concurrently afterwards.
#[derive(Debug, Default)]
pub struct PlanRegistry {
    plans: HashMap<(CompanyId, String), CompensationPlan>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in demo companies.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for plan in builtin_plans() {
            registry
                .register(plan)
                .expect("built-in plans are well-formed");
        }
        registry
    }

    pub fn register(&mut self, plan: CompensationPlan) -> Result<(), PlanRegistryError> {
        validate(&plan)?;
        self.plans.insert(
            (plan.company_id.clone(), plan.region.to_lowercase()),
            plan,
        );
        Ok(())
    }

    /// Look up a plan, falling back to the company's sole region when the
    /// requested one is not registered.
    pub fn get(
        &self,
        company_id: &CompanyId,
        region: &str,
    ) -> Result<&CompensationPlan, PlanRegistryError> {
        let key = (company_id.clone(), region.to_lowercase());
        if let Some(plan) = self.plans.get(&key) {
            return Ok(plan);
        }

        let mut fallback = self
            .plans
            .values()
            .filter(|plan| &plan.company_id == company_id);
        match (fallback.next(), fallback.next()) {
            (Some(plan), None) => Ok(plan),
            _ => Err(PlanRegistryError::PlanNotFound {
                company: company_id.0.clone(),
                region: region.to_string(),
            }),
        }
    }
}

fn validate(plan: &CompensationPlan) -> Result<(), PlanRegistryError> {
    if plan.ranks.is_empty() {
        return Err(PlanRegistryError::Malformed {
            company: plan.company_id.0.clone(),
            detail: "plan has no ranks".to_string(),
        });
    }
    if plan.avg_volume_per_customer <= 0.0 || plan.avg_volume_per_partner <= 0.0 {
        return Err(PlanRegistryError::Malformed {
            company: plan.company_id.0.clone(),
            detail: "average volumes must be positive".to_string(),
        });
    }

    let mut ordered: Vec<&Rank> = plan.ranks.iter().collect();
    ordered.sort_by_key(|rank| rank.order);
    for pair in ordered.windows(2) {
        if pair[0].order == pair[1].order {
            return Err(PlanRegistryError::Malformed {
                company: plan.company_id.0.clone(),
                detail: format!("duplicate rank order {}", pair[0].order),
            });
        }
        if pair[1].earning_estimate.avg_monthly_income < pair[0].earning_estimate.avg_monthly_income
        {
            return Err(PlanRegistryError::Malformed {
                company: plan.company_id.0.clone(),
                detail: format!(
                    "income estimate decreases from rank {} to {}",
                    pair[0].id, pair[1].id
                ),
            });
        }
    }
    Ok(())
}

fn rank(
    id: &str,
    name: &str,
    order: u32,
    personal: f64,
    group: f64,
    avg_income: f64,
    range: (f64, f64),
) -> Rank {
    Rank {
        id: RankId(id.to_string()),
        display_name: name.to_string(),
        order,
        requirements: RankRequirements {
            min_personal_volume: personal,
            min_group_volume: group,
            leg_constraints: None,
        },
        earning_estimate: EarningEstimate {
            avg_monthly_income: avg_income,
            range,
        },
    }
}

fn builtin_plans() -> Vec<CompensationPlan> {
    vec![
        CompensationPlan {
            company_id: CompanyId("vitalux".to_string()),
            region: "dach".to_string(),
            plan_type: PlanType::Unilevel,
            unit_label: "PV".to_string(),
            currency: "EUR".to_string(),
            ranks: vec![
                rank("starter", "Starter", 1, 0.0, 0.0, 0.0, (0.0, 50.0)),
                rank("builder", "Builder", 2, 100.0, 1_000.0, 150.0, (80.0, 300.0)),
                rank(
                    "team_leader",
                    "Team Leader",
                    3,
                    150.0,
                    5_000.0,
                    1_200.0,
                    (800.0, 1_800.0),
                ),
                rank(
                    "director",
                    "Director",
                    4,
                    200.0,
                    20_000.0,
                    5_000.0,
                    (3_500.0, 7_500.0),
                ),
                rank(
                    "presidential",
                    "Presidential",
                    5,
                    200.0,
                    100_000.0,
                    25_000.0,
                    (15_000.0, 40_000.0),
                ),
            ],
            avg_volume_per_customer: 60.0,
            avg_volume_per_partner: 100.0,
        },
        CompensationPlan {
            company_id: CompanyId("nordwind-finanz".to_string()),
            region: "dach".to_string(),
            plan_type: PlanType::Hybrid,
            unit_label: "EH".to_string(),
            currency: "EUR".to_string(),
            ranks: vec![
                rank("consultant", "Consultant", 1, 0.0, 0.0, 0.0, (0.0, 100.0)),
                rank(
                    "senior_consultant",
                    "Senior Consultant",
                    2,
                    50.0,
                    2_500.0,
                    900.0,
                    (500.0, 1_400.0),
                ),
                rank(
                    "agency_lead",
                    "Agency Lead",
                    3,
                    80.0,
                    12_000.0,
                    3_800.0,
                    (2_500.0, 6_000.0),
                ),
            ],
            avg_volume_per_customer: 120.0,
            avg_volume_per_partner: 400.0,
        },
    ]
}
