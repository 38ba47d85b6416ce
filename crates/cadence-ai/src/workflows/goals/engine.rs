use super::domain::{
    DailyFlowConfig, DailyFlowTargets, DailyTargets, Goal, GoalTarget, TargetRankSnapshot,
    VolumePacing, WeeklyTargets,
};
use crate::workflows::plans::{CompensationPlan, PlanRegistryError, Rank, RankId};

/// Calendar constant used to spread monthly volume over weeks.
pub const WEEKS_PER_MONTH: f64 = 4.33;

#[derive(Debug, thiserror::Error)]
pub enum GoalError {
    #[error("invalid daily-flow config: {0}")]
    InvalidConfig(String),
    #[error(
        "no rank reaches a monthly income of {target:.2} (top rank averages {top_rank_income:.2})"
    )]
    NoRankMeetsTarget { target: f64, top_rank_income: f64 },
    #[error("rank {0} does not exist in this plan")]
    RankNotFound(RankId),
    #[error(transparent)]
    Plan(#[from] PlanRegistryError),
}

fn validate(config: &DailyFlowConfig, timeframe_months: u32) -> Result<(), GoalError> {
    if timeframe_months == 0 {
        return Err(GoalError::InvalidConfig(
            "timeframe must cover at least one month".to_string(),
        ));
    }
    if config.working_days_per_week == 0 || config.working_days_per_week > 7 {
        return Err(GoalError::InvalidConfig(
            "working_days_per_week must be between 1 and 7".to_string(),
        ));
    }
    for (name, rate) in [
        ("contact_to_customer_rate", config.contact_to_customer_rate),
        ("contact_to_partner_rate", config.contact_to_partner_rate),
    ] {
        if rate <= 0.0 {
            return Err(GoalError::InvalidConfig(format!(
                "{name} must be a positive yield"
            )));
        }
    }
    if config.followups_per_customer < 0.0 || config.followups_per_partner < 0.0 {
        return Err(GoalError::InvalidConfig(
            "follow-up coefficients must not be negative".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.reactivation_share) {
        return Err(GoalError::InvalidConfig(
            "reactivation_share must lie in [0, 1]".to_string(),
        ));
    }
    let share_sum = config.customer_volume_share + config.partner_volume_share;
    if config.customer_volume_share < 0.0
        || config.partner_volume_share < 0.0
        || (share_sum - 1.0).abs() > 1e-6
    {
        return Err(GoalError::InvalidConfig(
            "customer and partner volume shares must sum to 1".to_string(),
        ));
    }
    Ok(())
}

fn resolve_target_rank<'a>(
    plan: &'a CompensationPlan,
    target: &GoalTarget,
) -> Result<&'a Rank, GoalError> {
    match target {
        GoalTarget::Income {
            target_monthly_income,
        } => plan
            .first_rank_covering_income(*target_monthly_income)
            .ok_or_else(|| GoalError::NoRankMeetsTarget {
                target: *target_monthly_income,
                top_rank_income: plan
                    .top_rank()
                    .map(|rank| rank.earning_estimate.avg_monthly_income)
                    .unwrap_or(0.0),
            }),
        GoalTarget::Rank { target_rank_id } => plan
            .rank(target_rank_id)
            .ok_or_else(|| GoalError::RankNotFound(target_rank_id.clone())),
    }
}

fn round(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Convenience for callers holding a stored goal row.
pub fn targets_for_goal(
    plan: &CompensationPlan,
    goal: &Goal,
    config: &DailyFlowConfig,
) -> Result<DailyFlowTargets, GoalError> {
    derive_daily_flow(
        plan,
        &goal.target,
        goal.timeframe_months,
        goal.current_group_volume,
        config,
    )
}

/// Derive daily/weekly activity targets from a goal. Pure and deterministic:
/// identical inputs always produce identical targets, and nothing is
/// persisted here, so a failed resolution leaves no partial state behind.
pub fn derive_daily_flow(
    plan: &CompensationPlan,
    target: &GoalTarget,
    timeframe_months: u32,
    current_group_volume: f64,
    config: &DailyFlowConfig,
) -> Result<DailyFlowTargets, GoalError> {
    validate(config, timeframe_months)?;

    let rank = resolve_target_rank(plan, target)?;
    let required = rank.requirements.min_group_volume;
    let missing = (required - current_group_volume).max(0.0);

    let customers = (missing * config.customer_volume_share / plan.avg_volume_per_customer).ceil();
    let partners = (missing * config.partner_volume_share / plan.avg_volume_per_partner).ceil();

    let months = f64::from(timeframe_months);
    let weeks_total = months * WEEKS_PER_MONTH;
    let working_days = f64::from(config.working_days_per_week);

    let pacing = VolumePacing {
        per_month: round(missing / months),
        per_week: round(missing / weeks_total),
        per_day: round(missing / (weeks_total * working_days)),
    };

    let customers_per_week = customers / weeks_total;
    let partners_per_week = partners / weeks_total;

    let contacts_per_week = customers_per_week / config.contact_to_customer_rate
        + partners_per_week / config.contact_to_partner_rate;
    let followups_per_week = customers_per_week * config.followups_per_customer
        + partners_per_week * config.followups_per_partner;
    let reactivations_per_week = contacts_per_week * config.reactivation_share;

    // Daily figures are rounded from the weekly raw values; weekly activity
    // is then working_days x daily so the two published numbers never drift
    // apart by more than rounding.
    let daily = DailyTargets {
        new_contacts: round(contacts_per_week / working_days),
        followups: round(followups_per_week / working_days),
        reactivations: round(reactivations_per_week / working_days),
    };
    let weekly = WeeklyTargets {
        new_contacts: daily.new_contacts * config.working_days_per_week,
        followups: daily.followups * config.working_days_per_week,
        reactivations: daily.reactivations * config.working_days_per_week,
        new_customers: round(customers_per_week),
        new_partners: round(partners_per_week),
    };

    Ok(DailyFlowTargets {
        target_rank: TargetRankSnapshot {
            id: rank.id.clone(),
            display_name: rank.display_name.clone(),
            required_group_volume: required,
            avg_monthly_income: rank.earning_estimate.avg_monthly_income,
        },
        missing_volume: missing,
        estimated_customers: customers as u32,
        estimated_partners: partners as u32,
        pacing,
        weekly,
        daily,
    })
}
