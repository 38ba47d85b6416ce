use chrono::{Duration, Utc};
use clap::Args;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use cadence_ai::config::EngineConfig;
use cadence_ai::error::AppError;
use cadence_ai::generator::{
    generate_with_timeout, sanitize_skeleton, DraftLeadAttributes, DraftRequest, GenerationTask,
    TemplateGenerator,
};
use cadence_ai::workflows::followup::EnrollmentChange;
use cadence_ai::workflows::goals::{
    targets_for_goal, DailyFlowConfig, DailyFlowTargets, Goal, GoalStatus, GoalTarget,
};
use cadence_ai::workflows::leads::{
    Channel, ContactChannels, EventDraft, NewLead, UserId, Vertical,
};
use cadence_ai::workflows::plans::{CompanyId, PlanRegistry, RankId};

use crate::infra::build_core;

#[derive(Args, Debug)]
pub(crate) struct GoalTargetsArgs {
    /// Company whose compensation plan to use
    #[arg(long, default_value = "vitalux")]
    pub(crate) company: String,
    /// Plan region
    #[arg(long, default_value = "dach")]
    pub(crate) region: String,
    /// Target monthly income; mutually exclusive with --target-rank
    #[arg(long, conflicts_with = "target_rank")]
    pub(crate) target_income: Option<f64>,
    /// Target rank id; mutually exclusive with --target-income
    #[arg(long)]
    pub(crate) target_rank: Option<String>,
    /// Months available to reach the goal
    #[arg(long, default_value_t = 6)]
    pub(crate) months: u32,
    /// Group volume already on the books
    #[arg(long, default_value_t = 0.0)]
    pub(crate) current_volume: f64,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the goal math portion of the demo
    #[arg(long)]
    pub(crate) skip_goals: bool,
}

pub(crate) fn run_goal_targets(args: GoalTargetsArgs) -> Result<(), AppError> {
    let registry = PlanRegistry::standard();
    let plan = registry.get(&CompanyId(args.company.clone()), &args.region)?;

    let target = match (args.target_income, args.target_rank) {
        (Some(income), None) => GoalTarget::Income {
            target_monthly_income: income,
        },
        (None, Some(rank)) => GoalTarget::Rank {
            target_rank_id: RankId(rank),
        },
        _ => GoalTarget::Income {
            target_monthly_income: 1_200.0,
        },
    };

    let goal = Goal {
        user_id: UserId(Uuid::new_v4()),
        company_id: CompanyId(args.company.clone()),
        region: args.region.clone(),
        target,
        timeframe_months: args.months,
        current_group_volume: args.current_volume,
        status: GoalStatus::Active,
    };

    let targets =
        targets_for_goal(plan, &goal, &DailyFlowConfig::default()).map_err(AppError::from)?;

    render_targets(&args.company, args.months, &targets);
    Ok(())
}

fn render_targets(company: &str, months: u32, targets: &DailyFlowTargets) {
    println!("Daily-flow targets ({company}, {months} months)");
    println!(
        "Target rank: {} (needs {} group volume, avg income {:.0})",
        targets.target_rank.display_name,
        targets.target_rank.required_group_volume,
        targets.target_rank.avg_monthly_income
    );
    println!("Missing volume: {:.0}", targets.missing_volume);
    println!(
        "Volume pacing: {} / month | {} / week | {} / day",
        targets.pacing.per_month, targets.pacing.per_week, targets.pacing.per_day
    );
    println!(
        "Estimated mix: {} customers, {} partners",
        targets.estimated_customers, targets.estimated_partners
    );
    println!(
        "Weekly: {} contacts, {} follow-ups, {} reactivations, {} customers, {} partners",
        targets.weekly.new_contacts,
        targets.weekly.followups,
        targets.weekly.reactivations,
        targets.weekly.new_customers,
        targets.weekly.new_partners
    );
    println!(
        "Daily: {} contacts, {} follow-ups, {} reactivations",
        targets.daily.new_contacts, targets.daily.followups, targets.daily.reactivations
    );
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Cadence demo");

    if !args.skip_goals {
        run_goal_targets(GoalTargetsArgs {
            company: "vitalux".to_string(),
            region: "dach".to_string(),
            target_income: Some(1_200.0),
            target_rank: None,
            months: 5,
            current_volume: 0.0,
        })?;
        println!();
    }

    let core = build_core(&EngineConfig::default());
    let owner = UserId(Uuid::new_v4());

    let lead = core
        .activity
        .create_lead(NewLead {
            owner: owner.clone(),
            display_name: "Anna Demo".to_string(),
            channels: ContactChannels {
                email: Some("anna@example.com".to_string()),
                phone: None,
                whatsapp: Some("+43 660 1234567".to_string()),
                instagram: None,
            },
            vertical: Vertical::NetworkMarketing,
            timezone: Some("Europe/Vienna".to_string()),
            enrichment: None,
            disc: None,
        })
        .map_err(AppError::from)?;
    println!("Lead registered: {} ({})", lead.display_name, lead.id);

    let (enrollment, suggestion) = core
        .followup
        .enroll(&lead.id, None)
        .map_err(AppError::from)?;
    println!(
        "Enrolled into {} -> first touch via {} due {}",
        enrollment.sequence_id,
        suggestion.channel.label(),
        suggestion.due_at
    );

    let draft = generate_with_timeout(
        &TemplateGenerator,
        DraftRequest {
            task: GenerationTask::Icebreaker,
            lead: DraftLeadAttributes {
                display_name: lead.display_name.clone(),
                vertical: lead.vertical,
                disc: lead.disc,
                channel: Some(suggestion.channel),
            },
            template_key: suggestion.meta.template_key.clone(),
            step_action: Some(suggestion.meta.step_action),
        },
        StdDuration::from_secs(5),
    )
    .await
    .map_err(AppError::from)?;
    println!("Draft: {}", sanitize_skeleton(&draft.content));

    let outcome = core
        .activity
        .record_event(EventDraft::message_received(
            lead.id.clone(),
            Channel::Whatsapp,
            Utc::now(),
        ))
        .map_err(AppError::from)?;
    println!(
        "Inbound reply recorded -> composite score {}",
        outcome.scores.composite
    );
    for change in &outcome.enrollment_changes {
        match change {
            EnrollmentChange::Advanced { to_step, .. } => {
                println!("Sequence advanced to step {to_step}")
            }
            EnrollmentChange::Completed { .. } => println!("Sequence completed"),
            EnrollmentChange::Cancelled { .. } => println!("Sequence cancelled"),
        }
    }

    let action = core
        .activity
        .next_best_action(&lead.id)
        .map_err(AppError::from)?;
    println!(
        "Next best action: {:?} -> {} ({})",
        action.case, action.action_label, action.reason
    );

    let due = core
        .followup
        .due_suggestions(&owner, Utc::now() + Duration::days(3), 10)
        .map_err(AppError::from)?;
    println!("Work queue over the next three days:");
    for item in &due {
        println!(
            "- [{}] {} via {} due {} ({})",
            item.priority.label(),
            item.meta.template_key,
            item.channel.label(),
            item.due_at,
            item.meta.reason
        );
    }

    let cancelled = core
        .activity
        .record_event(EventDraft::opt_out(lead.id.clone(), Utc::now()))
        .map_err(AppError::from)?;
    println!(
        "Opt-out recorded -> {} enrollment(s) cancelled",
        cancelled.enrollment_changes.len()
    );

    Ok(())
}
