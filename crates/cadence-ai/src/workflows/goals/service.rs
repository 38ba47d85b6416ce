use std::sync::Arc;

use tracing::info;

use super::domain::{DailyFlowConfig, DailyFlowTargets, Goal};
use super::engine::{targets_for_goal, GoalError};
use crate::storage::{LeadStore, StoreError};
use crate::workflows::leads::domain::UserId;
use crate::workflows::plans::{CompanyId, PlanRegistry, PlanRegistryError};

#[derive(Debug, thiserror::Error)]
pub enum GoalServiceError {
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error(transparent)]
    Plan(#[from] PlanRegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persists goals and their derived daily-flow targets. The computation runs
/// first and nothing is written when it fails, so an infeasible target never
/// leaves partial rows behind.
pub struct GoalService<S> {
    store: Arc<S>,
    registry: Arc<PlanRegistry>,
}

impl<S: LeadStore> GoalService<S> {
    pub fn new(store: Arc<S>, registry: Arc<PlanRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn set_goal(
        &self,
        goal: Goal,
        config: &DailyFlowConfig,
    ) -> Result<DailyFlowTargets, GoalServiceError> {
        let plan = self.registry.get(&goal.company_id, &goal.region)?;
        let targets = targets_for_goal(plan, &goal, config)?;

        self.store.put_goal(goal.clone())?;
        self.store
            .put_daily_flow_targets(&goal.user_id, targets.clone())?;
        info!(
            user = %goal.user_id,
            company = %goal.company_id,
            rank = %targets.target_rank.id,
            "goal stored with fresh daily-flow targets"
        );
        Ok(targets)
    }

    pub fn goal(
        &self,
        user_id: &UserId,
        company_id: &CompanyId,
    ) -> Result<Option<Goal>, GoalServiceError> {
        Ok(self.store.get_goal(user_id, company_id)?)
    }

    pub fn targets(&self, user_id: &UserId) -> Result<Option<DailyFlowTargets>, GoalServiceError> {
        Ok(self.store.get_daily_flow_targets(user_id)?)
    }
}
