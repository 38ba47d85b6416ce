use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

use cadence_ai::clock::{Clock, ContactWindow, SystemClock};
use cadence_ai::config::EngineConfig;
use cadence_ai::generator::TemplateGenerator;
use cadence_ai::storage::memory::InMemoryLeadStore;
use cadence_ai::workers::{FollowupTick, ScoreMaintenance};
use cadence_ai::workflows::followup::{FollowUpApi, FollowUpEngine, SequenceCatalog};
use cadence_ai::workflows::goals::{GoalApi, GoalService};
use cadence_ai::workflows::leads::LeadActivityService;
use cadence_ai::workflows::plans::PlanRegistry;
use cadence_ai::workflows::scoring::{ScoringConfig, ScoringEngine};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Surfaced on the readiness probe so stuck follow-ups are visible to
    /// the orchestrator before anyone reads the logs.
    pub(crate) tick: Arc<FollowupTick<InMemoryLeadStore>>,
}

/// Fully wired core on the in-memory reference store: engines, services,
/// registry, workers, and the template generator. The server, the demo
/// command, and the route tests all start from this.
pub(crate) struct CoreServices {
    pub(crate) store: Arc<InMemoryLeadStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) followup: Arc<FollowUpEngine<InMemoryLeadStore>>,
    pub(crate) activity: Arc<LeadActivityService<InMemoryLeadStore>>,
    pub(crate) followup_api: FollowUpApi<InMemoryLeadStore, TemplateGenerator>,
    pub(crate) goal_api: GoalApi<InMemoryLeadStore>,
    pub(crate) score_maintenance: Arc<ScoreMaintenance<InMemoryLeadStore>>,
    pub(crate) followup_tick: Arc<FollowupTick<InMemoryLeadStore>>,
}

pub(crate) fn build_core(engine_config: &EngineConfig) -> CoreServices {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryLeadStore::new());
    let catalog = Arc::new(SequenceCatalog::standard());
    let window = ContactWindow {
        start_hour: engine_config.contact_window_start_hour,
        end_hour: engine_config.contact_window_end_hour,
    };

    let followup = Arc::new(FollowUpEngine::new(
        store.clone(),
        catalog,
        clock.clone(),
        window,
        engine_config.default_timezone.clone(),
    ));

    let scoring_config = ScoringConfig {
        window_days: engine_config.scoring_window_days,
        ..ScoringConfig::default()
    };
    let activity = Arc::new(LeadActivityService::new(
        store.clone(),
        ScoringEngine::new(scoring_config.clone()),
        followup.clone(),
        clock.clone(),
    ));

    let followup_api = FollowUpApi {
        engine: followup.clone(),
        generator: Arc::new(TemplateGenerator),
        generator_timeout: Duration::from_secs(engine_config.generator_timeout_secs),
    };

    let score_maintenance = Arc::new(ScoreMaintenance::new(
        store.clone(),
        Arc::new(ScoringEngine::new(scoring_config)),
        clock.clone(),
        200,
    ));
    let followup_tick = Arc::new(FollowupTick::new(followup.clone(), clock.clone(), 100));

    let registry = Arc::new(PlanRegistry::standard());
    let goal_api = GoalApi {
        registry: registry.clone(),
        service: Arc::new(GoalService::new(store.clone(), registry)),
    };

    CoreServices {
        store,
        clock,
        followup,
        activity,
        followup_api,
        goal_api,
        score_maintenance,
        followup_tick,
    }
}
