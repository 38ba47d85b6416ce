use crate::cli::ServeArgs;
use crate::infra::{build_core, AppState};
use crate::routes::with_core_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Duration as ChronoDuration;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use cadence_ai::config::AppConfig;
use cadence_ai::error::AppError;
use cadence_ai::storage::LeadStore;
use cadence_ai::telemetry;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);
const TICK_INTERVAL: Duration = Duration::from_secs(60);
const DORMANCY_SWEEP_CHUNK: usize = 100;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let core = build_core(&config.engine);
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        tick: core.followup_tick.clone(),
    };
    spawn_background_jobs(&core);

    let app = with_core_routes(&core)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "cadence orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_background_jobs(core: &crate::infra::CoreServices) {
    let maintenance = core.score_maintenance.clone();
    let activity = core.activity.clone();
    let clock = core.clock.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            let since = clock.now_utc() - ChronoDuration::days(1);
            if let Err(err) = maintenance.run_once(since) {
                warn!(error = %err, "score maintenance pass failed");
            }
            if let Err(err) = activity.sweep_dormant(DORMANCY_SWEEP_CHUNK) {
                warn!(error = %err, "dormancy sweep failed");
            }
        }
    });

    let tick = core.followup_tick.clone();
    let store = core.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            let owners = match store.owners_with_pending_suggestions(100) {
                Ok(owners) => owners,
                Err(err) => {
                    warn!(error = %err, "could not list owners for follow-up tick");
                    continue;
                }
            };
            for owner in owners {
                if let Err(err) = tick.run_once(&owner).await {
                    warn!(owner = %owner, error = %err, "follow-up tick failed");
                }
            }
        }
    });
}
