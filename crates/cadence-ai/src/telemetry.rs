use crate::config::{AppEnvironment, TelemetryConfig};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Directives appended below the configured level so HTTP-stack chatter
/// never drowns the engine logs (enrollment advances, score passes, ticks).
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "tower=warn", "h2=warn", "mio=warn"];

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber rejected: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

fn filter_directives(level: &str) -> String {
    let mut directives = level.trim().to_string();
    for dependency in QUIET_DEPENDENCIES {
        // An explicit per-target directive in the level string wins over
        // the appended default for that dependency.
        let target = dependency.split('=').next().unwrap_or(dependency);
        if !directives.contains(target) {
            directives.push(',');
            directives.push_str(dependency);
        }
    }
    directives
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level;
/// production keeps targets for log aggregation, everything else gets the
/// compact operator-facing format.
pub fn init(
    config: &TelemetryConfig,
    environment: AppEnvironment,
) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = filter_directives(&config.log_level);
            EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter {
                value: config.log_level.clone(),
                source,
            })?
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false);

    match environment {
        AppEnvironment::Production => builder.with_target(true).try_init(),
        AppEnvironment::Development | AppEnvironment::Test => {
            builder.with_target(false).compact().try_init()
        }
    }
    .map_err(TelemetryError::Subscriber)
}
