use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let engine = EngineConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs shared by the scheduling, scoring, and draft engines.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// IANA zone assumed for leads without an explicit timezone.
    pub default_timezone: String,
    /// Event lookback used when recomputing lead scores, in days.
    pub scoring_window_days: u32,
    /// Local hour at which the daily contact window opens.
    pub contact_window_start_hour: u32,
    /// Local hour after which suggestions roll to the next day.
    pub contact_window_end_hour: u32,
    /// Upper bound for a single message-generator call, in seconds.
    pub generator_timeout_secs: u64,
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_timezone =
            env::var("APP_DEFAULT_TIMEZONE").unwrap_or_else(|_| "Europe/Vienna".to_string());
        if default_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::InvalidTimezone {
                value: default_timezone,
            });
        }

        let scoring_window_days = env::var("APP_SCORING_WINDOW_DAYS")
            .unwrap_or_else(|_| "90".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidWindow)?;

        let contact_window_start_hour = env::var("APP_CONTACT_WINDOW_START")
            .unwrap_or_else(|_| "18".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidWindow)?;
        let contact_window_end_hour = env::var("APP_CONTACT_WINDOW_END")
            .unwrap_or_else(|_| "21".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidWindow)?;

        if contact_window_start_hour >= 24
            || contact_window_end_hour > 24
            || contact_window_start_hour >= contact_window_end_hour
        {
            return Err(ConfigError::InvalidWindow);
        }

        let generator_timeout_secs = env::var("APP_GENERATOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidWindow)?;

        Ok(Self {
            default_timezone,
            scoring_window_days,
            contact_window_start_hour,
            contact_window_end_hour,
            generator_timeout_secs,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timezone: "Europe/Vienna".to_string(),
            scoring_window_days: 90,
            contact_window_start_hour: 18,
            contact_window_end_hour: 21,
            generator_timeout_secs: 30,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimezone { value: String },
    InvalidWindow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimezone { value } => {
                write!(f, "APP_DEFAULT_TIMEZONE '{}' is not an IANA zone", value)
            }
            ConfigError::InvalidWindow => {
                write!(f, "engine window settings must be numeric and ordered")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("APP_DEFAULT_TIMEZONE");
        env::remove_var("APP_SCORING_WINDOW_DAYS");
        env::remove_var("APP_CONTACT_WINDOW_START");
        env::remove_var("APP_CONTACT_WINDOW_END");
        env::remove_var("APP_GENERATOR_TIMEOUT_SECS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.engine.default_timezone, "Europe/Vienna");
        assert_eq!(config.engine.scoring_window_days, 90);
        assert_eq!(config.engine.contact_window_start_hour, 18);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DEFAULT_TIMEZONE", "Mars/Olympus_Mons");
        let result = AppConfig::load();
        assert!(matches!(result, Err(ConfigError::InvalidTimezone { .. })));
        reset_env();
    }

    #[test]
    fn rejects_inverted_contact_window() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_CONTACT_WINDOW_START", "21");
        env::set_var("APP_CONTACT_WINDOW_END", "18");
        let result = AppConfig::load();
        assert!(matches!(result, Err(ConfigError::InvalidWindow)));
        reset_env();
    }
}
