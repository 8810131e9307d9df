use std::env;
use std::fmt;
use std::time::Duration;

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

/// Top-level configuration for the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub matching: MatchingConfig,
    pub sweep: SweepConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let donation_interval_days = parse_days(
            "HEMOLINK_DONATION_INTERVAL_DAYS",
            MatchingConfig::DEFAULT_DONATION_INTERVAL_DAYS,
        )?;
        let emergency_donation_interval_days = parse_days(
            "HEMOLINK_EMERGENCY_DONATION_INTERVAL_DAYS",
            MatchingConfig::DEFAULT_EMERGENCY_DONATION_INTERVAL_DAYS,
        )?;

        let sweep_interval_secs = env::var("HEMOLINK_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| SweepConfig::DEFAULT_INTERVAL_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidSweepInterval)?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        let log_level = env::var("HEMOLINK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_env(environment);

        Ok(Self {
            environment,
            matching: MatchingConfig {
                donation_interval_days,
                emergency_donation_interval_days,
            },
            sweep: SweepConfig {
                interval_secs: sweep_interval_secs,
            },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
        })
    }
}

fn parse_days(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    let days = env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidInterval { key })?;
    if days == 0 {
        return Err(ConfigError::InvalidInterval { key });
    }
    Ok(days)
}

/// Donor eligibility windows consumed by the eligibility evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Minimum days between donations for routine and urgent requests.
    pub donation_interval_days: u32,
    /// Shorter override interval applied to emergency requests.
    pub emergency_donation_interval_days: u32,
}

impl MatchingConfig {
    pub const DEFAULT_DONATION_INTERVAL_DAYS: u32 = 90;
    pub const DEFAULT_EMERGENCY_DONATION_INTERVAL_DAYS: u32 = 30;
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            donation_interval_days: Self::DEFAULT_DONATION_INTERVAL_DAYS,
            emergency_donation_interval_days: Self::DEFAULT_EMERGENCY_DONATION_INTERVAL_DAYS,
        }
    }
}

/// Cadence of the background expiration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    pub interval_secs: u64,
}

impl SweepConfig {
    pub const DEFAULT_INTERVAL_SECS: u64 = 60;

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: Self::DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Line shaping for the tracing subscriber. Development defaults to the
/// multi-line pretty writer; everywhere else gets single-line compact
/// output for log shippers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn from_env(environment: AppEnvironment) -> Self {
        match env::var("HEMOLINK_LOG_FORMAT") {
            Ok(value) if value.trim().eq_ignore_ascii_case("pretty") => Self::Pretty,
            Ok(_) => Self::Compact,
            Err(_) => match environment {
                AppEnvironment::Development => Self::Pretty,
                AppEnvironment::Test | AppEnvironment::Production => Self::Compact,
            },
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidInterval { key: &'static str },
    InvalidSweepInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidInterval { key } => {
                write!(f, "{key} must be a positive whole number of days")
            }
            ConfigError::InvalidSweepInterval => {
                write!(f, "HEMOLINK_SWEEP_INTERVAL_SECS must be a positive u64")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
