//! Simulation configuration loaded from environment variables.

use domain::AccessCodesConfig;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Simulation configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SIM_DAYS`: simulated days (default: `200`)
/// - `SIM_CODES_PER_DAY`: issuances per day (default: `1000`)
/// - `SIM_WORKERS`: concurrent issuing tasks (default: `8`)
/// - `SIM_CONTENDERS`: callers racing to use one code (default: `16`)
/// - `SIM_MAX_DRAWS`: random draws per issuance before giving up (default: `100`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for human output
///
/// The service itself is configured by [`AccessCodesConfig::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub days: u32,
    pub codes_per_day: u32,
    pub workers: u32,
    pub contenders: u32,
    pub max_draws: u32,
    pub log_level: String,
    pub log_format: LogFormat,
    pub service: AccessCodesConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: u32| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            days: number("SIM_DAYS", defaults.days),
            codes_per_day: number("SIM_CODES_PER_DAY", defaults.codes_per_day),
            workers: number("SIM_WORKERS", defaults.workers).max(1),
            contenders: number("SIM_CONTENDERS", defaults.contenders),
            max_draws: number("SIM_MAX_DRAWS", defaults.max_draws).max(1),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            service: AccessCodesConfig::from_env(),
        }
    }

    /// Total issuances the day loop will make.
    pub fn expected_issuances(&self) -> u64 {
        u64::from(self.days) * u64::from(self.codes_per_day)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            days: 200,
            codes_per_day: 1000,
            workers: 8,
            contenders: 16,
            max_draws: 100,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            service: AccessCodesConfig::default(),
        }
    }
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}
