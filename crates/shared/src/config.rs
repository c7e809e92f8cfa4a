//! Application configuration management.

use serde::Deserialize;

/// Cascade horizon for daily rows, in days.
pub const DAILY_HORIZON: u32 = 366;
/// Cascade horizon for weekly rows, in ISO weeks.
pub const WEEKLY_HORIZON: u32 = 53;
/// Cascade horizon for monthly rows, in months.
pub const MONTHLY_HORIZON: u32 = 60;
/// Cascade horizon for quarterly rows, in quarters.
pub const QUARTERLY_HORIZON: u32 = 20;
/// Cascade horizon for semiannual rows, in halves.
pub const SEMIANNUAL_HORIZON: u32 = 10;
/// Cascade horizon for annual rows, in years.
pub const ANNUAL_HORIZON: u32 = 20;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Per-granularity cascade horizons.
    #[serde(default)]
    pub horizons: HorizonConfig,
    /// How many periods the read path searches backward for an ancestor.
    #[serde(default = "default_inheritance_lookback")]
    pub inheritance_lookback: u32,
    /// Hard cap on rows rewritten by a single cascade run.
    #[serde(default = "default_max_rows_per_cascade")]
    pub max_rows_per_cascade: u64,
    /// Retry policy for transient storage failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            horizons: HorizonConfig::default(),
            inheritance_lookback: default_inheritance_lookback(),
            max_rows_per_cascade: default_max_rows_per_cascade(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_inheritance_lookback() -> u32 {
    24
}

fn default_max_rows_per_cascade() -> u64 {
    5000
}

/// Cascade horizon per granularity, counted in periods of that granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HorizonConfig {
    /// Days.
    #[serde(default = "default_daily")]
    pub daily: u32,
    /// ISO weeks.
    #[serde(default = "default_weekly")]
    pub weekly: u32,
    /// Months.
    #[serde(default = "default_monthly")]
    pub monthly: u32,
    /// Quarters.
    #[serde(default = "default_quarterly")]
    pub quarterly: u32,
    /// Half-years.
    #[serde(default = "default_semiannual")]
    pub semiannual: u32,
    /// Years.
    #[serde(default = "default_annual")]
    pub annual: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            daily: DAILY_HORIZON,
            weekly: WEEKLY_HORIZON,
            monthly: MONTHLY_HORIZON,
            quarterly: QUARTERLY_HORIZON,
            semiannual: SEMIANNUAL_HORIZON,
            annual: ANNUAL_HORIZON,
        }
    }
}

fn default_daily() -> u32 {
    DAILY_HORIZON
}

fn default_weekly() -> u32 {
    WEEKLY_HORIZON
}

fn default_monthly() -> u32 {
    MONTHLY_HORIZON
}

fn default_quarterly() -> u32 {
    QUARTERLY_HORIZON
}

fn default_semiannual() -> u32 {
    SEMIANNUAL_HORIZON
}

fn default_annual() -> u32 {
    ANNUAL_HORIZON
}

/// Bounded exponential backoff for transient storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled on each further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    25
}

fn default_max_delay_ms() -> u64 {
    1000
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("MONEYFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
