use std::env;

/// Top-level application configuration.
///
/// Every knob is read from the environment with a hardcoded fallback, so
/// the binary starts with no `.env` at all. Values that fail to parse are
/// reported as errors rather than silently replaced.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub redis_url: String,
    pub database_url: String,
    pub provider_base_url: String,
    pub provider_api_key: String,
    pub cache: CacheConfig,
    pub schedules: JobSchedules,
    pub thresholds: Thresholds,
    pub monitor: MonitorConfig,
    pub backfill: BackfillConfig,
}

/// Cache-aside layer settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL applied when a caller does not pass one, in seconds.
    pub default_ttl_secs: u64,
    /// Prefix prepended to every cache key.
    pub key_prefix: String,
}

/// Cron expression per registered job (seconds field included).
#[derive(Debug, Clone)]
pub struct JobSchedules {
    pub trending_refresh: String,
    pub cache_cleanup: String,
    pub usage_report: String,
    pub health_ping: String,
    pub db_maintenance: String,
    pub card_backfill: String,
}

/// Alerting thresholds evaluated by the monitor.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    /// Load average divided by core count above which load is alert-worthy.
    pub load_per_core: f64,
    pub slow_request_ms: u64,
    pub error_rate_pct: f64,
}

/// Sampling cadence and retention windows for the metrics collector.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub sample_interval_secs: u64,
    pub request_retention_secs: i64,
    pub error_retention_secs: i64,
    /// Minimum age before an alert is eligible for auto-resolution, seconds.
    pub alert_grace_secs: i64,
    /// How long resolved alerts are kept before garbage collection, seconds.
    pub alert_retention_secs: i64,
}

/// Summary-card backfill batching.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, fallback: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number, got '{}'", key, raw)),
        Err(_) => Ok(fallback),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:4000"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            database_url: env_or("DATABASE_URL", "sqlite:marquee.db"),
            provider_base_url: env_or(
                "PROVIDER_BASE_URL",
                "https://api.themoviedb.org/3",
            ),
            provider_api_key: env_or("PROVIDER_API_KEY", ""),
            cache: CacheConfig {
                default_ttl_secs: env_or_parse("CACHE_DEFAULT_TTL_SECONDS", 300)?,
                key_prefix: env_or("CACHE_KEY_PREFIX", "marquee:"),
            },
            schedules: JobSchedules {
                trending_refresh: env_or("SCHEDULE_TRENDING_REFRESH", "0 0 */6 * * *"),
                cache_cleanup: env_or("SCHEDULE_CACHE_CLEANUP", "0 30 * * * *"),
                usage_report: env_or("SCHEDULE_USAGE_REPORT", "0 0 8 * * *"),
                health_ping: env_or("SCHEDULE_HEALTH_PING", "0 */5 * * * *"),
                db_maintenance: env_or("SCHEDULE_DB_MAINTENANCE", "0 15 3 * * *"),
                card_backfill: env_or("SCHEDULE_CARD_BACKFILL", "0 45 */2 * * *"),
            },
            thresholds: Thresholds {
                cpu_pct: env_or_parse("ALERT_CPU_PCT", 80.0)?,
                memory_pct: env_or_parse("ALERT_MEMORY_PCT", 85.0)?,
                load_per_core: env_or_parse("ALERT_LOAD_PER_CORE", 2.0)?,
                slow_request_ms: env_or_parse("ALERT_SLOW_REQUEST_MS", 2000)?,
                error_rate_pct: env_or_parse("ALERT_ERROR_RATE_PCT", 10.0)?,
            },
            monitor: MonitorConfig {
                sample_interval_secs: env_or_parse("METRICS_SAMPLE_INTERVAL_SECONDS", 30)?,
                request_retention_secs: env_or_parse("METRICS_REQUEST_RETENTION_SECONDS", 3_600)?,
                error_retention_secs: env_or_parse("METRICS_ERROR_RETENTION_SECONDS", 86_400)?,
                alert_grace_secs: env_or_parse("ALERT_GRACE_SECONDS", 600)?,
                alert_retention_secs: env_or_parse("ALERT_RETENTION_SECONDS", 86_400)?,
            },
            backfill: BackfillConfig {
                batch_size: env_or_parse("BACKFILL_BATCH_SIZE", 5)?,
                batch_delay_ms: env_or_parse("BACKFILL_BATCH_DELAY_MS", 2_000)?,
            },
        })
    }
}
