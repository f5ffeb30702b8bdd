use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Metrics collection, alerting and health policy
    pub monitor: MonitorConfig,

    /// Backend-client pool options
    pub pool: PoolConfig,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum snapshots kept in the rolling history
    pub max_history_size: usize,

    /// Maximum alerts kept before the oldest is dropped
    pub max_alerts: usize,

    /// Recency horizon for an alert to count as active
    pub alert_window_seconds: u64,

    /// Alerts older than this are pruned on every collection tick
    pub alert_retention_seconds: u64,

    /// Period of the background collection tick
    pub collection_interval_ms: u64,

    /// History window used for trend analysis in reports
    pub trend_window_minutes: u64,

    pub thresholds: AlertThresholds,

    pub health: HealthPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Average query time above this raises a database warning
    pub slow_query_time_ms: f64,

    /// Cache hit rate (0.0 - 1.0) below this raises a cache warning
    pub min_cache_hit_rate: f64,

    /// API error rate (0.0 - 1.0) above this raises a critical alert
    pub max_error_rate: f64,

    /// Memory usage percentage above this raises a critical alert
    pub max_memory_usage_percent: f64,

    /// Requests slower than this count as slow API requests
    pub slow_api_request_ms: f64,
}

/// Escalation rule used to classify overall health from active alerts.
///
/// With the defaults one critical alert makes the system critical and any
/// warning makes it warning. More than `escalation_warning_count` warnings
/// also classifies as warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPolicy {
    pub critical_alert_threshold: usize,
    pub escalation_warning_count: usize,
    pub warning_alert_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Tracked connections per pool type
    pub max_connections: usize,

    /// Idle time after which a connection is no longer reused
    pub idle_timeout_ms: u64,

    /// Hand-outs after which a connection is retired
    pub max_reuse_count: u32,

    /// Period of the background health-check sweep
    pub health_check_interval_ms: u64,

    /// Connections older than this are evicted by the sweep
    pub max_connection_age_seconds: u64,

    /// Response-time samples kept per connection
    pub response_time_window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_history_size: 1000,
            max_alerts: 100,
            alert_window_seconds: 5 * 60,
            alert_retention_seconds: 60 * 60,
            collection_interval_ms: 30_000,
            trend_window_minutes: 60,
            thresholds: AlertThresholds::default(),
            health: HealthPolicy::default(),
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            slow_query_time_ms: 1000.0,
            min_cache_hit_rate: 0.7,
            max_error_rate: 0.05,
            max_memory_usage_percent: 85.0,
            slow_api_request_ms: 2000.0,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            critical_alert_threshold: 1,
            escalation_warning_count: 3,
            warning_alert_threshold: 1,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_timeout_ms: 5 * 60 * 1000,
            max_reuse_count: 100,
            health_check_interval_ms: 60 * 1000,
            max_connection_age_seconds: 24 * 60 * 60,
            response_time_window: 10,
        }
    }
}

impl MonitorConfig {
    pub fn alert_window(&self) -> chrono::Duration {
        saturating_seconds(self.alert_window_seconds)
    }

    pub fn alert_retention(&self) -> chrono::Duration {
        saturating_seconds(self.alert_retention_seconds)
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_millis(self.collection_interval_ms)
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn max_connection_age(&self) -> Duration {
        Duration::from_secs(self.max_connection_age_seconds)
    }
}

impl Config {
    /// Load configuration from environment variables, starting from defaults
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let mut config = Config::default();

        // Monitor configuration
        if let Some(size) = parse_var("PERF_MAX_HISTORY_SIZE")? {
            config.monitor.max_history_size = size;
        }

        if let Some(max) = parse_var("PERF_MAX_ALERTS")? {
            config.monitor.max_alerts = max;
        }

        if let Some(seconds) = parse_var("PERF_ALERT_WINDOW_SECONDS")? {
            config.monitor.alert_window_seconds = seconds;
        }

        if let Some(seconds) = parse_var("PERF_ALERT_RETENTION_SECONDS")? {
            config.monitor.alert_retention_seconds = seconds;
        }

        if let Some(interval) = parse_var("PERF_COLLECTION_INTERVAL_MS")? {
            config.monitor.collection_interval_ms = interval;
        }

        if let Some(minutes) = parse_var("PERF_TREND_WINDOW_MINUTES")? {
            config.monitor.trend_window_minutes = minutes;
        }

        // Alert thresholds
        if let Some(ms) = parse_var("PERF_SLOW_QUERY_MS")? {
            config.monitor.thresholds.slow_query_time_ms = ms;
        }

        if let Some(rate) = parse_var("PERF_MIN_CACHE_HIT_RATE")? {
            config.monitor.thresholds.min_cache_hit_rate = rate;
        }

        if let Some(rate) = parse_var("PERF_MAX_ERROR_RATE")? {
            config.monitor.thresholds.max_error_rate = rate;
        }

        if let Some(percent) = parse_var("PERF_MAX_MEMORY_PERCENT")? {
            config.monitor.thresholds.max_memory_usage_percent = percent;
        }

        if let Some(ms) = parse_var("PERF_SLOW_API_MS")? {
            config.monitor.thresholds.slow_api_request_ms = ms;
        }

        // Pool configuration
        if let Some(max) = parse_var("POOL_MAX_CONNECTIONS")? {
            config.pool.max_connections = max;
        }

        if let Some(ms) = parse_var("POOL_IDLE_TIMEOUT_MS")? {
            config.pool.idle_timeout_ms = ms;
        }

        if let Some(count) = parse_var("POOL_MAX_REUSE_COUNT")? {
            config.pool.max_reuse_count = count;
        }

        if let Some(ms) = parse_var("POOL_HEALTH_CHECK_INTERVAL_MS")? {
            config.pool.health_check_interval_ms = ms;
        }

        if let Some(seconds) = parse_var("POOL_MAX_CONNECTION_AGE_SECONDS")? {
            config.pool.max_connection_age_seconds = seconds;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            config.log_level = LogLevel(level);
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let monitor = &self.monitor;
        let thresholds = &monitor.thresholds;

        if monitor.max_history_size == 0 {
            return Err(anyhow::anyhow!("History size must be greater than 0"));
        }

        if monitor.max_alerts == 0 {
            return Err(anyhow::anyhow!("Alert capacity must be greater than 0"));
        }

        if monitor.collection_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Collection interval must be greater than 0"
            ));
        }

        if !(0.0..=1.0).contains(&thresholds.min_cache_hit_rate) {
            return Err(anyhow::anyhow!(
                "Minimum cache hit rate must be between 0.0 and 1.0"
            ));
        }

        if !(0.0..=1.0).contains(&thresholds.max_error_rate) {
            return Err(anyhow::anyhow!(
                "Maximum error rate must be between 0.0 and 1.0"
            ));
        }

        if thresholds.slow_query_time_ms <= 0.0 || thresholds.slow_api_request_ms <= 0.0 {
            return Err(anyhow::anyhow!("Latency thresholds must be positive"));
        }

        if self.pool.max_connections == 0 {
            return Err(anyhow::anyhow!("Pool max connections must be greater than 0"));
        }

        if self.pool.max_reuse_count == 0 {
            return Err(anyhow::anyhow!("Pool max reuse count must be greater than 0"));
        }

        if self.pool.health_check_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Pool health check interval must be greater than 0"
            ));
        }

        if self.pool.response_time_window == 0 {
            return Err(anyhow::anyhow!(
                "Response time window must hold at least one sample"
            ));
        }

        Ok(())
    }
}

fn saturating_seconds(seconds: u64) -> chrono::Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.max_history_size, 1000);
        assert_eq!(config.monitor.max_alerts, 100);
        assert_eq!(config.monitor.alert_window_seconds, 300);
        assert_eq!(config.pool.response_time_window, 10);
        assert_eq!(config.log_level.0, "info");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.monitor.thresholds.min_cache_hit_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pool.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitor.max_history_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_alert_horizons_saturate() {
        let config = MonitorConfig {
            alert_window_seconds: u64::MAX,
            alert_retention_seconds: i64::MAX as u64,
            ..MonitorConfig::default()
        };

        assert_eq!(config.alert_window(), chrono::Duration::MAX);
        assert_eq!(config.alert_retention(), chrono::Duration::MAX);
        assert_eq!(
            MonitorConfig::default().alert_window(),
            chrono::Duration::seconds(300)
        );
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        env::set_var("POOL_MAX_CONNECTIONS", "4");
        env::set_var("PERF_SLOW_QUERY_MS", "500");
        let config = Config::from_env().unwrap();
        env::remove_var("POOL_MAX_CONNECTIONS");
        env::remove_var("PERF_SLOW_QUERY_MS");

        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.monitor.thresholds.slow_query_time_ms, 500.0);
    }

    #[test]
    #[serial]
    fn test_from_env_reports_variable_name() {
        env::set_var("POOL_MAX_REUSE_COUNT", "many");
        let err = Config::from_env().unwrap_err();
        env::remove_var("POOL_MAX_REUSE_COUNT");

        assert!(err.to_string().contains("POOL_MAX_REUSE_COUNT"));
    }
}
