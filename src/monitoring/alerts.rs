use super::{horizon, Alert, AlertCategory, AlertSeverity, MetricsSnapshot};
use crate::config::{AlertThresholds, MonitorConfig};
use crate::error::{PerfError, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

/// Threshold evaluation and the bounded alert log.
///
/// Alerts are kept in insertion order. The log is capped at `max_alerts`
/// (oldest dropped first) and separately pruned by age on every tick.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
    alerts: VecDeque<Alert>,
    max_alerts: usize,
    window: chrono::Duration,
    retention: chrono::Duration,
}

impl AlertEngine {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
            alerts: VecDeque::new(),
            max_alerts: config.max_alerts.max(1),
            window: config.alert_window(),
            retention: config.alert_retention(),
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Compare a snapshot against the static thresholds and record every
    /// violation. Checks run in a fixed order: database, cache, api, memory.
    /// A violation that cannot be recorded is logged and skipped so the
    /// remaining checks still run.
    pub fn check_thresholds(&mut self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let mut raised = Vec::new();

        for alert in self.evaluate(snapshot) {
            match self.record(alert.clone()) {
                Ok(()) => raised.push(alert),
                Err(e) => error!(category = %alert.category, "Failed to record alert: {}", e),
            }
        }

        raised
    }

    /// Pure evaluation of a snapshot, without touching the log
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let t = &self.thresholds;
        let now = snapshot.timestamp;
        let mut alerts = Vec::new();

        let query_time = snapshot.database.average_query_time;
        if query_time > t.slow_query_time_ms {
            alerts.push(Alert::new(
                AlertSeverity::Warning,
                AlertCategory::Database,
                format!(
                    "Slow database queries: average {:.0}ms (threshold: {:.0}ms)",
                    query_time, t.slow_query_time_ms
                ),
                query_time,
                t.slow_query_time_ms,
                now,
            ));
        }

        // Skipped when no cache source reported a hit rate
        let hit_rate = snapshot.cache.hit_rate;
        if snapshot.cache.reported && hit_rate < t.min_cache_hit_rate {
            alerts.push(Alert::new(
                AlertSeverity::Warning,
                AlertCategory::Cache,
                format!(
                    "Low cache hit rate: {:.1}% (threshold: {:.1}%)",
                    hit_rate * 100.0,
                    t.min_cache_hit_rate * 100.0
                ),
                hit_rate,
                t.min_cache_hit_rate,
                now,
            ));
        }

        let error_rate = snapshot.api.error_rate;
        if error_rate > t.max_error_rate {
            alerts.push(Alert::new(
                AlertSeverity::Critical,
                AlertCategory::Api,
                format!(
                    "High API error rate: {:.1}% (threshold: {:.1}%)",
                    error_rate * 100.0,
                    t.max_error_rate * 100.0
                ),
                error_rate,
                t.max_error_rate,
                now,
            ));
        }

        let memory = snapshot.memory.usage_percentage;
        if memory > t.max_memory_usage_percent {
            alerts.push(Alert::new(
                AlertSeverity::Critical,
                AlertCategory::Memory,
                format!(
                    "High memory usage: {:.1}% (threshold: {:.1}%)",
                    memory, t.max_memory_usage_percent
                ),
                memory,
                t.max_memory_usage_percent,
                now,
            ));
        }

        alerts
    }

    /// Append an alert, dropping the oldest entries beyond the cap
    pub fn record(&mut self, alert: Alert) -> Result<()> {
        if !alert.value.is_finite() || !alert.threshold.is_finite() {
            return Err(PerfError::Operation(format!(
                "non-finite {} alert value {} (threshold {})",
                alert.category, alert.value, alert.threshold
            )));
        }

        match alert.severity {
            AlertSeverity::Critical => error!("CRITICAL ALERT: {}", alert.message),
            AlertSeverity::Warning => warn!("WARNING ALERT: {}", alert.message),
        }

        self.alerts.push_back(alert);
        while self.alerts.len() > self.max_alerts {
            self.alerts.pop_front();
        }

        Ok(())
    }

    /// Alerts raised within the alert window, in insertion order
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let cutoff = horizon(now, self.window);
        self.alerts
            .iter()
            .filter(|a| a.timestamp > cutoff)
            .cloned()
            .collect()
    }

    /// Drop alerts older than the retention horizon
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = horizon(now, self.retention);
        let initial_len = self.alerts.len();

        self.alerts.retain(|alert| alert.timestamp > cutoff);

        let removed = initial_len - self.alerts.len();
        if removed > 0 {
            info!("Cleaned up {} old alerts", removed);
        } else {
            debug!("No alerts older than retention horizon");
        }
        removed
    }

    pub fn all(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}
