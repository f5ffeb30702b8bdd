use super::{Alert, AlertSeverity, HealthStatus, MetricsSnapshot, PerformanceTrends};
use crate::config::{AlertThresholds, HealthPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pool utilization above which a capacity recommendation is emitted
const POOL_PRESSURE_UTILIZATION: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub current: MetricsSnapshot,
    pub trends: PerformanceTrends,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
    pub health: HealthStatus,
}

/// Overall health from the currently active alerts
pub fn classify_health(active_alerts: &[Alert], policy: &HealthPolicy) -> HealthStatus {
    let critical = active_alerts
        .iter()
        .filter(|a| a.severity == AlertSeverity::Critical)
        .count();
    let warnings = active_alerts
        .iter()
        .filter(|a| a.severity == AlertSeverity::Warning)
        .count();

    if critical >= policy.critical_alert_threshold.max(1) {
        HealthStatus::Critical
    } else if warnings > policy.escalation_warning_count {
        HealthStatus::Warning
    } else if warnings >= policy.warning_alert_threshold.max(1) {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Free-text advice for every threshold the snapshot violates
pub fn generate_recommendations(
    snapshot: &MetricsSnapshot,
    thresholds: &AlertThresholds,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if snapshot.database.average_query_time > thresholds.slow_query_time_ms {
        recommendations.push(format!(
            "Average query time is {:.0}ms; review slow queries and add indexes for frequent filters",
            snapshot.database.average_query_time
        ));
    }

    if snapshot.database.slow_queries > 0 {
        recommendations.push(format!(
            "{} queries exceeded {:.0}ms; consider paginating large result sets",
            snapshot.database.slow_queries, thresholds.slow_query_time_ms
        ));
    }

    if snapshot.cache.reported && snapshot.cache.hit_rate < thresholds.min_cache_hit_rate {
        recommendations.push(format!(
            "Cache hit rate is {:.1}%; increase TTLs or pre-warm frequently read entries",
            snapshot.cache.hit_rate * 100.0
        ));
    }

    if snapshot.api.error_rate > thresholds.max_error_rate {
        recommendations.push(format!(
            "API error rate is {:.1}%; inspect failing endpoints and upstream dependencies",
            snapshot.api.error_rate * 100.0
        ));
    }

    if snapshot.api.slow_requests > 0 {
        recommendations.push(format!(
            "{} API requests exceeded {:.0}ms; profile the slowest handlers",
            snapshot.api.slow_requests, thresholds.slow_api_request_ms
        ));
    }

    if snapshot.memory.usage_percentage > thresholds.max_memory_usage_percent {
        recommendations.push(format!(
            "Memory usage is {:.1}%; look for unbounded caches or leaked handles",
            snapshot.memory.usage_percentage
        ));
    }

    if snapshot.database.connection_pool_utilization > POOL_PRESSURE_UTILIZATION {
        recommendations.push(format!(
            "Connection pool is {:.0}% utilized; raise max connections or shorten operations",
            snapshot.database.connection_pool_utilization * 100.0
        ));
    }

    recommendations
}
