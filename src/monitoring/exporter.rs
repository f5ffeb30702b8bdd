//! Prometheus text exposition of a metrics snapshot

use super::MetricsSnapshot;
use crate::error::{PerfError, Result};
use prometheus::{Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};

pub struct MetricsExporter {
    registry: Registry,

    // Database metrics
    db_query_count: IntGauge,
    db_average_query_ms: Gauge,
    db_slow_queries: IntGauge,
    db_pool_utilization: Gauge,

    // Cache metrics
    cache_hit_rate: Gauge,
    cache_entries: IntGauge,
    cache_evictions: IntGauge,

    // Connection metrics
    pool_size: IntGauge,
    pool_active: IntGauge,
    pool_idle: IntGauge,
    pool_reuse_rate: Gauge,
    pool_errors: IntGauge,

    // API metrics
    api_requests: IntGauge,
    api_average_response_ms: Gauge,
    api_error_rate: Gauge,
    api_slow_requests: IntGauge,
    api_requests_per_second: Gauge,

    // Memory metrics
    memory_rss_bytes: IntGauge,
    memory_usage_percent: Gauge,
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge> {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl MetricsExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("jobtrack".to_string()), None)?;

        Ok(Self {
            db_query_count: int_gauge(&registry, "db_query_count", "Database queries recorded")?,
            db_average_query_ms: gauge(
                &registry,
                "db_average_query_milliseconds",
                "Average database query time in milliseconds",
            )?,
            db_slow_queries: int_gauge(&registry, "db_slow_queries", "Slow database queries")?,
            db_pool_utilization: gauge(
                &registry,
                "db_pool_utilization_ratio",
                "Fraction of pool capacity in use",
            )?,
            cache_hit_rate: gauge(&registry, "cache_hit_ratio", "Cache hit rate")?,
            cache_entries: int_gauge(&registry, "cache_entries", "Entries held by the cache")?,
            cache_evictions: int_gauge(&registry, "cache_evictions", "Expired cache entries")?,
            pool_size: int_gauge(&registry, "pool_connections", "Tracked pooled connections")?,
            pool_active: int_gauge(
                &registry,
                "pool_connections_active",
                "Pooled connections currently borrowed",
            )?,
            pool_idle: int_gauge(&registry, "pool_connections_idle", "Idle pooled connections")?,
            pool_reuse_rate: gauge(
                &registry,
                "pool_reuse_ratio",
                "Share of acquisitions served by reuse",
            )?,
            pool_errors: int_gauge(
                &registry,
                "pool_connection_errors",
                "Connection factory failures",
            )?,
            api_requests: int_gauge(&registry, "api_requests", "API requests recorded")?,
            api_average_response_ms: gauge(
                &registry,
                "api_average_response_milliseconds",
                "Average API response time in milliseconds",
            )?,
            api_error_rate: gauge(&registry, "api_error_ratio", "Share of 4xx/5xx responses")?,
            api_slow_requests: int_gauge(&registry, "api_slow_requests", "Slow API requests")?,
            api_requests_per_second: gauge(
                &registry,
                "api_requests_per_second",
                "API request throughput",
            )?,
            memory_rss_bytes: int_gauge(&registry, "memory_rss_bytes", "Resident set size")?,
            memory_usage_percent: gauge(
                &registry,
                "memory_usage_percent",
                "Process memory as a share of system memory",
            )?,
            registry,
        })
    }

    /// Set every gauge from the snapshot and render the registry
    pub fn export(&self, snapshot: &MetricsSnapshot) -> Result<String> {
        self.db_query_count.set(clamp_i64(snapshot.database.query_count));
        self.db_average_query_ms.set(snapshot.database.average_query_time);
        self.db_slow_queries.set(clamp_i64(snapshot.database.slow_queries));
        self.db_pool_utilization
            .set(snapshot.database.connection_pool_utilization);

        self.cache_hit_rate.set(snapshot.cache.hit_rate);
        self.cache_entries.set(clamp_i64(snapshot.cache.total_entries));
        self.cache_evictions.set(clamp_i64(snapshot.cache.evictions));

        self.pool_size.set(clamp_i64(snapshot.connections.pool_size));
        self.pool_active
            .set(clamp_i64(snapshot.connections.active_connections));
        self.pool_idle.set(clamp_i64(snapshot.connections.idle_connections));
        self.pool_reuse_rate
            .set(snapshot.connections.connection_reuse_rate);
        self.pool_errors
            .set(clamp_i64(snapshot.connections.connection_errors));

        self.api_requests.set(clamp_i64(snapshot.api.request_count));
        self.api_average_response_ms
            .set(snapshot.api.average_response_time);
        self.api_error_rate.set(snapshot.api.error_rate);
        self.api_slow_requests.set(clamp_i64(snapshot.api.slow_requests));
        self.api_requests_per_second
            .set(snapshot.api.requests_per_second);

        self.memory_rss_bytes.set(clamp_i64(snapshot.memory.rss));
        self.memory_usage_percent
            .set(snapshot.memory.usage_percentage);

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| PerfError::Operation(format!("metrics output was not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{
        ApiMetrics, CacheMetrics, ConnectionUsageMetrics, DatabaseMetrics, MemoryMetrics,
    };
    use chrono::Utc;

    #[test]
    fn test_export_contains_snapshot_values() {
        let exporter = MetricsExporter::new().unwrap();
        let snapshot = MetricsSnapshot {
            timestamp: Utc::now(),
            database: DatabaseMetrics {
                query_count: 42,
                average_query_time: 12.5,
                ..Default::default()
            },
            cache: CacheMetrics::default(),
            connections: ConnectionUsageMetrics {
                pool_size: 3,
                ..Default::default()
            },
            api: ApiMetrics::default(),
            memory: MemoryMetrics::default(),
        };

        let text = exporter.export(&snapshot).unwrap();
        assert!(text.contains("jobtrack_db_query_count 42"));
        assert!(text.contains("jobtrack_db_average_query_milliseconds 12.5"));
        assert!(text.contains("jobtrack_pool_connections 3"));
    }
}
