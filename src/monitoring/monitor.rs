use super::{
    classify_health, generate_recommendations, horizon, Alert, AlertEngine, ApiMetrics,
    CacheMetrics, CacheStats, CacheStatsProvider, ConnectionPoolStats, ConnectionStatsProvider,
    ConnectionUsageMetrics, DatabaseMetrics, HistoryStore, MemoryMetrics, MetricsExporter,
    MetricsSnapshot, PerformanceReport, ProcessMemory, ProcessMetricsProvider,
    SysinfoProcessMetrics, TrendAnalyzer,
};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::ticker::PeriodicTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// External collaborators the monitor pulls sub-metrics from
#[derive(Clone)]
pub struct MetricSources {
    cache: Option<Arc<dyn CacheStatsProvider>>,
    connections: Option<Arc<dyn ConnectionStatsProvider>>,
    process: Arc<dyn ProcessMetricsProvider>,
}

impl Default for MetricSources {
    fn default() -> Self {
        Self {
            cache: None,
            connections: None,
            process: Arc::new(SysinfoProcessMetrics::new()),
        }
    }
}

impl MetricSources {
    pub fn with_cache(mut self, cache: Arc<dyn CacheStatsProvider>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_connections(mut self, connections: Arc<dyn ConnectionStatsProvider>) -> Self {
        self.connections = Some(connections);
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessMetricsProvider>) -> Self {
        self.process = process;
        self
    }
}

/// A named custom metric, aggregated per distinct tag set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomMetric {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
    pub updated_at: DateTime<Utc>,
}

impl CustomMetric {
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Result of a timed operation
#[derive(Debug, Clone)]
pub struct Measured<T> {
    pub result: T,
    pub duration: Duration,
}

#[derive(Debug, Default, Clone)]
struct RunningAverage {
    count: u64,
    total_ms: f64,
}

impl RunningAverage {
    fn record(&mut self, ms: f64) {
        self.count += 1;
        self.total_ms += ms;
    }
}

#[derive(Debug, Default)]
struct QueryCounters {
    succeeded: RunningAverage,
    failed: RunningAverage,
    slow: u64,
}

#[derive(Debug, Default)]
struct ApiCounters {
    requests: RunningAverage,
    by_class: HashMap<u16, u64>,
    slow: u64,
}

impl ApiCounters {
    fn errors(&self) -> u64 {
        self.by_class
            .iter()
            .filter(|(class, _)| **class >= 4)
            .map(|(_, count)| count)
            .sum()
    }
}

struct MonitorState {
    queries: QueryCounters,
    api: ApiCounters,
    custom: HashMap<(String, BTreeMap<String, String>), CustomMetric>,
    window_started: Instant,
    history: HistoryStore,
    alerts: AlertEngine,
}

impl MonitorState {
    fn new(config: &MonitorConfig) -> Self {
        Self {
            queries: QueryCounters::default(),
            api: ApiCounters::default(),
            custom: HashMap::new(),
            window_started: Instant::now(),
            history: HistoryStore::new(config.max_history_size),
            alerts: AlertEngine::new(config),
        }
    }

    fn reset_counters(&mut self) {
        self.queries = QueryCounters::default();
        self.api = ApiCounters::default();
        self.window_started = Instant::now();
    }

    fn record_snapshot(&mut self, sample: &SourceSample) -> MetricsSnapshot {
        let snapshot = MetricsSnapshot {
            timestamp: Utc::now(),
            database: database_metrics(&self.queries, &sample.pool),
            cache: cache_metrics(sample.cache.as_ref()),
            connections: connection_metrics(&sample.pool),
            api: api_metrics(&self.api, self.window_started.elapsed()),
            memory: memory_metrics(&sample.process),
        };

        let evicted = self.history.push(snapshot.clone());
        if evicted > 0 {
            debug!(evicted, "Evicted oldest snapshots from history");
        }

        snapshot
    }

    fn check_snapshot(&mut self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let raised = self.alerts.check_thresholds(snapshot);
        self.alerts.prune(Utc::now());
        raised
    }
}

/// Sub-metrics pulled from the external sources for one snapshot
struct SourceSample {
    cache: Option<CacheStats>,
    pool: ConnectionPoolStats,
    process: ProcessMemory,
}

struct MonitorInner {
    config: MonitorConfig,
    sources: MetricSources,
    state: Mutex<MonitorState>,
}

/// Process-wide store of operational metrics, alerts and snapshot history.
///
/// Construct one at startup and share it by reference; every method takes
/// `&self`. Request-path recording is synchronous and only holds the state
/// lock for the duration of a counter update.
pub struct PerformanceMonitor {
    inner: Arc<MonitorInner>,
    ticker: Mutex<Option<PeriodicTask>>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_sources(config, MetricSources::default())
    }

    pub fn with_sources(config: MonitorConfig, sources: MetricSources) -> Self {
        let state = MonitorState::new(&config);
        Self {
            inner: Arc::new(MonitorInner {
                config,
                sources,
                state: Mutex::new(state),
            }),
            ticker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Record a value under `name`, merged with earlier values carrying the same tags
    pub fn record_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        self.inner.record_metric(name, value, tags);
    }

    pub fn record_database_query(&self, duration: Duration, success: bool) {
        let ms = duration.as_secs_f64() * 1000.0;
        let mut state = self.inner.state();

        if success {
            state.queries.succeeded.record(ms);
        } else {
            state.queries.failed.record(ms);
        }

        if ms > self.inner.config.thresholds.slow_query_time_ms {
            state.queries.slow += 1;
            debug!(duration_ms = ms, "Slow database query recorded");
        }
    }

    pub fn record_api_request(&self, duration: Duration, status_code: u16) {
        let ms = duration.as_secs_f64() * 1000.0;
        let mut state = self.inner.state();

        state.api.requests.record(ms);
        *state.api.by_class.entry(status_code / 100).or_insert(0) += 1;

        if ms > self.inner.config.thresholds.slow_api_request_ms {
            state.api.slow += 1;
            debug!(duration_ms = ms, status_code, "Slow API request recorded");
        }
    }

    /// Time `operation`. With a label, a successful run is recorded under the
    /// label and a failed one under `<label>.failed`; the error is returned as is.
    pub async fn measure<F, Fut, T, E>(
        &self,
        label: Option<&str>,
        operation: F,
    ) -> std::result::Result<Measured<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let start = Instant::now();
        let outcome = operation().await;
        let duration = start.elapsed();
        let ms = duration.as_secs_f64() * 1000.0;

        match outcome {
            Ok(result) => {
                if let Some(label) = label {
                    self.record_metric(label, ms, &[]);
                }
                Ok(Measured { result, duration })
            }
            Err(e) => {
                if let Some(label) = label {
                    self.record_metric(&format!("{label}.failed"), ms, &[]);
                }
                Err(e)
            }
        }
    }

    /// Build and store one snapshot. Never fails: a source that errors
    /// contributes neutral values for this call.
    pub async fn collect_metrics(&self) -> MetricsSnapshot {
        self.inner.collect_metrics().await
    }

    /// Evaluate the latest snapshot against the alert thresholds, returning
    /// the alerts raised, then prune alerts past the retention horizon.
    pub fn check_thresholds(&self) -> Vec<Alert> {
        self.inner.check_thresholds()
    }

    /// Evaluate `snapshot` rather than the latest one, then prune
    pub fn check_snapshot(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        self.inner.state().check_snapshot(snapshot)
    }

    /// One collection tick: store a snapshot and check that same snapshot
    /// without another collection landing in between.
    pub async fn collect_and_check(&self) -> Vec<Alert> {
        self.inner.collect_and_check().await
    }

    pub fn get_current_metrics(&self) -> Option<MetricsSnapshot> {
        self.inner.state().history.latest().cloned()
    }

    /// Snapshots collected within the last `minutes`, oldest first
    pub fn get_metrics_history(&self, minutes: u64) -> Vec<MetricsSnapshot> {
        let span = i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX);
        self.inner.state().history.since(horizon(Utc::now(), span))
    }

    /// Alerts raised within the alert window, in insertion order
    pub fn get_active_alerts(&self) -> Vec<Alert> {
        self.inner.state().alerts.active(Utc::now())
    }

    pub fn custom_metrics(&self) -> Vec<CustomMetric> {
        let mut metrics: Vec<CustomMetric> =
            self.inner.state().custom.values().cloned().collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
        metrics
    }

    pub async fn get_performance_report(&self) -> PerformanceReport {
        let current = self.collect_metrics().await;
        let window = self.get_metrics_history(self.inner.config.trend_window_minutes);
        let trends = TrendAnalyzer::analyze(&window);
        let alerts = self.get_active_alerts();
        let recommendations = generate_recommendations(&current, &self.inner.config.thresholds);
        let health = classify_health(&alerts, &self.inner.config.health);

        PerformanceReport {
            generated_at: Utc::now(),
            current,
            trends,
            alerts,
            recommendations,
            health,
        }
    }

    /// Prometheus text for the latest snapshot, collecting one if none exists
    pub async fn export_prometheus(&self) -> Result<String> {
        let snapshot = match self.get_current_metrics() {
            Some(snapshot) => snapshot,
            None => self.collect_metrics().await,
        };
        MetricsExporter::new()?.export(&snapshot)
    }

    /// Restart the database/API running averages and the throughput window
    pub fn reset_counters(&self) {
        self.inner.state().reset_counters();
        debug!("Performance counters reset");
    }

    pub fn is_monitoring(&self) -> bool {
        self.ticker_slot().is_some()
    }

    /// Start the periodic collection tick. A second call while running is a no-op.
    pub fn start_monitoring(&self, interval: Duration) {
        let mut slot = self.ticker_slot();
        if slot.is_some() {
            warn!("Performance monitoring is already running");
            return;
        }

        let inner = self.inner.clone();
        let task = PeriodicTask::spawn("metrics-collection", interval, move || {
            let inner = inner.clone();
            async move {
                inner.collect_and_check().await;
            }
        });

        *slot = Some(task);
        info!(
            interval_ms = interval.as_millis() as u64,
            "Started performance monitoring"
        );
    }

    /// Stop the periodic tick and wait for an in-flight tick to finish
    pub async fn stop_monitoring(&self) {
        let task = self.ticker_slot().take();
        match task {
            Some(task) => {
                task.stop().await;
                info!("Stopped performance monitoring");
            }
            None => warn!("Performance monitoring is not running"),
        }
    }

    /// Stop the tick and clear all metrics, alerts and history
    pub async fn destroy(&self) {
        let task = self.ticker_slot().take();
        if let Some(task) = task {
            task.stop().await;
        }

        let mut state = self.inner.state();
        state.reset_counters();
        state.custom.clear();
        state.alerts.clear();
        state.history.clear();
        debug!("Performance monitor destroyed");
    }

    fn ticker_slot(&self) -> MutexGuard<'_, Option<PeriodicTask>> {
        self.ticker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MonitorInner {
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        let tags: BTreeMap<String, String> = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let now = Utc::now();
        let mut state = self.state();

        state
            .custom
            .entry((name.to_string(), tags.clone()))
            .and_modify(|metric| {
                metric.count += 1;
                metric.sum += value;
                metric.min = metric.min.min(value);
                metric.max = metric.max.max(value);
                metric.last = value;
                metric.updated_at = now;
            })
            .or_insert_with(|| CustomMetric {
                name: name.to_string(),
                tags,
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
                updated_at: now,
            });
    }

    async fn sample_sources(&self) -> SourceSample {
        let cache = self.cache_stats().await;
        let pool = self.pool_stats().await;
        let process = match self.sources.process.memory() {
            Ok(memory) => memory,
            Err(e) => {
                warn!("Process memory unavailable, reporting zeros: {}", e);
                ProcessMemory::default()
            }
        };

        SourceSample {
            cache,
            pool,
            process,
        }
    }

    async fn collect_metrics(&self) -> MetricsSnapshot {
        let sample = self.sample_sources().await;
        self.state().record_snapshot(&sample)
    }

    async fn collect_and_check(&self) -> Vec<Alert> {
        let sample = self.sample_sources().await;
        let mut state = self.state();
        let snapshot = state.record_snapshot(&sample);
        state.check_snapshot(&snapshot)
    }

    fn check_thresholds(&self) -> Vec<Alert> {
        let mut state = self.state();
        let latest = match state.history.latest() {
            Some(snapshot) => snapshot.clone(),
            None => {
                debug!("No snapshot collected yet, skipping threshold check");
                return Vec::new();
            }
        };

        state.check_snapshot(&latest)
    }

    /// `None` when no cache is configured or its stats could not be read
    async fn cache_stats(&self) -> Option<CacheStats> {
        let cache = self.sources.cache.as_ref()?;

        match cache.get_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Cache stats unavailable, reporting zeros: {}", e);
                None
            }
        }
    }

    async fn pool_stats(&self) -> ConnectionPoolStats {
        let Some(connections) = &self.sources.connections else {
            return ConnectionPoolStats::default();
        };

        match connections.connection_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Connection stats unavailable, reporting zeros: {}", e);
                ConnectionPoolStats::default()
            }
        }
    }
}

fn average(total_ms: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_ms / count as f64
    }
}

fn database_metrics(queries: &QueryCounters, pool: &ConnectionPoolStats) -> DatabaseMetrics {
    let query_count = queries.succeeded.count + queries.failed.count;
    let total_ms = queries.succeeded.total_ms + queries.failed.total_ms;
    let utilization = if pool.capacity == 0 {
        0.0
    } else {
        pool.active_connections as f64 / pool.capacity as f64
    };

    DatabaseMetrics {
        query_count,
        average_query_time: average(total_ms, query_count),
        slow_queries: queries.slow,
        connection_pool_utilization: utilization,
        active_connections: pool.active_connections,
        total_connections: pool.total_connections,
    }
}

fn cache_metrics(stats: Option<&CacheStats>) -> CacheMetrics {
    let Some(stats) = stats else {
        return CacheMetrics {
            miss_rate: 1.0,
            ..CacheMetrics::default()
        };
    };

    let hit_rate = stats.hit_rate.unwrap_or(0.0).clamp(0.0, 1.0);
    CacheMetrics {
        reported: stats.hit_rate.is_some(),
        hit_rate,
        miss_rate: 1.0 - hit_rate,
        total_entries: stats.total_entries,
        memory_usage: stats.memory_usage_bytes.unwrap_or(0),
        evictions: stats.expired_entries,
        average_response_time: stats.average_response_time_ms.unwrap_or(0.0),
    }
}

fn connection_metrics(stats: &ConnectionPoolStats) -> ConnectionUsageMetrics {
    ConnectionUsageMetrics {
        pool_size: stats.pool_size,
        active_connections: stats.active_connections,
        idle_connections: stats.idle_connections,
        connection_reuse_rate: stats.reuse_rate,
        average_connection_time: stats.average_connection_time_ms,
        connection_errors: stats.connection_errors,
    }
}

fn api_metrics(api: &ApiCounters, window: Duration) -> ApiMetrics {
    let request_count = api.requests.count;
    let error_rate = if request_count == 0 {
        0.0
    } else {
        api.errors() as f64 / request_count as f64
    };
    // Sub-second windows would inflate throughput
    let seconds = window.as_secs_f64().max(1.0);

    ApiMetrics {
        request_count,
        average_response_time: average(api.requests.total_ms, request_count),
        error_rate,
        slow_requests: api.slow,
        requests_per_second: request_count as f64 / seconds,
    }
}

fn memory_metrics(memory: &ProcessMemory) -> MemoryMetrics {
    MemoryMetrics {
        heap_used: memory.heap_used,
        heap_total: memory.heap_total,
        external: memory.external,
        rss: memory.rss,
        usage_percentage: memory.usage_percentage(),
    }
}
