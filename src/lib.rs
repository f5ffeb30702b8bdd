pub mod config;
pub mod error;
pub mod monitoring;
pub mod pool;
pub mod ticker;

pub use config::{AlertThresholds, Config, HealthPolicy, MonitorConfig, PoolConfig};
pub use error::{PerfError, Result};
pub use ticker::PeriodicTask;

// Re-export monitoring types
pub use monitoring::{
    Alert, AlertCategory, AlertSeverity, CacheStats, CacheStatsProvider, ConnectionPoolStats,
    ConnectionStatsProvider, CustomMetric, HealthStatus, Measured, MetricSources,
    MetricsExporter, MetricsSnapshot, PerformanceMonitor, PerformanceReport, PerformanceTrends,
    ProcessMemory, ProcessMetricsProvider, StaticProcessMetrics, SysinfoProcessMetrics, Trend,
};

// Re-export pool types
pub use pool::{
    ConnectionDetails, ConnectionFactory, ConnectionLease, ConnectionMetrics, ConnectionPool,
    PooledConnection,
};
