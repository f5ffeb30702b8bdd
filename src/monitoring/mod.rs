pub mod alerts;
pub mod collectors;
pub mod exporter;
pub mod history;
pub mod monitor;
pub mod report;
pub mod trends;

pub use alerts::*;
pub use collectors::*;
pub use exporter::*;
pub use history::*;
pub use monitor::*;
pub use report::*;
pub use trends::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Point-in-time composite of every monitored sub-system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseMetrics,
    pub cache: CacheMetrics,
    pub connections: ConnectionUsageMetrics,
    pub api: ApiMetrics,
    pub memory: MemoryMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetrics {
    pub query_count: u64,
    /// Milliseconds
    pub average_query_time: f64,
    pub slow_queries: u64,
    /// Fraction (0.0 - 1.0) of pool capacity in use
    pub connection_pool_utilization: f64,
    pub active_connections: u64,
    pub total_connections: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    /// A configured cache source reported a hit rate for this snapshot
    #[serde(default)]
    pub reported: bool,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub total_entries: u64,
    /// Bytes
    pub memory_usage: u64,
    pub evictions: u64,
    /// Milliseconds
    pub average_response_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUsageMetrics {
    pub pool_size: u64,
    pub active_connections: u64,
    pub idle_connections: u64,
    pub connection_reuse_rate: f64,
    /// Milliseconds
    pub average_connection_time: f64,
    pub connection_errors: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetrics {
    pub request_count: u64,
    /// Milliseconds
    pub average_response_time: f64,
    /// Fraction (0.0 - 1.0) of requests answered with 4xx/5xx
    pub error_rate: f64,
    pub slow_requests: u64,
    pub requests_per_second: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub heap_used: u64,
    pub heap_total: u64,
    pub external: u64,
    pub rss: u64,
    pub usage_percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Database,
    Cache,
    Connections,
    Api,
    Memory,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertCategory::Database => "database",
            AlertCategory::Cache => "cache",
            AlertCategory::Connections => "connections",
            AlertCategory::Api => "api",
            AlertCategory::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub severity: AlertSeverity,
    pub category: AlertCategory,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: AlertSeverity,
        category: AlertCategory,
        message: String,
        value: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            category,
            message,
            value,
            threshold,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}
