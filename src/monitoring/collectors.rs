//! Sources the monitor pulls sub-metrics from on every collection tick.
//!
//! The cache and connection-pool sources are owned by other parts of the
//! application; the monitor only sees them through these traits. A source that
//! errors degrades to neutral values for that tick.

use crate::error::{PerfError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use sysinfo::{Pid, System};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub total_entries: u64,
    pub expired_entries: u64,
    pub active_entries: u64,
    /// Fraction (0.0 - 1.0); absent when the cache does not track hits
    pub hit_rate: Option<f64>,
    pub memory_usage_bytes: Option<u64>,
    pub average_response_time_ms: Option<f64>,
}

#[async_trait]
pub trait CacheStatsProvider: Send + Sync {
    async fn get_stats(&self) -> Result<CacheStats>;
}

/// Aggregate view of every pool a connection source manages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionPoolStats {
    /// Tracked connections across all pools
    pub pool_size: u64,
    pub active_connections: u64,
    pub idle_connections: u64,
    /// Cumulative connections created, overflow included
    pub total_connections: u64,
    /// Maximum tracked connections across all pools
    pub capacity: u64,
    pub reuse_rate: f64,
    pub average_connection_time_ms: f64,
    pub connection_errors: u64,
}

#[async_trait]
pub trait ConnectionStatsProvider: Send + Sync {
    async fn connection_stats(&self) -> Result<ConnectionPoolStats>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessMemory {
    pub heap_used: u64,
    pub heap_total: u64,
    pub external: u64,
    pub rss: u64,
}

impl ProcessMemory {
    pub fn usage_percentage(&self) -> f64 {
        if self.heap_total == 0 {
            return 0.0;
        }
        (self.heap_used as f64 / self.heap_total as f64) * 100.0
    }
}

pub trait ProcessMetricsProvider: Send + Sync {
    fn memory(&self) -> Result<ProcessMemory>;
}

/// Process memory read through `sysinfo`.
///
/// The process resident set is reported as `heap_used`/`rss`, system memory as
/// `heap_total`, and the non-resident part of the virtual size as `external`.
pub struct SysinfoProcessMetrics {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl Default for SysinfoProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProcessMetrics {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl ProcessMetricsProvider for SysinfoProcessMetrics {
    fn memory(&self) -> Result<ProcessMemory> {
        let pid = self
            .pid
            .ok_or_else(|| PerfError::source_failed("process", "current pid unavailable"))?;

        let mut sys = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sys.refresh_memory();

        if !sys.refresh_process(pid) {
            return Err(PerfError::source_failed(
                "process",
                format!("process {pid} not found"),
            ));
        }

        let total_memory = sys.total_memory();
        let process = sys
            .process(pid)
            .ok_or_else(|| PerfError::source_failed("process", format!("process {pid} not found")))?;

        let rss = process.memory();
        Ok(ProcessMemory {
            heap_used: rss,
            heap_total: total_memory,
            external: process.virtual_memory().saturating_sub(rss),
            rss,
        })
    }
}

/// Fixed figures, for wiring that has no real process source
#[derive(Debug, Clone, Default)]
pub struct StaticProcessMetrics(pub ProcessMemory);

impl ProcessMetricsProvider for StaticProcessMetrics {
    fn memory(&self) -> Result<ProcessMemory> {
        Ok(self.0.clone())
    }
}
