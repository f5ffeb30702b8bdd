//! Bounded per-type pools of reusable backend-client handles.
//!
//! Client construction is delegated to a [`ConnectionFactory`]; the pool only
//! decides when a handle may be reused, when a new one is created, and when a
//! stale one is dropped.

pub mod connection_pool;

pub use connection_pool::*;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Creates backend clients for a named pool type ("primary", "secondary", ...)
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    async fn create(&self, pool_type: &str) -> Result<Self::Client>;
}

/// Aggregate counters for one pool type.
///
/// `total_connections` and `connection_creations` are cumulative and include
/// overflow connections; `pooled_connections` is the tracked list length.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub pooled_connections: u64,
    pub connection_creations: u64,
    pub connection_reuses: u64,
    /// Milliseconds, over the response-time windows of tracked connections
    pub average_response_time: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub connection_errors: u64,
}

/// A tracked client handle and its lifecycle metadata
#[derive(Debug)]
pub struct PooledConnection<C> {
    client: Arc<C>,
    created_at: Instant,
    last_used: Instant,
    reuse_count: u32,
    is_active: bool,
    response_times: VecDeque<f64>,
}

impl<C> PooledConnection<C> {
    /// A freshly created connection, already checked out
    pub fn new(client: Arc<C>, now: Instant) -> Self {
        Self {
            client,
            created_at: now,
            last_used: now,
            reuse_count: 0,
            is_active: true,
            response_times: VecDeque::new(),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn reuse_count(&self) -> u32 {
        self.reuse_count
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    pub fn is_retired(&self, max_reuse_count: u32) -> bool {
        self.reuse_count >= max_reuse_count
    }

    pub fn is_reusable(&self, now: Instant, idle_timeout: Duration, max_reuse_count: u32) -> bool {
        !self.is_active && !self.is_retired(max_reuse_count) && self.idle_for(now) < idle_timeout
    }

    pub(crate) fn checkout(&mut self, now: Instant) {
        self.is_active = true;
        self.last_used = now;
        self.reuse_count += 1;
    }

    pub(crate) fn checkin(&mut self, now: Instant) {
        self.is_active = false;
        self.last_used = now;
    }

    /// Push a sample, keeping at most `window` of the most recent
    pub(crate) fn record_response_time(&mut self, ms: f64, window: usize) {
        self.response_times.push_back(ms);
        while self.response_times.len() > window.max(1) {
            self.response_times.pop_front();
        }
    }

    pub fn response_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.response_times.iter().copied()
    }

    pub fn average_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
    }
}

/// Read-only view of a tracked connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub reuse_count: u32,
    pub is_active: bool,
    pub age_ms: u64,
    pub idle_ms: u64,
    pub response_samples: usize,
    pub average_response_time: f64,
}

impl<C> PooledConnection<C> {
    pub fn details(&self, now: Instant) -> ConnectionDetails {
        ConnectionDetails {
            reuse_count: self.reuse_count,
            is_active: self.is_active,
            age_ms: self.age(now).as_millis() as u64,
            idle_ms: self.idle_for(now).as_millis() as u64,
            response_samples: self.response_times.len(),
            average_response_time: self.average_response_time(),
        }
    }
}
