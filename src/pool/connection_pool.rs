use super::{ConnectionDetails, ConnectionFactory, ConnectionMetrics, PooledConnection};
use crate::config::PoolConfig;
use crate::error::{PerfError, Result};
use crate::monitoring::{ConnectionPoolStats, ConnectionStatsProvider};
use crate::ticker::PeriodicTask;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct Pool<C> {
    connections: Vec<PooledConnection<C>>,
    metrics: ConnectionMetrics,
    /// Tracked slots reserved by acquisitions waiting on the factory
    pending: usize,
}

impl<C> Default for Pool<C> {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            metrics: ConnectionMetrics::default(),
            pending: 0,
        }
    }
}

impl<C> Pool<C> {
    fn find_tracked(&mut self, client: &Arc<C>) -> Option<&mut PooledConnection<C>> {
        self.connections
            .iter_mut()
            .find(|conn| Arc::ptr_eq(conn.client(), client))
    }

    /// Drop idle connections matching `stale`. Active connections are never evicted.
    fn evict<P>(&mut self, mut stale: P) -> usize
    where
        P: FnMut(&PooledConnection<C>) -> bool,
    {
        let before = self.connections.len();
        self.connections.retain(|conn| conn.is_active() || !stale(conn));
        let removed = before - self.connections.len();

        if removed > 0 {
            self.metrics.pooled_connections = self.connections.len() as u64;
            self.refresh_average_response_time();
        }
        removed
    }

    fn refresh_average_response_time(&mut self) {
        let (sum, count) = self
            .connections
            .iter()
            .flat_map(|conn| conn.response_times())
            .fold((0.0, 0usize), |(sum, count), ms| (sum + ms, count + 1));

        self.metrics.average_response_time = if count == 0 {
            0.0
        } else {
            sum / count as f64
        };
    }
}

/// A tracked slot reserved before the factory call. Dropping it uncommitted,
/// as when the acquiring future is cancelled mid-create, returns the slot.
struct SlotReservation<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
    pool_type: &'a str,
    held: bool,
}

impl<F: ConnectionFactory> SlotReservation<'_, F> {
    /// Hand the slot back under an already held lock
    fn commit(&mut self, pool: &mut Pool<F::Client>) {
        if self.held {
            pool.pending = pool.pending.saturating_sub(1);
            self.held = false;
        }
    }
}

impl<F: ConnectionFactory> Drop for SlotReservation<'_, F> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let mut state = self.inner.state();
        if let Some(pool) = state.pools.get_mut(self.pool_type) {
            pool.pending = pool.pending.saturating_sub(1);
        }
        debug!(pool_type = %self.pool_type, "Released reserved slot of abandoned acquisition");
    }
}

struct PoolState<C> {
    pools: HashMap<String, Pool<C>>,
    destroyed: bool,
}

struct PoolInner<F: ConnectionFactory> {
    config: PoolConfig,
    factory: F,
    state: Mutex<PoolState<F::Client>>,
}

/// Keyed set of bounded client pools with reuse, overflow and eviction policy.
///
/// Acquisition order for a pool type: reuse an idle, unretired connection that
/// has not passed the idle timeout; else create a tracked one while the pool has
/// room; else create an untracked overflow connection. Overflow connections
/// count towards the cumulative counters only and are never reused.
pub struct ConnectionPool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
    sweeper: Mutex<Option<PeriodicTask>>,
}

/// A checked-out tracked or overflow connection, released on drop
pub struct ConnectionLease<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
    client: Arc<F::Client>,
    pool_type: String,
    acquired_at: Instant,
}

impl<F: ConnectionFactory> ConnectionLease<F> {
    pub fn client(&self) -> Arc<F::Client> {
        self.client.clone()
    }

    pub fn pool_type(&self) -> &str {
        &self.pool_type
    }
}

impl<F: ConnectionFactory> Drop for ConnectionLease<F> {
    fn drop(&mut self) {
        let elapsed = self.acquired_at.elapsed();
        self.inner
            .release(&self.client, &self.pool_type, Some(elapsed));
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                state: Mutex::new(PoolState {
                    pools: HashMap::new(),
                    destroyed: false,
                }),
            }),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Hand out a client for `pool_type`. Factory failures propagate unchanged.
    pub async fn get_connection(&self, pool_type: &str) -> Result<Arc<F::Client>> {
        self.inner.acquire(pool_type).await
    }

    /// Return a client obtained from `get_connection`. Unknown or overflow
    /// handles are logged and ignored.
    pub fn release_connection(&self, client: &Arc<F::Client>, pool_type: &str) {
        self.inner.release(client, pool_type, None);
    }

    /// Acquire a connection wrapped in a guard that releases it when dropped
    pub async fn lease(&self, pool_type: &str) -> Result<ConnectionLease<F>> {
        let client = self.inner.acquire(pool_type).await?;
        Ok(ConnectionLease {
            inner: self.inner.clone(),
            client,
            pool_type: pool_type.to_string(),
            acquired_at: Instant::now(),
        })
    }

    /// Run `operation` on a pooled client. The client is released on every
    /// exit path. Cancelling the returned future releases the client, or the
    /// reserved slot when cancelled while the factory is still creating it.
    pub async fn execute<Op, Fut, T, E>(
        &self,
        pool_type: &str,
        operation: Op,
    ) -> std::result::Result<T, E>
    where
        Op: FnOnce(Arc<F::Client>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<PerfError>,
    {
        let lease = self.lease(pool_type).await?;
        let result = operation(lease.client()).await;
        drop(lease);
        result
    }

    pub fn get_metrics(&self, pool_type: &str) -> Option<ConnectionMetrics> {
        self.inner
            .state()
            .pools
            .get(pool_type)
            .map(|pool| pool.metrics.clone())
    }

    pub fn get_all_metrics(&self) -> BTreeMap<String, ConnectionMetrics> {
        self.inner
            .state()
            .pools
            .iter()
            .map(|(pool_type, pool)| (pool_type.clone(), pool.metrics.clone()))
            .collect()
    }

    /// Lifecycle view of every tracked connection of `pool_type`, in pool order
    pub fn connection_details(&self, pool_type: &str) -> Vec<ConnectionDetails> {
        let now = Instant::now();
        self.inner
            .state()
            .pools
            .get(pool_type)
            .map(|pool| pool.connections.iter().map(|c| c.details(now)).collect())
            .unwrap_or_default()
    }

    /// Remove idle connections past the idle timeout, returning how many were removed
    pub fn clear_idle_connections(&self) -> usize {
        self.inner.clear_idle_connections()
    }

    /// One health-check sweep: evict aged, long-idle and retired connections,
    /// then clear idle ones. Returns the number removed.
    pub fn run_health_check(&self) -> usize {
        self.inner.run_health_check()
    }

    pub fn is_health_check_running(&self) -> bool {
        self.sweeper_slot().is_some()
    }

    /// Start the periodic health-check sweep. A second call while running is a no-op.
    pub fn start_health_checks(&self) {
        let mut slot = self.sweeper_slot();
        if slot.is_some() {
            warn!("Connection pool health checks are already running");
            return;
        }

        let interval = self.inner.config.health_check_interval();
        let inner = self.inner.clone();
        let task = PeriodicTask::spawn("pool-health-check", interval, move || {
            let inner = inner.clone();
            async move {
                inner.run_health_check();
            }
        });

        *slot = Some(task);
        info!(
            interval_ms = interval.as_millis() as u64,
            "Started connection pool health checks"
        );
    }

    pub async fn stop_health_checks(&self) {
        let task = self.sweeper_slot().take();
        match task {
            Some(task) => {
                task.stop().await;
                info!("Stopped connection pool health checks");
            }
            None => warn!("Connection pool health checks are not running"),
        }
    }

    /// Stop the sweep and drop every pool. Later acquisitions fail with
    /// `PoolDestroyed`. Safe to call more than once.
    pub async fn destroy(&self) {
        let task = self.sweeper_slot().take();
        if let Some(task) = task {
            task.stop().await;
        }

        let mut state = self.inner.state();
        if !state.destroyed {
            let dropped: usize = state.pools.values().map(|p| p.connections.len()).sum();
            state.pools.clear();
            state.destroyed = true;
            info!(dropped, "Connection pool destroyed");
        }
    }

    fn sweeper_slot(&self) -> MutexGuard<'_, Option<PeriodicTask>> {
        self.sweeper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<F: ConnectionFactory> PoolInner<F> {
    fn state(&self) -> MutexGuard<'_, PoolState<F::Client>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn acquire(&self, pool_type: &str) -> Result<Arc<F::Client>> {
        let tracked = {
            let mut state = self.state();
            if state.destroyed {
                return Err(PerfError::PoolDestroyed);
            }

            let now = Instant::now();
            let idle_timeout = self.config.idle_timeout();
            let max_reuse = self.config.max_reuse_count;
            let pool = state.pools.entry(pool_type.to_string()).or_default();

            if let Some(conn) = pool
                .connections
                .iter_mut()
                .find(|conn| conn.is_reusable(now, idle_timeout, max_reuse))
            {
                conn.checkout(now);
                let client = conn.client().clone();
                let reuse_count = conn.reuse_count();

                pool.metrics.active_connections += 1;
                pool.metrics.connection_reuses += 1;
                pool.metrics.last_activity = Some(Utc::now());
                debug!(pool_type = %pool_type, reuse_count, "Reusing pooled connection");
                return Ok(client);
            }

            let has_room = pool.connections.len() + pool.pending < self.config.max_connections;
            if has_room {
                pool.pending += 1;
            }
            has_room
        };

        let mut reservation = SlotReservation {
            inner: self,
            pool_type,
            held: tracked,
        };

        // The lock is not held across the factory call
        let created = self.factory.create(pool_type).await;

        let mut state = self.state();
        if state.destroyed {
            reservation.held = false;
            return Err(PerfError::PoolDestroyed);
        }

        let pool = state.pools.entry(pool_type.to_string()).or_default();
        reservation.commit(pool);

        let client = match created {
            Ok(client) => Arc::new(client),
            Err(e) => {
                pool.metrics.connection_errors += 1;
                warn!(pool_type = %pool_type, "Failed to create connection: {}", e);
                return Err(e);
            }
        };

        pool.metrics.total_connections += 1;
        pool.metrics.connection_creations += 1;
        pool.metrics.last_activity = Some(Utc::now());

        if tracked {
            pool.connections
                .push(PooledConnection::new(client.clone(), Instant::now()));
            pool.metrics.active_connections += 1;
            pool.metrics.pooled_connections = pool.connections.len() as u64;
            debug!(
                pool_type = %pool_type,
                pooled = pool.connections.len(),
                "Created pooled connection"
            );
        } else {
            warn!(
                pool_type = %pool_type,
                max_connections = self.config.max_connections,
                "Pool at capacity, created untracked overflow connection"
            );
        }

        Ok(client)
    }

    fn release(&self, client: &Arc<F::Client>, pool_type: &str, elapsed: Option<Duration>) {
        let window = self.config.response_time_window;
        let mut state = self.state();

        let Some(pool) = state.pools.get_mut(pool_type) else {
            warn!(pool_type = %pool_type, "Release for unknown pool type ignored");
            return;
        };

        let now = Instant::now();
        let released = match pool.find_tracked(client) {
            Some(conn) if conn.is_active() => {
                if let Some(elapsed) = elapsed {
                    conn.record_response_time(elapsed.as_secs_f64() * 1000.0, window);
                }
                conn.checkin(now);
                true
            }
            _ => false,
        };

        if !released {
            warn!(pool_type = %pool_type, "Release of untracked connection ignored");
            return;
        }

        pool.metrics.active_connections = pool.metrics.active_connections.saturating_sub(1);
        pool.metrics.last_activity = Some(Utc::now());
        if elapsed.is_some() {
            pool.refresh_average_response_time();
        }
    }

    fn clear_idle_connections(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout();
        let mut state = self.state();

        let mut removed = 0;
        for (pool_type, pool) in state.pools.iter_mut() {
            let evicted = pool.evict(|conn| conn.idle_for(now) > idle_timeout);
            if evicted > 0 {
                debug!(pool_type = %pool_type, evicted, "Cleared idle connections");
            }
            removed += evicted;
        }
        removed
    }

    fn run_health_check(&self) -> usize {
        let now = Instant::now();
        let max_age = self.config.max_connection_age();
        let stale_idle = self.config.idle_timeout().saturating_mul(2);
        let max_reuse = self.config.max_reuse_count;

        let mut removed = 0;
        {
            let mut state = self.state();
            for (pool_type, pool) in state.pools.iter_mut() {
                let evicted = pool.evict(|conn| {
                    conn.age(now) > max_age
                        || conn.idle_for(now) > stale_idle
                        || conn.is_retired(max_reuse)
                });
                if evicted > 0 {
                    debug!(pool_type = %pool_type, evicted, "Evicted stale connections");
                }
                removed += evicted;
            }
        }

        removed += self.clear_idle_connections();
        if removed > 0 {
            info!(removed, "Connection pool health check evicted connections");
        }
        removed
    }

    fn stats(&self) -> ConnectionPoolStats {
        let state = self.state();
        let mut stats = ConnectionPoolStats::default();
        let mut reuses = 0u64;
        let (mut sample_sum, mut sample_count) = (0.0, 0usize);

        for pool in state.pools.values() {
            let tracked = pool.connections.len() as u64;
            let active = pool.connections.iter().filter(|c| c.is_active()).count() as u64;

            stats.pool_size += tracked;
            stats.active_connections += active;
            stats.idle_connections += tracked - active;
            stats.total_connections += pool.metrics.total_connections;
            stats.capacity += self.config.max_connections as u64;
            stats.connection_errors += pool.metrics.connection_errors;
            reuses += pool.metrics.connection_reuses;

            for ms in pool.connections.iter().flat_map(|c| c.response_times()) {
                sample_sum += ms;
                sample_count += 1;
            }
        }

        let acquisitions = reuses + stats.total_connections;
        if acquisitions > 0 {
            stats.reuse_rate = reuses as f64 / acquisitions as f64;
        }
        if sample_count > 0 {
            stats.average_connection_time_ms = sample_sum / sample_count as f64;
        }
        stats
    }
}

#[async_trait]
impl<F: ConnectionFactory> ConnectionStatsProvider for ConnectionPool<F> {
    async fn connection_stats(&self) -> Result<ConnectionPoolStats> {
        Ok(self.inner.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tracing_test::traced_test;

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicU64,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        type Client = u64;

        async fn create(&self, pool_type: &str) -> Result<u64> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PerfError::factory(pool_type, "backend unreachable"));
            }
            Ok(self.created.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn pool_with(config: PoolConfig) -> ConnectionPool<CountingFactory> {
        ConnectionPool::new(CountingFactory::default(), config)
    }

    fn created(pool: &ConnectionPool<CountingFactory>) -> u64 {
        pool.factory().created.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_sequential_executes_reuse_one_connection() {
        let pool = pool_with(PoolConfig {
            max_connections: 2,
            ..PoolConfig::default()
        });

        for _ in 0..3 {
            let id = pool
                .execute("x", |client| async move { Ok::<_, PerfError>(*client) })
                .await
                .unwrap();
            assert_eq!(id, 1);
        }

        assert_eq!(created(&pool), 1);
        let details = pool.connection_details("x");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].reuse_count, 2);
        assert!(!details[0].is_active);
        assert_eq!(details[0].response_samples, 3);

        let metrics = pool.get_metrics("x").unwrap();
        assert_eq!(metrics.connection_creations, 1);
        assert_eq!(metrics.connection_reuses, 2);
        assert_eq!(metrics.active_connections, 0);
        assert!(metrics.last_activity.is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_overflow_connection_is_untracked() {
        let pool = pool_with(PoolConfig {
            max_connections: 1,
            ..PoolConfig::default()
        });

        let first = pool.get_connection("x").await.unwrap();
        let second = pool.get_connection("x").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(logs_contain("overflow"));

        let metrics = pool.get_metrics("x").unwrap();
        assert_eq!(metrics.pooled_connections, 1);
        assert_eq!(metrics.total_connections, 2);
        assert_eq!(metrics.active_connections, 1);

        pool.release_connection(&second, "x");
        assert!(logs_contain("Release of untracked connection ignored"));
        assert_eq!(pool.get_metrics("x").unwrap(), metrics);

        pool.release_connection(&first, "x");
        assert_eq!(pool.get_metrics("x").unwrap().active_connections, 0);
    }

    #[tokio::test]
    async fn test_idle_connection_is_not_reused_after_sweep() {
        let pool = pool_with(PoolConfig {
            idle_timeout_ms: 20,
            ..PoolConfig::default()
        });

        let client = pool.get_connection("x").await.unwrap();
        pool.release_connection(&client, "x");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(pool.run_health_check(), 1);
        assert_eq!(pool.get_metrics("x").unwrap().pooled_connections, 0);

        let next = pool.get_connection("x").await.unwrap();
        assert!(!Arc::ptr_eq(&client, &next));
        assert_eq!(created(&pool), 2);
    }

    #[tokio::test]
    async fn test_clear_idle_keeps_active_and_fresh() {
        let pool = pool_with(PoolConfig {
            idle_timeout_ms: 30,
            ..PoolConfig::default()
        });

        let busy = pool.get_connection("x").await.unwrap();
        let stale = pool.get_connection("x").await.unwrap();
        pool.release_connection(&stale, "x");
        tokio::time::sleep(Duration::from_millis(60)).await;

        let fresh = pool.get_connection("x").await.unwrap();
        pool.release_connection(&fresh, "x");

        assert_eq!(pool.clear_idle_connections(), 1);
        let details = pool.connection_details("x");
        assert_eq!(details.len(), 2);
        assert!(details[0].is_active);
        assert_eq!(pool.get_metrics("x").unwrap().pooled_connections, 2);

        pool.release_connection(&busy, "x");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_release_of_unknown_handle_is_ignored() {
        let pool = pool_with(PoolConfig::default());
        let client = pool.get_connection("x").await.unwrap();
        let before = pool.get_metrics("x").unwrap();

        pool.release_connection(&Arc::new(999), "x");
        pool.release_connection(&client, "missing");

        assert_eq!(pool.get_metrics("x").unwrap(), before);
        assert!(logs_contain("Release of untracked connection ignored"));
        assert!(logs_contain("Release for unknown pool type ignored"));
    }

    #[tokio::test]
    async fn test_factory_failure_propagates() {
        let pool = pool_with(PoolConfig::default());
        pool.factory().failing.store(true, Ordering::SeqCst);

        let err = pool.get_connection("x").await.unwrap_err();
        assert!(matches!(err, PerfError::ConnectionFactory { .. }));

        let mut ran = false;
        let result = pool
            .execute("x", |_client| {
                ran = true;
                async { Ok::<_, PerfError>(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!ran);

        let metrics = pool.get_metrics("x").unwrap();
        assert_eq!(metrics.connection_errors, 2);
        assert_eq!(metrics.total_connections, 0);

        // A failed creation frees its reserved slot
        pool.factory().failing.store(false, Ordering::SeqCst);
        assert!(pool.get_connection("x").await.is_ok());
        assert_eq!(pool.get_metrics("x").unwrap().pooled_connections, 1);
    }

    #[tokio::test]
    async fn test_execute_releases_on_error() {
        let pool = pool_with(PoolConfig::default());

        let result: std::result::Result<(), PerfError> = pool
            .execute("x", |_client| async {
                Err(PerfError::Operation("query failed".to_string()))
            })
            .await;
        assert!(matches!(result, Err(PerfError::Operation(_))));

        let details = pool.connection_details("x");
        assert_eq!(details.len(), 1);
        assert!(!details[0].is_active);
        assert_eq!(pool.get_metrics("x").unwrap().active_connections, 0);
    }

    #[tokio::test]
    async fn test_retired_connection_is_replaced_and_swept() {
        let pool = pool_with(PoolConfig {
            max_reuse_count: 1,
            ..PoolConfig::default()
        });

        for _ in 0..3 {
            let client = pool.get_connection("x").await.unwrap();
            pool.release_connection(&client, "x");
        }

        assert_eq!(created(&pool), 2);
        assert_eq!(pool.run_health_check(), 1);
        let details = pool.connection_details("x");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].reuse_count, 0);
    }

    #[tokio::test]
    async fn test_health_check_with_unbounded_idle_timeout() {
        let pool = pool_with(PoolConfig {
            idle_timeout_ms: u64::MAX,
            ..PoolConfig::default()
        });
        let client = pool.get_connection("x").await.unwrap();
        pool.release_connection(&client, "x");

        assert_eq!(pool.run_health_check(), 0);
        assert_eq!(pool.connection_details("x").len(), 1);
    }

    #[tokio::test]
    async fn test_pools_are_independent_per_type() {
        let pool = pool_with(PoolConfig::default());
        let primary = pool.get_connection("primary").await.unwrap();
        pool.release_connection(&primary, "primary");

        let secondary = pool.get_connection("secondary").await.unwrap();
        assert!(!Arc::ptr_eq(&primary, &secondary));

        let all = pool.get_all_metrics();
        assert_eq!(all.len(), 2);
        assert_eq!(all["primary"].active_connections, 0);
        assert_eq!(all["secondary"].active_connections, 1);
    }

    #[tokio::test]
    async fn test_stats_provider_aggregates_pools() {
        let pool = pool_with(PoolConfig {
            max_connections: 4,
            ..PoolConfig::default()
        });

        let held = pool.get_connection("primary").await.unwrap();
        pool.execute("secondary", |_c| async { Ok::<_, PerfError>(()) })
            .await
            .unwrap();
        pool.execute("secondary", |_c| async { Ok::<_, PerfError>(()) })
            .await
            .unwrap();

        let stats = pool.connection_stats().await.unwrap();
        assert_eq!(stats.pool_size, 2);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.capacity, 8);
        assert!((stats.reuse_rate - 1.0 / 3.0).abs() < 1e-9);

        pool.release_connection(&held, "primary");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_background_sweep_and_destroy() {
        let pool = pool_with(PoolConfig {
            idle_timeout_ms: 5,
            health_check_interval_ms: 10,
            ..PoolConfig::default()
        });

        let client = pool.get_connection("x").await.unwrap();
        pool.release_connection(&client, "x");

        pool.start_health_checks();
        pool.start_health_checks();
        assert!(logs_contain("already running"));
        assert!(pool.is_health_check_running());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(pool.connection_details("x").is_empty());

        pool.destroy().await;
        pool.destroy().await;
        assert!(!pool.is_health_check_running());
        assert!(pool.get_all_metrics().is_empty());
        assert!(matches!(
            pool.get_connection("x").await,
            Err(PerfError::PoolDestroyed)
        ));
    }
}
