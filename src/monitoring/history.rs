use super::MetricsSnapshot;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// `now - span`, clamped to the earliest representable instant
pub fn horizon(now: DateTime<Utc>, span: chrono::Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Bounded, time-ordered ring buffer of snapshots.
///
/// Snapshots are appended in collection order; once `capacity` is exceeded the
/// oldest entry is dropped first.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    snapshots: VecDeque<MetricsSnapshot>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot, returning how many old entries were evicted
    pub fn push(&mut self, snapshot: MetricsSnapshot) -> usize {
        self.snapshots.push_back(snapshot);

        let mut evicted = 0;
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.snapshots.back()
    }

    /// Snapshots with `timestamp > cutoff`, oldest first
    pub fn since(&self, cutoff: DateTime<Utc>) -> Vec<MetricsSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.timestamp > cutoff)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricsSnapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{
        ApiMetrics, CacheMetrics, ConnectionUsageMetrics, DatabaseMetrics, MemoryMetrics,
    };
    use chrono::Duration;

    fn snapshot_at(timestamp: DateTime<Utc>, query_count: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp,
            database: DatabaseMetrics {
                query_count,
                ..Default::default()
            },
            cache: CacheMetrics::default(),
            connections: ConnectionUsageMetrics::default(),
            api: ApiMetrics::default(),
            memory: MemoryMetrics::default(),
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let mut store = HistoryStore::new(3);
        let base = Utc::now();

        for i in 0..5 {
            store.push(snapshot_at(base + Duration::seconds(i), i as u64));
        }

        assert_eq!(store.len(), 3);
        let counts: Vec<u64> = store.iter().map(|s| s.database.query_count).collect();
        assert_eq!(counts, vec![2, 3, 4]);
        assert_eq!(store.latest().unwrap().database.query_count, 4);
    }

    #[test]
    fn test_since_is_exclusive_and_ordered() {
        let mut store = HistoryStore::new(10);
        let base = Utc::now() - Duration::minutes(10);

        for i in 0..5 {
            store.push(snapshot_at(base + Duration::minutes(i * 2), i as u64));
        }

        let cutoff = base + Duration::minutes(4);
        let recent = store.since(cutoff);
        let counts: Vec<u64> = recent.iter().map(|s| s.database.query_count).collect();
        assert_eq!(counts, vec![3, 4]);
    }

    #[test]
    fn test_clear_and_empty() {
        let mut store = HistoryStore::new(2);
        assert!(store.is_empty());
        assert!(store.latest().is_none());

        store.push(snapshot_at(Utc::now(), 1));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 2);
    }
}
