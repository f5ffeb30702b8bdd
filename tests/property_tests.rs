//! Property-based checks of the history bound, running averages and trends


use approx::relative_eq;
use chrono::{Duration as ChronoDuration, Utc};
use jobtrack_perf::monitoring::{
    calculate_trend, ApiMetrics, CacheMetrics, ConnectionUsageMetrics, DatabaseMetrics,
    HistoryStore, MemoryMetrics,
};
use jobtrack_perf::{MetricsSnapshot, MonitorConfig, Trend};
use proptest::prelude::*;
use std::time::Duration;
use test_helpers::quiet_monitor;

fn snapshot_at(offset_ms: i64) -> MetricsSnapshot {
    MetricsSnapshot {
        timestamp: Utc::now() + ChronoDuration::milliseconds(offset_ms),
        database: DatabaseMetrics::default(),
        cache: CacheMetrics::default(),
        connections: ConnectionUsageMetrics::default(),
        api: ApiMetrics::default(),
        memory: MemoryMetrics::default(),
    }
}

proptest! {
    #[test]
    fn history_never_exceeds_capacity(capacity in 1usize..50, pushes in 0usize..200) {
        let mut history = HistoryStore::new(capacity);
        let snapshots: Vec<MetricsSnapshot> =
            (0..pushes).map(|i| snapshot_at(i as i64)).collect();

        for snapshot in snapshots.iter().cloned() {
            history.push(snapshot);
            prop_assert!(history.len() <= capacity);
        }

        let kept: Vec<_> = history.iter().map(|s| s.timestamp).collect();
        let expected: Vec<_> = snapshots
            .iter()
            .skip(pushes.saturating_sub(capacity))
            .map(|s| s.timestamp)
            .collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn api_average_is_arithmetic_mean(durations in prop::collection::vec(1u64..5_000, 1..40)) {
        let monitor = quiet_monitor(MonitorConfig::default());

        for ms in &durations {
            monitor.record_api_request(Duration::from_millis(*ms), 200);
        }
        let snapshot = tokio_test::block_on(monitor.collect_metrics());

        let mean = durations.iter().sum::<u64>() as f64 / durations.len() as f64;
        prop_assert_eq!(snapshot.api.request_count, durations.len() as u64);
        prop_assert!(relative_eq!(
            snapshot.api.average_response_time,
            mean,
            epsilon = 1e-6
        ));
        prop_assert_eq!(snapshot.api.error_rate, 0.0);
    }

    #[test]
    fn small_relative_changes_are_stable(base in 1.0f64..1e6, ratio in -0.049f64..0.049) {
        prop_assert_eq!(calculate_trend(base, base * (1.0 + ratio)), Trend::Stable);
    }

    #[test]
    fn large_changes_follow_direction(base in 1.0f64..1e6, ratio in 0.06f64..5.0) {
        prop_assert_eq!(calculate_trend(base, base * (1.0 + ratio)), Trend::Degrading);
        prop_assert_eq!(calculate_trend(base, base * (1.0 - ratio.min(0.99))), Trend::Improving);
    }
}

#[test]
fn trend_boundaries() {
    assert_eq!(calculate_trend(1000.0, 1050.0), Trend::Stable);
    assert_eq!(calculate_trend(1000.0, 950.0), Trend::Stable);
    assert_eq!(calculate_trend(1000.0, 1051.0), Trend::Degrading);
    assert_eq!(calculate_trend(1000.0, 1200.0), Trend::Degrading);
    assert_eq!(calculate_trend(1000.0, 800.0), Trend::Improving);
}
