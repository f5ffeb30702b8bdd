//! Trend classification over a window of snapshots.
//!
//! The rule is applied uniformly: a relative increase beyond 5% is
//! `Degrading`, a decrease beyond 5% is `Improving`, regardless of
//! whether the metric is one where higher is better (cache hit rate is the
//! obvious case).
//!
//! The band is inclusive: a change of exactly 5% (1000 to 1050) is `Stable`,
//! where a strict `|change| < 0.05` comparison would call it `Degrading`.

use super::{MetricsSnapshot, Trend};
use serde::{Deserialize, Serialize};

/// Relative change up to which a metric is reported stable
pub const TREND_BAND: f64 = 0.05;

/// Classify the change from `old_value` to `new_value`.
///
/// With a zero baseline the relative change is unbounded, so the sign of the
/// new value decides: zero stays stable, positive degrades, negative improves.
pub fn calculate_trend(old_value: f64, new_value: f64) -> Trend {
    if old_value == 0.0 {
        return if new_value > 0.0 {
            Trend::Degrading
        } else if new_value < 0.0 {
            Trend::Improving
        } else {
            Trend::Stable
        };
    }

    let change = (new_value - old_value) / old_value;

    if change.abs() <= TREND_BAND {
        Trend::Stable
    } else if change > 0.0 {
        Trend::Degrading
    } else {
        Trend::Improving
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceTrends {
    pub database: Trend,
    pub cache: Trend,
    pub connections: Trend,
    pub api: Trend,
    pub memory: Trend,
}

impl Default for PerformanceTrends {
    fn default() -> Self {
        Self {
            database: Trend::Stable,
            cache: Trend::Stable,
            connections: Trend::Stable,
            api: Trend::Stable,
            memory: Trend::Stable,
        }
    }
}

pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// Compare the oldest and newest snapshot of a chronologically ordered window.
    /// Fewer than two snapshots means there is nothing to compare and every
    /// sub-metric is reported stable.
    pub fn analyze(window: &[MetricsSnapshot]) -> PerformanceTrends {
        let (oldest, newest) = match (window.first(), window.last()) {
            (Some(first), Some(last)) if window.len() >= 2 => (first, last),
            _ => return PerformanceTrends::default(),
        };

        PerformanceTrends {
            database: calculate_trend(
                oldest.database.average_query_time,
                newest.database.average_query_time,
            ),
            cache: calculate_trend(oldest.cache.hit_rate, newest.cache.hit_rate),
            connections: calculate_trend(
                oldest.connections.average_connection_time,
                newest.connections.average_connection_time,
            ),
            api: calculate_trend(
                oldest.api.average_response_time,
                newest.api.average_response_time,
            ),
            memory: calculate_trend(
                oldest.memory.usage_percentage,
                newest.memory.usage_percentage,
            ),
        }
    }
}
