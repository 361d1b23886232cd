//! Command metrics with a smoothed latency average

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Category bucket for commands that matched no pattern
pub const UNMATCHED_BUCKET: &str = "unmatched";

/// Default EMA smoothing factor
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Counters and latency average
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_commands: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Exponential moving average of processing time
    pub average_processing_time_ms: f64,
    pub per_category: BTreeMap<String, u64>,
}

impl Metrics {
    /// Fraction of recorded commands that succeeded (0 when none recorded)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_commands == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total_commands as f64
        }
    }
}

/// Accumulates [`Metrics`] and paces snapshot emission
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: Metrics,
    alpha: f64,
    snapshot_interval: Duration,
    last_snapshot: Instant,
}

impl MetricsCollector {
    #[must_use]
    pub fn new(alpha: f64, snapshot_interval: Duration, now: Instant) -> Self {
        Self {
            metrics: Metrics::default(),
            alpha: if alpha.is_nan() {
                DEFAULT_ALPHA
            } else {
                alpha.clamp(f64::MIN_POSITIVE, 1.0)
            },
            snapshot_interval,
            last_snapshot: now,
        }
    }

    /// Record a completed attempt
    ///
    /// Returns a snapshot when one is due, at most once per snapshot interval.
    pub fn record(&mut self, bucket: &str, success: bool, elapsed: Duration, now: Instant) -> Option<Metrics> {
        let sample = elapsed.as_secs_f64() * 1000.0;

        self.metrics.average_processing_time_ms = if self.metrics.total_commands == 0 {
            sample
        } else {
            self.alpha
                .mul_add(sample, (1.0 - self.alpha) * self.metrics.average_processing_time_ms)
        };

        self.metrics.total_commands += 1;
        if success {
            self.metrics.succeeded += 1;
        } else {
            self.metrics.failed += 1;
        }
        *self
            .metrics
            .per_category
            .entry(bucket.to_string())
            .or_default() += 1;

        if now.saturating_duration_since(self.last_snapshot) >= self.snapshot_interval {
            self.last_snapshot = now;
            return Some(self.metrics.clone());
        }
        None
    }

    #[must_use]
    pub fn snapshot(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Clear all counters and restart the snapshot interval
    pub fn reset(&mut self, now: Instant) {
        self.metrics = Metrics::default();
        self.last_snapshot = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(now: Instant) -> MetricsCollector {
        MetricsCollector::new(DEFAULT_ALPHA, Duration::from_secs(60), now)
    }

    #[test]
    fn ema_seeds_with_first_sample() {
        let now = Instant::now();
        let mut metrics = collector(now);
        metrics.record("navigation", true, Duration::from_millis(40), now);
        assert!((metrics.snapshot().average_processing_time_ms - 40.0).abs() < 1e-9);
    }

    #[test]
    fn nan_alpha_falls_back_to_default() {
        let now = Instant::now();
        let mut metrics = MetricsCollector::new(f64::NAN, Duration::from_secs(60), now);
        metrics.record("navigation", true, Duration::from_millis(100), now);
        metrics.record("navigation", true, Duration::from_millis(200), now);
        assert!((metrics.snapshot().average_processing_time_ms - 105.0).abs() < 1e-9);
    }

    #[test]
    fn ema_smooths_subsequent_samples() {
        let now = Instant::now();
        let mut metrics = collector(now);
        metrics.record("navigation", true, Duration::from_millis(100), now);
        metrics.record("navigation", true, Duration::from_millis(200), now);

        // 0.05 * 200 + 0.95 * 100
        assert!((metrics.snapshot().average_processing_time_ms - 105.0).abs() < 1e-9);
    }

    #[test]
    fn counts_by_outcome_and_bucket() {
        let now = Instant::now();
        let mut metrics = collector(now);
        metrics.record("navigation", true, Duration::ZERO, now);
        metrics.record("system", false, Duration::ZERO, now);
        metrics.record(UNMATCHED_BUCKET, false, Duration::ZERO, now);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_commands, 3);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.per_category["unmatched"], 1);
        assert_eq!(snapshot.per_category["navigation"], 1);
        assert!((snapshot.success_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn snapshots_are_rate_limited() {
        let start = Instant::now();
        let mut metrics = collector(start);

        assert!(metrics.record("query", true, Duration::ZERO, start).is_none());
        assert!(
            metrics
                .record("query", true, Duration::ZERO, start + Duration::from_secs(30))
                .is_none()
        );

        let snapshot = metrics
            .record("query", true, Duration::ZERO, start + Duration::from_secs(60))
            .unwrap();
        assert_eq!(snapshot.total_commands, 3);

        assert!(
            metrics
                .record("query", true, Duration::ZERO, start + Duration::from_secs(61))
                .is_none()
        );
    }

    #[test]
    fn reset_clears_counters() {
        let now = Instant::now();
        let mut metrics = collector(now);
        metrics.record("query", true, Duration::from_millis(5), now);
        metrics.reset(now);
        assert_eq!(metrics.snapshot(), Metrics::default());
        assert!((metrics.snapshot().success_rate()).abs() < f64::EPSILON);
    }
}
