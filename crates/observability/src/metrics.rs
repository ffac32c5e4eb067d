//! Deskew metrics recording
//!
//! Recorded through the `metrics` facade; exported when a recorder
//! (e.g. Prometheus) is installed, no-ops otherwise.

use std::collections::HashMap;

use contracts::{BackendKind, TrialRecord};
use metrics::{counter, gauge, histogram};

/// Record a completed trial
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_trial;
///
/// if let PollStatus::TrialCompleted(record) = session.poll()? {
///     record_trial(&record);
/// }
/// ```
pub fn record_trial(record: &TrialRecord) {
    counter!("deskew_trials_total", "status" => "ok").increment(1);
    gauge!("deskew_trials_completed").set((record.trial + 1) as f64);
    histogram!("deskew_trial_skew_fs").record(record.skew_fs as f64);
    histogram!("deskew_trial_correlation").record(record.correlation);
}

/// Record a trial that produced no history entry
///
/// `reason` is a short static label (`aborted`, `cancelled`).
pub fn record_trial_failed(reason: &'static str) {
    counter!("deskew_trials_total", "status" => reason).increment(1);
}

/// Record one acquisition poll (`new_data`, `stale`)
pub fn record_acquire_poll(result: &'static str) {
    counter!("deskew_acquire_polls_total", "result" => result).increment(1);
}

/// Record the final calibration value
pub fn record_calibration(instrument: &str, skew_fs: i64, confidence: f64) {
    gauge!("deskew_calibrated_skew_fs", "instrument" => instrument.to_string()).set(skew_fs as f64);
    gauge!("deskew_calibration_confidence", "instrument" => instrument.to_string()).set(confidence);
}

/// Deskew metrics aggregator
///
/// Aggregates per-trial values in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct DeskewMetricsAggregator {
    /// Completed trials
    pub trials: u64,

    /// Trials aborted without a record
    pub failed_trials: u64,

    /// Polls that found no new data
    pub stale_polls: u64,

    /// Skew statistics (ps)
    pub skew_stats: RunningStats,

    /// Best-correlation statistics
    pub correlation_stats: RunningStats,

    /// Correlation wall time per backend (ms)
    pub elapsed_stats: HashMap<BackendKind, RunningStats>,
}

impl DeskewMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a completed trial
    pub fn update(&mut self, record: &TrialRecord) {
        self.trials += 1;
        self.skew_stats.push(record.skew_fs as f64 / 1000.0);
        self.correlation_stats.push(record.correlation);
        self.elapsed_stats
            .entry(record.backend)
            .or_default()
            .push(record.elapsed_ms);
    }

    pub fn trial_failed(&mut self) {
        self.failed_trials += 1;
    }

    pub fn stale_poll(&mut self) {
        self.stale_polls += 1;
    }

    /// Generate summary report
    pub fn summary(&self) -> MetricsSummary {
        let mut elapsed_ms: Vec<(BackendKind, StatsSummary)> = self
            .elapsed_stats
            .iter()
            .map(|(backend, stats)| (*backend, StatsSummary::from(stats)))
            .collect();
        elapsed_ms.sort_by_key(|(backend, _)| backend.as_str());

        MetricsSummary {
            trials: self.trials,
            failed_trials: self.failed_trials,
            stale_polls: self.stale_polls,
            skew_ps: StatsSummary::from(&self.skew_stats),
            correlation: StatsSummary::from(&self.correlation_stats),
            elapsed_ms,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub trials: u64,
    pub failed_trials: u64,
    pub stale_polls: u64,
    pub skew_ps: StatsSummary,
    pub correlation: StatsSummary,
    pub elapsed_ms: Vec<(BackendKind, StatsSummary)>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Deskew Metrics Summary ===")?;
        writeln!(f, "Trials: {} ({} aborted)", self.trials, self.failed_trials)?;
        writeln!(f, "Stale polls: {}", self.stale_polls)?;
        writeln!(f, "Skew (ps): {}", self.skew_ps)?;
        writeln!(f, "Correlation: {}", self.correlation)?;
        for (backend, stats) in &self.elapsed_ms {
            writeln!(f, "Correlate time [{backend}] (ms): {stats}")?;
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(trial: usize, skew_fs: i64, backend: BackendKind) -> TrialRecord {
        TrialRecord {
            trial,
            skew_fs,
            correlation: 0.5,
            best_offset: skew_fs / 1_000_000,
            backend,
            elapsed_ms: 2.0 + trial as f64,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = DeskewMetricsAggregator::new();
        aggregator.update(&record(0, 12_000_000, BackendKind::Cpu));
        aggregator.update(&record(1, 14_000_000, BackendKind::Accelerator));
        aggregator.trial_failed();
        aggregator.stale_poll();

        assert_eq!(aggregator.trials, 2);
        assert_eq!(aggregator.failed_trials, 1);
        assert_eq!(aggregator.stale_polls, 1);
        assert!((aggregator.skew_stats.mean() - 13_000.0).abs() < 1e-9);

        let summary = aggregator.summary();
        assert_eq!(summary.elapsed_ms.len(), 2);
        assert_eq!(summary.elapsed_ms[0].0, BackendKind::Accelerator);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DeskewMetricsAggregator::new();
        aggregator.update(&record(0, 3_000_000, BackendKind::Cpu));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Trials: 1 (0 aborted)"));
        assert!(output.contains("Correlate time [cpu]"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_trial(&record(0, 1, BackendKind::Cpu));
        record_trial_failed("aborted");
        record_acquire_poll("stale");
        record_calibration("scope2", 1, 0.5);
    }
}
