//! Run statistics and summary printing.

use std::time::Duration;

use contracts::{CalibrationSummary, TrialRecord, FS_PER_SECOND};
use observability::DeskewMetricsAggregator;

/// Statistics from one calibration run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Completed trials, in order
    pub trials: Vec<TrialRecord>,

    /// Single-shot arms issued (completed + aborted trials)
    pub arms: usize,

    /// Host loop iterations
    pub ticks: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Aggregated result, when the session finished
    pub summary: Option<CalibrationSummary>,

    /// Where the skew was written, if it was
    pub committed_to: Option<String>,

    /// Per-trial metrics aggregator
    pub metrics: DeskewMetricsAggregator,
}

impl RunStats {
    /// Trials completed per second of wall time
    pub fn trial_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.trials.len() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Deskew Calibration                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Trials: {}", self.trials.len());
        println!("   ├─ Arms: {}", self.arms);
        println!("   ├─ Host ticks: {}", self.ticks);
        println!("   └─ Trials/s: {:.2}", self.trial_rate());

        if !self.trials.is_empty() {
            println!("\n🔬 Trials");
            println!(
                "   {:>5}  {:>14}  {:>12}  {:>8}  {:>12}  {:>10}",
                "#", "skew (ps)", "offset", "corr", "backend", "ms"
            );
            for record in &self.trials {
                println!(
                    "   {:>5}  {:>14.3}  {:>12}  {:>8.4}  {:>12}  {:>10.2}",
                    record.trial,
                    record.skew_fs as f64 / 1000.0,
                    record.best_offset,
                    record.correlation,
                    record.backend.as_str(),
                    record.elapsed_ms
                );
            }
        }

        let summary = self.metrics.summary();
        println!("\n📈 Session Metrics");
        println!("   ├─ Aborted trials: {}", summary.failed_trials);
        println!("   ├─ Stale polls: {}", summary.stale_polls);
        println!("   ├─ Skew (ps): {}", summary.skew_ps);
        println!("   └─ Correlation: {}", summary.correlation);
        for (backend, stats) in &summary.elapsed_ms {
            println!("      └─ {} correlate (ms): {}", backend, stats);
        }

        match &self.summary {
            Some(result) => {
                println!("\n🎯 Result");
                println!("   ├─ Instrument: {}", result.instrument);
                println!(
                    "   ├─ Median skew: {} fs ({})",
                    result.median_skew_fs,
                    format_skew(result.median_skew_fs)
                );
                println!("   ├─ Confidence: {:.4}", result.confidence);
                if result.low_confidence {
                    println!("   ├─ ⚠️  Low confidence, not committed");
                }
                match &self.committed_to {
                    Some(sink) => println!("   └─ Written to: {}", sink),
                    None => println!("   └─ Written to: -"),
                }
            }
            None => println!("\n⚠️  Session did not finish"),
        }

        println!();
    }
}

/// Human-readable skew with an SI time unit
pub fn format_skew(skew_fs: i64) -> String {
    let abs = skew_fs.unsigned_abs() as f64;
    let value = skew_fs as f64;
    if abs >= FS_PER_SECOND as f64 / 1e3 {
        format!("{:.3} ms", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.3} µs", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.3} ns", value / 1e6)
    } else {
        format!("{:.3} ps", value / 1e3)
    }
}
