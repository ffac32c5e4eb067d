//! Result aggregation
//!
//! Median skew over the trial history. With an even count the skew is the
//! integer mean of the two central values (truncating toward zero) and the
//! confidence is the lower of their two correlations.

use contracts::{CalibrationSummary, InstrumentId, TrialRecord};

use crate::error::SessionError;

/// Median aggregator with a confidence floor
#[derive(Debug, Clone, Copy)]
pub struct MedianAggregator {
    min_correlation: f64,
}

impl MedianAggregator {
    pub fn new(min_correlation: f64) -> Self {
        Self { min_correlation }
    }

    pub fn min_correlation(&self) -> f64 {
        self.min_correlation
    }

    /// # Errors
    /// `NoTrials` for an empty history
    pub fn aggregate(
        &self,
        instrument: &InstrumentId,
        records: &[TrialRecord],
    ) -> Result<CalibrationSummary, SessionError> {
        if records.is_empty() {
            return Err(SessionError::NoTrials);
        }

        let mut sorted: Vec<&TrialRecord> = records.iter().collect();
        // stable: equal skews stay in trial order
        sorted.sort_by_key(|r| r.skew_fs);

        let n = sorted.len();
        let (median_skew_fs, confidence) = if n % 2 == 1 {
            let mid = sorted[n / 2];
            (mid.skew_fs, mid.correlation)
        } else {
            let lo = sorted[n / 2 - 1];
            let hi = sorted[n / 2];
            let mean = (i128::from(lo.skew_fs) + i128::from(hi.skew_fs)) / 2;
            (mean as i64, lo.correlation.min(hi.correlation))
        };

        Ok(CalibrationSummary {
            instrument: instrument.clone(),
            median_skew_fs,
            confidence,
            // NaN counts as low
            low_confidence: !(confidence > self.min_correlation),
            trials: n,
        })
    }
}

impl Default for MedianAggregator {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::BackendKind;

    fn records(values: &[(i64, f64)]) -> Vec<TrialRecord> {
        values
            .iter()
            .enumerate()
            .map(|(trial, &(skew_fs, correlation))| TrialRecord {
                trial,
                skew_fs,
                correlation,
                best_offset: skew_fs,
                backend: BackendKind::Cpu,
                elapsed_ms: 1.0,
            })
            .collect()
    }

    fn scope() -> InstrumentId {
        InstrumentId::new("scope2")
    }

    #[test]
    fn test_odd_count_median() {
        let history = records(&[(30, 0.4), (-10, 0.9), (20, 0.6)]);
        let summary = MedianAggregator::default().aggregate(&scope(), &history).unwrap();
        assert_eq!(summary.median_skew_fs, 20);
        assert!((summary.confidence - 0.6).abs() < 1e-12);
        assert!(!summary.low_confidence);
        assert_eq!(summary.trials, 3);
    }

    #[test]
    fn test_even_count_integer_mean() {
        let history = records(&[(5, 0.7), (1, 0.9), (8, 0.2), (2, 0.5)]);
        let summary = MedianAggregator::default().aggregate(&scope(), &history).unwrap();
        // central values 2 and 5
        assert_eq!(summary.median_skew_fs, 3);
        assert!((summary.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_even_count_negative_truncates_toward_zero() {
        let history = records(&[(-5, 0.7), (-2, 0.9)]);
        let summary = MedianAggregator::default().aggregate(&scope(), &history).unwrap();
        assert_eq!(summary.median_skew_fs, -3);
    }

    #[test]
    fn test_outlier_rejected_by_median() {
        let mut values = vec![(12_000, 0.8); 9];
        values.push((900_000, 0.1));
        let summary = MedianAggregator::default()
            .aggregate(&scope(), &records(&values))
            .unwrap();
        assert_eq!(summary.median_skew_fs, 12_000);
    }

    #[test]
    fn test_low_confidence_threshold() {
        let history = records(&[(1, 0.0), (2, 0.0), (3, 0.0)]);
        let summary = MedianAggregator::default().aggregate(&scope(), &history).unwrap();
        assert!(summary.low_confidence);

        let history = records(&[(1, 0.3), (2, 0.25), (3, 0.3)]);
        let summary = MedianAggregator::new(0.25).aggregate(&scope(), &history).unwrap();
        assert!(summary.low_confidence);
        let summary = MedianAggregator::new(0.2).aggregate(&scope(), &history).unwrap();
        assert!(!summary.low_confidence);
    }

    #[test]
    fn test_empty_history() {
        let result = MedianAggregator::default().aggregate(&scope(), &[]);
        assert!(matches!(result, Err(SessionError::NoTrials)));
    }
}
