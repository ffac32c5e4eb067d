//! Append-only trial history

use std::time::Duration;

use contracts::TrialRecord;
use correlator::Correlation;

/// Completed trials in completion order (index == trial number)
#[derive(Debug, Clone, Default)]
pub struct TrialHistory {
    records: Vec<TrialRecord>,
}

impl TrialHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(trials: usize) -> Self {
        Self {
            records: Vec::with_capacity(trials),
        }
    }

    /// Append the result of the next trial
    ///
    /// The skew is `best_offset * primary_timescale`.
    pub fn append(&mut self, correlation: &Correlation, primary_timescale: i64) -> &TrialRecord {
        let outcome = &correlation.outcome;
        let record = TrialRecord {
            trial: self.records.len(),
            skew_fs: outcome.best_offset * primary_timescale,
            correlation: outcome.best_correlation,
            best_offset: outcome.best_offset,
            backend: correlation.backend,
            elapsed_ms: duration_ms(correlation.elapsed),
        };
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&TrialRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrialRecord> {
        self.records.iter()
    }

    pub fn skews(&self) -> impl Iterator<Item = i64> + '_ {
        self.records.iter().map(|r| r.skew_fs)
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
