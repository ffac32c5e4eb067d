//! CPU parallel-reduction backend
//!
//! Offsets are split into fixed-size batches. Each batch reduces to a local
//! `ArgMax` on the rayon pool; the per-batch results are collected in batch
//! order and folded on the calling thread.

use contracts::{BackendKind, CorrelationOutcome, SearchWindow};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::argmax::ArgMax;
use crate::backend::CorrelationBackend;
use crate::cancel::CancelFlag;
use crate::error::CorrelationError;
use crate::pair::WaveformPair;

/// Default candidate offsets per batch
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// CPU correlation backend
pub struct CpuBackend {
    batch_size: usize,
    /// Dedicated pool; the global rayon pool when None
    pool: Option<ThreadPool>,
}

impl CpuBackend {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pool: None,
        }
    }

    /// Run on a dedicated pool of `threads` workers
    pub fn with_threads(batch_size: usize, threads: usize) -> Result<Self, CorrelationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("deskew-cpu-{i}"))
            .build()
            .map_err(|e| CorrelationError::ThreadPool {
                message: e.to_string(),
            })?;
        Ok(Self {
            batch_size: batch_size.max(1),
            pool: Some(pool),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn run_batches(
        &self,
        pair: &WaveformPair<'_>,
        window: &SearchWindow,
        cancel: &CancelFlag,
    ) -> Vec<Option<ArgMax>> {
        let batch_size = self.batch_size;
        let total = window.len();
        let batches = total.div_ceil(batch_size);

        (0..batches)
            .into_par_iter()
            .map(|batch| {
                if cancel.is_cancelled() {
                    return None;
                }
                let lo = batch * batch_size;
                let hi = (lo + batch_size).min(total);
                let mut local = ArgMax::new(window);
                for index in lo..hi {
                    let offset = window.offset_at(index);
                    local.observe(offset, pair.score(offset));
                }
                Some(local)
            })
            .collect()
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl CorrelationBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn correlate(
        &self,
        pair: &WaveformPair<'_>,
        window: &SearchWindow,
        cancel: &CancelFlag,
    ) -> Result<CorrelationOutcome, CorrelationError> {
        let locals = match &self.pool {
            Some(pool) => pool.install(|| self.run_batches(pair, window, cancel)),
            None => self.run_batches(pair, window, cancel),
        };

        let mut best = ArgMax::new(window);
        for local in &locals {
            match local {
                Some(local) => best.merge(local),
                None => {
                    debug!(batches = locals.len(), "cpu correlation cancelled");
                    return Err(CorrelationError::Cancelled);
                }
            }
        }
        Ok(best.finish())
    }
}
