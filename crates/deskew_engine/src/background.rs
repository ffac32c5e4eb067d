//! Off-loop correlation with message handoff
//!
//! The correlation runs on tokio's blocking pool and hands its result back
//! through a oneshot channel. The session polls the receiver without
//! blocking.

use std::sync::Arc;

use contracts::Capture;
use correlator::{CancelFlag, Correlation, CorrelationError, Correlator};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::debug;

/// Result sent back by the blocking task
pub(crate) struct Measured {
    pub correlation: Correlation,
    pub primary_timescale: i64,
}

pub(crate) enum Handoff {
    Pending,
    Ready(Result<Measured, CorrelationError>),
    /// Task ended without sending (panicked or aborted)
    Lost,
}

/// One in-flight background correlation
pub(crate) struct BackgroundCorrelation {
    rx: oneshot::Receiver<Result<Measured, CorrelationError>>,
}

impl BackgroundCorrelation {
    /// Spawn the correlation of `primary` against `secondary`
    ///
    /// The captures are immutable snapshots; later publications do not affect
    /// this run.
    pub fn spawn(
        runtime: &Handle,
        correlator: Arc<Correlator>,
        primary: Arc<Capture>,
        secondary: Arc<Capture>,
        cancel: CancelFlag,
    ) -> Self {
        let (tx, rx) = oneshot::channel();
        runtime.spawn_blocking(move || {
            let result = correlator
                .correlate(&primary.waveform, &secondary.waveform, &cancel)
                .map(|correlation| Measured {
                    correlation,
                    primary_timescale: primary.waveform.timescale(),
                });
            if tx.send(result).is_err() {
                debug!("background correlation result dropped, session gone");
            }
        });
        Self { rx }
    }

    pub fn try_take(&mut self) -> Handoff {
        match self.rx.try_recv() {
            Ok(result) => Handoff::Ready(result),
            Err(TryRecvError::Empty) => Handoff::Pending,
            Err(TryRecvError::Closed) => Handoff::Lost,
        }
    }
}
