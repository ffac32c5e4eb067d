//! Calibration runner - hosts the session update loop.
//!
//! Each host tick advances the simulated instruments and then polls the
//! session, the same cadence a real host would drive from its UI loop.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{CalibrationSink, DeskewConfig, TriggerControl, WaveformStore};
use correlator::{Correlator, DeviceCapabilities, SimulatedDevice};
use deskew_engine::{DeskewSession, PollStatus, SessionSettings};
use instruments::{JsonFileCalibrationSink, MemoryCalibrationSink, SimulatedScopePair};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::RunStats;
use crate::error::{CliError, Result};

/// Consecutive aborted trials tolerated before giving up
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 5;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Loaded and validated configuration
    pub config: DeskewConfig,

    /// Capabilities of the simulated compute device (None = CPU only)
    pub device: Option<DeviceCapabilities>,

    /// Calibration table file (None = in-memory sink)
    pub output: Option<PathBuf>,

    /// Session timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    pub max_consecutive_failures: usize,
}

impl RunnerConfig {
    pub fn new(config: DeskewConfig) -> Self {
        Self {
            config,
            device: Some(DeviceCapabilities::full()),
            output: None,
            timeout: None,
            metrics_port: None,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Runs one calibration session to completion
pub struct CalibrationRunner {
    config: RunnerConfig,
}

impl CalibrationRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run until the session finishes, fails, times out or `shutdown` fires
    ///
    /// A shutdown cancels the session; the returned stats then carry no
    /// summary.
    pub async fn run<F>(self, shutdown: F) -> Result<RunStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let start_time = Instant::now();
        let cfg = &self.config.config;

        if let Some(port) = self.config.metrics_port {
            if let Err(e) = observability::init_metrics_only(port) {
                warn!(error = %e, port, "Metrics endpoint unavailable");
            }
        }

        let simulation = cfg.simulation.clone().unwrap_or_default();
        let store = Arc::new(WaveformStore::new());
        let scopes = Arc::new(SimulatedScopePair::new(
            simulation,
            cfg.session.primary_channel.clone(),
            cfg.session.secondary_channel.clone(),
            Arc::clone(&store),
        )?);

        let mut correlator = Correlator::new(&cfg.correlation)?;
        if let Some(capabilities) = self.config.device {
            correlator =
                correlator.with_accelerator(Arc::new(SimulatedDevice::with_capabilities(capabilities)));
        }

        let trigger: Arc<dyn TriggerControl> = scopes.clone();
        let mut session = DeskewSession::new(
            SessionSettings::from_config(cfg),
            Arc::new(correlator),
            store,
            trigger,
        );

        info!(
            instruments = scopes.name(),
            trials = session.trials_required(),
            background = session.settings().background,
            "Starting calibration session"
        );
        session.start()?;

        // Cancel from the signal task so an inline correlation stops mid-run
        let cancel = session.cancel_handle();
        let watcher = tokio::spawn(async move {
            shutdown.await;
            cancel.cancel();
        });

        let result = self.drive(&scopes, &mut session, start_time).await;
        watcher.abort();

        let mut stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                session.discard();
                return Err(e);
            }
        };

        if !session.is_done() {
            warn!(completed = stats.trials.len(), "Calibration cancelled");
            session.discard();
            stats.duration = start_time.elapsed();
            return Ok(stats);
        }

        let summary = session.summary()?;
        stats.summary = Some(summary.clone());
        if summary.low_confidence {
            warn!(
                confidence = summary.confidence,
                threshold = cfg.aggregation.min_correlation,
                "Low-confidence result, calibration table left untouched"
            );
            session.discard();
        } else {
            stats.committed_to = Some(self.commit(session)?);
        }

        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    async fn drive(
        &self,
        scopes: &SimulatedScopePair,
        session: &mut DeskewSession,
        start_time: Instant,
    ) -> Result<RunStats> {
        let cfg = &self.config.config;
        let mut stats = RunStats::default();
        let mut failures = 0usize;

        let mut interval =
            tokio::time::interval(Duration::from_millis(cfg.session.poll_interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            stats.ticks += 1;

            if let Some(timeout) = self.config.timeout {
                if start_time.elapsed() >= timeout {
                    return Err(CliError::Timeout {
                        seconds: timeout.as_secs(),
                        completed: session.history().len(),
                        required: session.trials_required(),
                    });
                }
            }

            if let Some(signature) = scopes.tick()? {
                debug!(?signature, "Capture published");
            }

            match session.poll() {
                Ok(PollStatus::Done) => break,
                Ok(PollStatus::TrialCompleted(record)) => {
                    failures = 0;
                    stats.metrics.update(&record);
                    info!(
                        trial = record.trial,
                        skew_fs = record.skew_fs,
                        correlation = record.correlation,
                        backend = %record.backend,
                        "Trial {}/{} complete",
                        record.trial + 1,
                        session.trials_required()
                    );
                    stats.trials.push(record);
                }
                Ok(PollStatus::NotReady) => stats.metrics.stale_poll(),
                Ok(PollStatus::Busy) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    failures += 1;
                    stats.metrics.trial_failed();
                    warn!(error = %e, failures, "Trial aborted, re-armed");
                    if failures >= self.config.max_consecutive_failures {
                        return Err(CliError::TooManyFailures {
                            failures,
                            last: e.to_string(),
                        });
                    }
                }
            }
        }

        stats.arms = session.arm_count();
        Ok(stats)
    }

    fn commit(&self, session: DeskewSession) -> Result<String> {
        match &self.config.output {
            Some(path) => {
                let mut sink = JsonFileCalibrationSink::open(path)?;
                session.commit(&mut sink)?;
                Ok(sink.name().to_string())
            }
            None => {
                let mut sink = MemoryCalibrationSink::new();
                session.commit(&mut sink)?;
                Ok(sink.name().to_string())
            }
        }
    }
}
