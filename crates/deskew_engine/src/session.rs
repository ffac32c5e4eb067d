//! Calibration state machine
//!
//! `Setup -> Acquire <-> Correlate -> Done`. The host calls `poll()` from its
//! update loop; `poll()` never waits for data. Each trial arms the trigger,
//! waits for a new primary arrival signature, correlates the pair and appends
//! one record.

use std::sync::Arc;

use contracts::{
    ArrivalSignature, CalibrationSink, CalibrationState, CalibrationSummary, ChannelId,
    DeskewConfig, InstrumentId, TrialRecord, TriggerControl, WaveformStore,
};
use correlator::{CancelFlag, CorrelationError, Correlator};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::MedianAggregator;
use crate::background::{BackgroundCorrelation, Handoff, Measured};
use crate::error::SessionError;
use crate::history::TrialHistory;

/// Session parameters
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub primary: ChannelId,
    pub secondary: ChannelId,
    /// Calibration key of the secondary instrument
    pub instrument: InstrumentId,
    pub trials: usize,
    /// Correlate on the blocking pool instead of inside `poll()`
    pub background: bool,
    pub min_correlation: f64,
}

impl SessionSettings {
    pub fn from_config(config: &DeskewConfig) -> Self {
        let session = &config.session;
        Self {
            primary: session.primary_channel.clone(),
            secondary: session.secondary_channel.clone(),
            instrument: session.target_instrument(),
            trials: session.trials.max(1),
            background: session.background,
            min_correlation: config.aggregation.min_correlation,
        }
    }
}

/// Outcome of one `poll()`
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// No new acquisition yet
    NotReady,
    /// Background correlation still running
    Busy,
    /// A trial finished and was appended to the history
    TrialCompleted(TrialRecord),
    /// Every trial completed
    Done,
}

/// One deskew calibration session
pub struct DeskewSession {
    settings: SessionSettings,
    correlator: Arc<Correlator>,
    store: Arc<WaveformStore>,
    trigger: Arc<dyn TriggerControl>,
    aggregator: MedianAggregator,
    state: CalibrationState,
    history: TrialHistory,
    /// Primary signature the current trial must differ from
    last_signature: Option<ArrivalSignature>,
    cancel: CancelFlag,
    runtime: Option<Handle>,
    pending: Option<BackgroundCorrelation>,
    arms: usize,
}

impl DeskewSession {
    pub fn new(
        settings: SessionSettings,
        correlator: Arc<Correlator>,
        store: Arc<WaveformStore>,
        trigger: Arc<dyn TriggerControl>,
    ) -> Self {
        let aggregator = MedianAggregator::new(settings.min_correlation);
        let history = TrialHistory::with_capacity(settings.trials);
        Self {
            settings,
            correlator,
            store,
            trigger,
            aggregator,
            state: CalibrationState::Setup,
            history,
            last_signature: None,
            cancel: CancelFlag::new(),
            runtime: None,
            pending: None,
            arms: 0,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn history(&self) -> &TrialHistory {
        &self.history
    }

    pub fn trials_required(&self) -> usize {
        self.settings.trials
    }

    pub fn is_done(&self) -> bool {
        self.state == CalibrationState::Done
    }

    /// Number of single-shot arms issued so far
    pub fn arm_count(&self) -> usize {
        self.arms
    }

    /// Flag that cancels this session from another thread
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Leave `Setup` and arm the first acquisition
    ///
    /// Background sessions must be started inside a tokio runtime.
    #[instrument(
        name = "deskew_session_start",
        skip(self),
        fields(primary = %self.settings.primary, secondary = %self.settings.secondary)
    )]
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != CalibrationState::Setup {
            return Err(SessionError::invalid_state("start", self.state));
        }
        if self.settings.background {
            let runtime = Handle::try_current().map_err(|e| SessionError::background(e.to_string()))?;
            self.runtime = Some(runtime);
        }

        self.last_signature = self.store.signature(&self.settings.primary)?;
        self.state = CalibrationState::Acquire;
        self.arm()?;

        info!(
            trials = self.settings.trials,
            background = self.settings.background,
            window = self.correlator.window().len(),
            "deskew session started"
        );
        Ok(())
    }

    /// Advance the state machine by one step
    ///
    /// # Errors
    /// - `InvalidState` before `start()`
    /// - a trial-level error (representation mismatch, missing waveform,
    ///   device failure); the trial is re-armed and no record is added
    /// - `Correlation(Cancelled)` once `cancel()` was called
    #[instrument(
        level = "trace",
        name = "deskew_session_poll",
        skip(self),
        fields(state = %self.state, trial = self.history.len())
    )]
    pub fn poll(&mut self) -> Result<PollStatus, SessionError> {
        if self.cancel.is_cancelled() {
            return Err(CorrelationError::Cancelled.into());
        }
        match self.state {
            CalibrationState::Setup => Err(SessionError::invalid_state("poll", self.state)),
            CalibrationState::Acquire => self.poll_acquire(),
            CalibrationState::Correlate => self.poll_background(),
            CalibrationState::Done => Ok(PollStatus::Done),
        }
    }

    /// Request cooperative cancellation
    ///
    /// A running CPU correlation stops at its next batch; a pending result is
    /// discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
        info!(completed = self.history.len(), "deskew session cancelled");
    }

    /// Tear down without writing a calibration value
    pub fn discard(self) {
        self.cancel.cancel();
        info!(
            completed = self.history.len(),
            in_flight = self.pending.is_some(),
            "deskew session discarded"
        );
    }

    /// Aggregate the finished session
    pub fn summary(&self) -> Result<CalibrationSummary, SessionError> {
        if self.state != CalibrationState::Done {
            return Err(SessionError::NotFinished {
                completed: self.history.len(),
                required: self.settings.trials,
            });
        }
        self.aggregator
            .aggregate(&self.settings.instrument, self.history.records())
    }

    /// Aggregate and write the skew to `sink`
    ///
    /// Nothing is written for a low-confidence result.
    pub fn commit<S>(self, sink: &mut S) -> Result<CalibrationSummary, SessionError>
    where
        S: CalibrationSink + ?Sized,
    {
        let summary = self.summary()?;
        if summary.low_confidence {
            warn!(
                confidence = summary.confidence,
                threshold = self.aggregator.min_correlation(),
                "calibration not committed"
            );
            return Err(SessionError::LowConfidence {
                confidence: summary.confidence,
                threshold: self.aggregator.min_correlation(),
            });
        }

        sink.record_skew(&summary.instrument, summary.median_skew_fs)?;
        observability::record_calibration(
            &summary.instrument,
            summary.median_skew_fs,
            summary.confidence,
        );
        info!(
            sink = sink.name(),
            instrument = %summary.instrument,
            skew_fs = summary.median_skew_fs,
            confidence = summary.confidence,
            "calibration committed"
        );
        Ok(summary)
    }
}

impl DeskewSession {
    fn arm(&mut self) -> Result<(), SessionError> {
        self.trigger.arm_single_shot()?;
        self.arms += 1;
        debug!(trigger = self.trigger.name(), trial = self.history.len(), "armed");
        Ok(())
    }

    fn poll_acquire(&mut self) -> Result<PollStatus, SessionError> {
        let signature = self.store.signature(&self.settings.primary)?;
        let Some(signature) = signature.filter(|s| Some(*s) != self.last_signature) else {
            observability::record_acquire_poll("stale");
            return Ok(PollStatus::NotReady);
        };
        observability::record_acquire_poll("new_data");
        self.last_signature = Some(signature);
        self.state = CalibrationState::Correlate;

        match self.runtime.clone() {
            Some(runtime) => self.dispatch_background(&runtime),
            None => {
                let correlator = &self.correlator;
                let cancel = &self.cancel;
                let result = self.store.with_pair(
                    &self.settings.primary,
                    &self.settings.secondary,
                    |primary, secondary| {
                        correlator
                            .correlate(&primary.waveform, &secondary.waveform, cancel)
                            .map(|correlation| Measured {
                                correlation,
                                primary_timescale: primary.waveform.timescale(),
                            })
                    },
                )?;
                match result {
                    Some(result) => self.finish_trial(result),
                    None => self.abort_trial(SessionError::MissingWaveform {
                        channel: self.settings.secondary.clone(),
                    }),
                }
            }
        }
    }

    fn dispatch_background(&mut self, runtime: &Handle) -> Result<PollStatus, SessionError> {
        let primary = self.store.latest(&self.settings.primary)?;
        let secondary = self.store.latest(&self.settings.secondary)?;
        let (Some(primary), Some(secondary)) = (primary, secondary) else {
            return self.abort_trial(SessionError::MissingWaveform {
                channel: self.settings.secondary.clone(),
            });
        };

        self.pending = Some(BackgroundCorrelation::spawn(
            runtime,
            Arc::clone(&self.correlator),
            primary,
            secondary,
            self.cancel.clone(),
        ));
        debug!(trial = self.history.len(), "background correlation dispatched");
        Ok(PollStatus::Busy)
    }

    fn poll_background(&mut self) -> Result<PollStatus, SessionError> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(SessionError::invalid_state("poll", self.state));
        };
        match pending.try_take() {
            Handoff::Pending => Ok(PollStatus::Busy),
            Handoff::Ready(result) => {
                self.pending = None;
                self.finish_trial(result)
            }
            Handoff::Lost => {
                self.pending = None;
                self.abort_trial(SessionError::background("task ended without a result"))
            }
        }
    }

    fn finish_trial(
        &mut self,
        result: Result<Measured, CorrelationError>,
    ) -> Result<PollStatus, SessionError> {
        let measured = match result {
            Ok(measured) => measured,
            Err(CorrelationError::Cancelled) => {
                observability::record_trial_failed("cancelled");
                return Err(CorrelationError::Cancelled.into());
            }
            Err(e) => return self.abort_trial(e.into()),
        };

        let record = self
            .history
            .append(&measured.correlation, measured.primary_timescale)
            .clone();
        observability::record_trial(&record);
        info!(
            trial = record.trial,
            skew_fs = record.skew_fs,
            best_offset = record.best_offset,
            correlation = record.correlation,
            backend = %record.backend,
            "trial completed"
        );

        if self.history.len() >= self.settings.trials {
            self.state = CalibrationState::Done;
            info!(trials = self.history.len(), "all trials completed");
        } else {
            self.state = CalibrationState::Acquire;
            self.arm()?;
        }
        Ok(PollStatus::TrialCompleted(record))
    }

    /// Drop the current trial and acquire again
    fn abort_trial(&mut self, error: SessionError) -> Result<PollStatus, SessionError> {
        warn!(trial = self.history.len(), error = %error, "trial aborted");
        observability::record_trial_failed("aborted");
        self.state = CalibrationState::Acquire;
        if let Err(arm_error) = self.arm() {
            warn!(error = %arm_error, "re-arm after aborted trial failed");
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BackendPreference, Capture, ContractError, CorrelationConfig, SparseWaveform,
        UniformWaveform, Waveform,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    const PRIMARY: &str = "scope1/CH1";
    const SECONDARY: &str = "scope2/CH1";
    const TIMESCALE: i64 = 1_000;

    #[derive(Default)]
    struct CountingTrigger {
        arms: AtomicUsize,
        failing: AtomicBool,
    }

    impl TriggerControl for CountingTrigger {
        fn name(&self) -> &str {
            "counting"
        }

        fn arm_single_shot(&self) -> Result<(), ContractError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ContractError::trigger_arm("counting", "offline"));
            }
            self.arms.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct VecSink {
        written: Vec<(InstrumentId, i64)>,
    }

    impl CalibrationSink for VecSink {
        fn name(&self) -> &str {
            "vec"
        }

        fn record_skew(&mut self, instrument: &InstrumentId, skew_fs: i64) -> Result<(), ContractError> {
            self.written.push((instrument.clone(), skew_fs));
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<WaveformStore>,
        trigger: Arc<CountingTrigger>,
        session: DeskewSession,
        next_signature: i64,
    }

    impl Fixture {
        fn new(trials: usize, background: bool, min_correlation: f64) -> Self {
            let store = Arc::new(WaveformStore::new());
            let trigger = Arc::new(CountingTrigger::default());
            let correlator = Correlator::new(&CorrelationConfig {
                max_skew_samples: 40,
                backend: BackendPreference::Cpu,
                batch_size: 16,
                worker_threads: None,
            })
            .unwrap();
            let settings = SessionSettings {
                primary: PRIMARY.into(),
                secondary: SECONDARY.into(),
                instrument: "scope2".into(),
                trials,
                background,
                min_correlation,
            };
            let session = DeskewSession::new(
                settings,
                Arc::new(correlator),
                store.clone(),
                trigger.clone(),
            );
            Self {
                store,
                trigger,
                session,
                next_signature: 1,
            }
        }

        fn arms(&self) -> usize {
            self.trigger.arms.load(Ordering::SeqCst)
        }

        fn publish(&mut self, primary: Waveform, secondary: Waveform) {
            let signature = ArrivalSignature::new(self.next_signature, 0);
            self.next_signature += 1;
            self.store
                .publish(SECONDARY.into(), Capture { signature, waveform: secondary })
                .unwrap();
            self.store
                .publish(PRIMARY.into(), Capture { signature, waveform: primary })
                .unwrap();
        }

        fn publish_shifted(&mut self, shift: i64, secondary_phase: i64) {
            let (p, s) = shifted(shift, secondary_phase, self.next_signature as u64);
            self.publish(p, s);
        }
    }

    /// Secondary shows the primary's pattern `shift` samples later
    fn shifted(shift: i64, secondary_phase: i64, seed: u64) -> (Waveform, Waveform) {
        let mut rng = StdRng::seed_from_u64(seed);
        let pattern: Vec<f32> = (0..400).map(|_| rng.random_range(-1.0f32..1.0)).collect();
        let base = 64usize;
        let primary = pattern[base..base + 256].to_vec();
        let start = (base as i64 - shift) as usize;
        let secondary = pattern[start..start + 256].to_vec();
        (
            UniformWaveform::new(TIMESCALE, 0, primary).unwrap().into(),
            UniformWaveform::new(TIMESCALE, secondary_phase, secondary).unwrap().into(),
        )
    }

    #[test]
    fn test_poll_before_start_rejected() {
        let mut fx = Fixture::new(3, false, 0.0);
        assert!(matches!(
            fx.session.poll(),
            Err(SessionError::InvalidState { operation: "poll", .. })
        ));
        fx.session.start().unwrap();
        assert!(matches!(
            fx.session.start(),
            Err(SessionError::InvalidState { operation: "start", .. })
        ));
    }

    #[test]
    fn test_ten_trials_then_done() {
        let mut fx = Fixture::new(10, false, 0.0);
        fx.session.start().unwrap();
        assert_eq!(fx.session.state(), CalibrationState::Acquire);

        for trial in 0..10 {
            assert_eq!(fx.session.poll().unwrap(), PollStatus::NotReady);
            fx.publish_shifted(12, 0);
            match fx.session.poll().unwrap() {
                PollStatus::TrialCompleted(record) => {
                    assert_eq!(record.trial, trial);
                    assert_eq!(record.best_offset, 12);
                    assert_eq!(record.skew_fs, 12 * TIMESCALE);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        assert!(fx.session.is_done());
        assert_eq!(fx.arms(), 10);
        assert_eq!(fx.session.arm_count(), 10);

        // Done never arms again
        fx.publish_shifted(12, 0);
        assert_eq!(fx.session.poll().unwrap(), PollStatus::Done);
        assert_eq!(fx.arms(), 10);

        let trials: Vec<usize> = fx.session.history().iter().map(|r| r.trial).collect();
        assert_eq!(trials, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_existing_capture_is_not_new_data() {
        let mut fx = Fixture::new(2, false, 0.0);
        fx.publish_shifted(0, 0);
        fx.session.start().unwrap();
        assert_eq!(fx.session.poll().unwrap(), PollStatus::NotReady);
        assert_eq!(fx.session.poll().unwrap(), PollStatus::NotReady);
        assert!(fx.session.history().is_empty());
    }

    #[test]
    fn test_mismatch_aborts_trial_and_rearms() {
        let mut fx = Fixture::new(2, false, 0.0);
        fx.session.start().unwrap();

        let u = UniformWaveform::new(TIMESCALE, 0, vec![1.0; 32]).unwrap();
        let sparse: Waveform = SparseWaveform::from_uniform(&u).into();
        fx.publish(u.into(), sparse);

        let err = fx.session.poll().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Correlation(CorrelationError::UnsupportedRepresentation { .. })
        ));
        assert!(fx.session.history().is_empty());
        assert_eq!(fx.session.state(), CalibrationState::Acquire);
        assert_eq!(fx.arms(), 2);

        fx.publish_shifted(-5, 0);
        match fx.session.poll().unwrap() {
            PollStatus::TrialCompleted(record) => {
                assert_eq!(record.trial, 0);
                assert_eq!(record.best_offset, -5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_abort_keeps_trial_error_when_rearm_fails() {
        let mut fx = Fixture::new(2, false, 0.0);
        fx.session.start().unwrap();
        fx.trigger.failing.store(true, Ordering::SeqCst);

        let u = UniformWaveform::new(TIMESCALE, 0, vec![1.0; 32]).unwrap();
        let sparse: Waveform = SparseWaveform::from_uniform(&u).into();
        fx.publish(u.into(), sparse);

        let err = fx.session.poll().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Correlation(CorrelationError::UnsupportedRepresentation { .. })
        ));
        assert_eq!(fx.session.state(), CalibrationState::Acquire);
        assert_eq!(fx.arms(), 1);
    }

    #[test]
    fn test_missing_secondary_aborts_trial() {
        let mut fx = Fixture::new(1, false, 0.0);
        fx.session.start().unwrap();
        let (primary, _) = shifted(0, 0, 1);
        fx.store
            .publish(
                PRIMARY.into(),
                Capture {
                    signature: ArrivalSignature::new(9, 0),
                    waveform: primary,
                },
            )
            .unwrap();

        let err = fx.session.poll().unwrap_err();
        assert!(matches!(err, SessionError::MissingWaveform { .. }));
        assert_eq!(fx.arms(), 2);
    }

    #[test]
    fn test_trigger_phase_not_added_to_skew() {
        // secondary triggers 300 fs late: its samples cover [j*ts + 300, (j+1)*ts + 300)
        let mut fx = Fixture::new(1, false, 0.0);
        fx.session.start().unwrap();
        fx.publish_shifted(7, 300);

        let PollStatus::TrialCompleted(record) = fx.session.poll().unwrap() else {
            panic!("expected a completed trial");
        };
        // the shifted primary instant lands in secondary sample i+7 only from offset 8
        assert_eq!(record.best_offset, 8);
        assert_eq!(record.skew_fs, record.best_offset * TIMESCALE);
    }

    #[test]
    fn test_commit_writes_median() {
        let mut fx = Fixture::new(3, false, 0.0);
        fx.session.start().unwrap();
        for shift in [10, 30, 11] {
            fx.publish_shifted(shift, 0);
            fx.session.poll().unwrap();
        }

        let mut sink = VecSink::default();
        let summary = fx.session.commit(&mut sink).unwrap();
        assert_eq!(summary.median_skew_fs, 11 * TIMESCALE);
        assert_eq!(sink.written, vec![(InstrumentId::new("scope2"), 11 * TIMESCALE)]);
    }

    #[test]
    fn test_commit_before_done_rejected() {
        let mut fx = Fixture::new(3, false, 0.0);
        fx.session.start().unwrap();
        fx.publish_shifted(1, 0);
        fx.session.poll().unwrap();

        let mut sink = VecSink::default();
        let err = fx.session.commit(&mut sink).unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotFinished {
                completed: 1,
                required: 3
            }
        ));
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_low_confidence_not_committed() {
        let mut fx = Fixture::new(1, false, 0.99);
        fx.session.start().unwrap();
        fx.publish_shifted(3, 0);
        fx.session.poll().unwrap();

        let mut sink = VecSink::default();
        let err = fx.session.commit(&mut sink).unwrap_err();
        assert!(matches!(err, SessionError::LowConfidence { .. }));
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_cancel_stops_session() {
        let mut fx = Fixture::new(4, false, 0.0);
        fx.session.start().unwrap();
        fx.session.cancel();
        fx.publish_shifted(0, 0);
        let err = fx.session.poll().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fx.arms(), 1);
        fx.session.discard();
    }

    #[test]
    fn test_background_requires_runtime() {
        let mut fx = Fixture::new(1, true, 0.0);
        let err = fx.session.start().unwrap_err();
        assert!(matches!(err, SessionError::BackgroundTaskFailed { .. }));
        assert_eq!(fx.session.state(), CalibrationState::Setup);
    }

    #[tokio::test]
    async fn test_background_handoff() {
        let mut fx = Fixture::new(3, true, 0.0);
        fx.session.start().unwrap();

        let mut completed = Vec::new();
        while completed.len() < 3 {
            fx.publish_shifted(-14, 0);
            assert_eq!(fx.session.poll().unwrap(), PollStatus::Busy);
            assert_eq!(fx.session.state(), CalibrationState::Correlate);
            loop {
                match fx.session.poll().unwrap() {
                    PollStatus::Busy => tokio::time::sleep(Duration::from_millis(1)).await,
                    PollStatus::TrialCompleted(record) => {
                        completed.push(record);
                        break;
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
        }

        assert!(fx.session.is_done());
        assert!(completed.iter().all(|r| r.best_offset == -14));
        assert_eq!(fx.arms(), 3);
    }
}
