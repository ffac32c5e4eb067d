//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! Covers:
//! - Config → simulated scope pair → deskew session → calibration sink
//! - Inline and background correlation
//! - Trial-level failure recovery

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(contracts::SearchWindow::default().len(), 60_000);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        CalibrationState, DeskewConfig, SimulationConfig, TriggerControl, WaveformStore,
    };
    use correlator::{Correlator, DeviceCapabilities, SimulatedDevice};
    use deskew_engine::{DeskewSession, PollStatus, SessionError, SessionSettings};
    use instruments::{
        JsonFileCalibrationSink, MemoryCalibrationSink, SimulatedScopePair, SimulationFaults,
    };

    const TIMESCALE: i64 = 1_000_000;
    const MAX_STEPS: usize = 10_000;

    fn base_config(trials: usize, background: bool) -> DeskewConfig {
        let mut config = DeskewConfig::default();
        config.session.trials = trials;
        config.session.background = background;
        config.correlation.max_skew_samples = 256;
        config.correlation.batch_size = 32;
        config.simulation = Some(SimulationConfig {
            primary_timescale_fs: TIMESCALE,
            secondary_timescale_fs: TIMESCALE,
            samples: 2_048,
            skew_fs: 12 * TIMESCALE,
            noise: 0.05,
            ..SimulationConfig::default()
        });
        config
    }

    struct Rig {
        scopes: Arc<SimulatedScopePair>,
        session: DeskewSession,
        device: Arc<SimulatedDevice>,
    }

    fn rig(config: &DeskewConfig, faults: SimulationFaults) -> Rig {
        let store = Arc::new(WaveformStore::new());
        let scopes = Arc::new(
            SimulatedScopePair::with_faults(
                config.simulation.clone().unwrap(),
                faults,
                config.session.primary_channel.clone(),
                config.session.secondary_channel.clone(),
                Arc::clone(&store),
            )
            .unwrap(),
        );
        let device = Arc::new(SimulatedDevice::new());
        let correlator = Correlator::new(&config.correlation)
            .unwrap()
            .with_accelerator(device.clone());
        let trigger: Arc<dyn TriggerControl> = scopes.clone();
        let session = DeskewSession::new(
            SessionSettings::from_config(config),
            Arc::new(correlator),
            store,
            trigger,
        );
        Rig {
            scopes,
            session,
            device,
        }
    }

    /// Tick the instruments and poll the session until it is done
    ///
    /// Returns the trial-level errors seen along the way.
    async fn drive(rig: &mut Rig) -> Vec<SessionError> {
        let mut errors = Vec::new();
        for _ in 0..MAX_STEPS {
            rig.scopes.tick().unwrap();
            match rig.session.poll() {
                Ok(PollStatus::Done) => return errors,
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!(
            "session did not finish: state={}, trials={}",
            rig.session.state(),
            rig.session.history().len()
        );
    }

    /// Inline correlation: simulated pair -> session -> memory sink
    #[tokio::test]
    async fn test_e2e_inline_calibration() {
        let config = base_config(10, false);
        let mut rig = rig(&config, SimulationFaults::default());

        rig.session.start().unwrap();
        let errors = drive(&mut rig).await;
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");

        assert_eq!(rig.session.state(), CalibrationState::Done);
        assert_eq!(rig.session.history().len(), 10);
        assert_eq!(rig.session.arm_count(), 10);
        assert_eq!(rig.scopes.capture_count().unwrap(), 10);
        assert!(rig
            .session
            .history()
            .iter()
            .all(|r| r.skew_fs == 12 * TIMESCALE));
        // uniform pair on a capable device runs on the accelerator
        assert_eq!(rig.device.jobs_completed(), 10);

        let mut sink = MemoryCalibrationSink::new();
        let summary = rig.session.commit(&mut sink).unwrap();
        assert_eq!(summary.median_skew_fs, 12 * TIMESCALE);
        assert_eq!(summary.trials, 10);
        assert!(summary.confidence > 0.9);
        assert_eq!(sink.skew_of("scope2"), Some(12 * TIMESCALE));
    }

    /// Background correlation hands results back through `poll()`
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_background_calibration() {
        let mut config = base_config(5, true);
        config.correlation.backend = contracts::BackendPreference::Cpu;
        let mut rig = rig(&config, SimulationFaults::default());

        rig.session.start().unwrap();
        let errors = drive(&mut rig).await;
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");

        assert_eq!(rig.session.history().len(), 5);
        assert_eq!(rig.device.jobs_completed(), 0);
        let summary = rig.session.summary().unwrap();
        assert_eq!(summary.median_skew_fs, 12 * TIMESCALE);
    }

    /// Sparse captures with jitter; the median lands near the true skew
    #[tokio::test]
    async fn test_e2e_sparse_with_jitter() {
        let mut config = base_config(11, false);
        if let Some(sim) = config.simulation.as_mut() {
            sim.sparse = true;
            sim.noise = 0.0;
            sim.jitter_fs = TIMESCALE;
            sim.skew_fs = -40 * TIMESCALE;
        }
        let mut rig = rig(&config, SimulationFaults::default());

        rig.session.start().unwrap();
        let errors = drive(&mut rig).await;
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");

        // sparse pairs never reach the device
        assert_eq!(rig.device.jobs_completed(), 0);
        let summary = rig.session.summary().unwrap();
        // run boundaries match the run ending there, adding up to one sample
        let error = (summary.median_skew_fs + 40 * TIMESCALE).abs();
        assert!(
            error <= 3 * TIMESCALE,
            "median {} too far from the true skew",
            summary.median_skew_fs
        );
    }

    /// A mixed-representation capture aborts its trial and is re-acquired
    #[tokio::test]
    async fn test_e2e_mismatch_recovers() {
        let config = base_config(4, false);
        let faults = SimulationFaults {
            mismatched_captures: vec![1],
            ..SimulationFaults::default()
        };
        let mut rig = rig(&config, faults);

        rig.session.start().unwrap();
        let errors = drive(&mut rig).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            SessionError::Correlation(correlator::CorrelationError::UnsupportedRepresentation { .. })
        ));
        assert_eq!(rig.session.history().len(), 4);
        assert_eq!(rig.session.arm_count(), 5);
        let trials: Vec<usize> = rig.session.history().iter().map(|r| r.trial).collect();
        assert_eq!(trials, vec![0, 1, 2, 3]);
    }

    /// Device without double precision: auto selection falls back to cpu
    #[tokio::test]
    async fn test_e2e_incapable_device_uses_cpu() {
        let config = base_config(3, false);
        let store = Arc::new(WaveformStore::new());
        let scopes = Arc::new(
            SimulatedScopePair::new(
                config.simulation.clone().unwrap(),
                config.session.primary_channel.clone(),
                config.session.secondary_channel.clone(),
                Arc::clone(&store),
            )
            .unwrap(),
        );
        let device = Arc::new(SimulatedDevice::with_capabilities(DeviceCapabilities {
            shader_float64: false,
            ..DeviceCapabilities::full()
        }));
        let correlator = Correlator::new(&config.correlation)
            .unwrap()
            .with_accelerator(device.clone());
        let trigger: Arc<dyn TriggerControl> = scopes.clone();
        let session = DeskewSession::new(
            SessionSettings::from_config(&config),
            Arc::new(correlator),
            store,
            trigger,
        );
        let mut rig = Rig {
            scopes,
            session,
            device,
        };

        rig.session.start().unwrap();
        drive(&mut rig).await;

        assert_eq!(rig.device.jobs_completed(), 0);
        assert!(rig
            .session
            .history()
            .iter()
            .all(|r| r.backend == contracts::BackendKind::Cpu));
    }

    /// Config file -> session -> JSON calibration table
    #[tokio::test]
    async fn test_e2e_config_to_json_table() {
        let toml = r#"
[session]
primary_channel = "ref/CH1"
secondary_channel = "dut/CH2"
trials = 3

[correlation]
max_skew_samples = 128
backend = "cpu"

[aggregation]
min_correlation = 0.5

[simulation]
samples = 1024
skew_fs = -7000000
noise = 0.02
"#;
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let mut rig = rig(&config, SimulationFaults::default());

        rig.session.start().unwrap();
        drive(&mut rig).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskew.json");
        let mut sink = JsonFileCalibrationSink::open(&path).unwrap();
        let summary = rig.session.commit(&mut sink).unwrap();
        assert_eq!(summary.median_skew_fs, -7 * TIMESCALE);

        let table: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(table["instruments"]["dut"]["skew_fs"], -7_000_000);
    }

    /// Low confidence leaves the sink untouched
    #[tokio::test]
    async fn test_e2e_low_confidence_not_committed() {
        let mut config = base_config(3, false);
        // noiseless +/-1 levels correlate to exactly 1.0, which does not exceed 1.0
        config.aggregation.min_correlation = 1.0;
        if let Some(sim) = config.simulation.as_mut() {
            sim.noise = 0.0;
        }
        let mut rig = rig(&config, SimulationFaults::default());

        rig.session.start().unwrap();
        drive(&mut rig).await;

        let mut sink = MemoryCalibrationSink::new();
        let err = rig.session.commit(&mut sink).unwrap_err();
        assert!(matches!(err, SessionError::LowConfidence { .. }));
        assert_eq!(sink.writes(), 0);
    }
}
