//! Simulated oscilloscope pair
//!
//! Both channels observe the same pseudo-random calibration pattern (random
//! +/-1 symbols of `symbol_period_fs`), evaluated in absolute time. The
//! secondary sees it `skew_fs` (+/- jitter) later. Captures are published to
//! the `WaveformStore` a configurable number of host ticks after arming.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{
    ArrivalSignature, Capture, ChannelId, ContractError, SimulationConfig, SparseWaveform,
    TriggerControl, UniformWaveform, Waveform, WaveformStore, FS_PER_SECOND,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::error::{InstrumentError, Result};

/// Trigger timestamp of the first capture (s)
const EPOCH_S: i64 = 1_700_000_000;

/// Fault injection
#[derive(Debug, Default, Clone)]
pub struct SimulationFaults {
    /// Refuse every arm request
    pub refuse_arm: bool,
    /// Capture numbers (0-based) whose secondary uses the other representation
    pub mismatched_captures: Vec<u64>,
}

struct SimState {
    /// Ticks left until the armed acquisition lands
    armed: Option<u32>,
    rng: StdRng,
    captures: u64,
}

/// Simulated primary/secondary instrument pair
pub struct SimulatedScopePair {
    name: String,
    config: SimulationConfig,
    faults: SimulationFaults,
    primary: ChannelId,
    secondary: ChannelId,
    store: Arc<WaveformStore>,
    state: Mutex<SimState>,
    arms: AtomicU64,
}

impl SimulatedScopePair {
    pub fn new(
        config: SimulationConfig,
        primary: ChannelId,
        secondary: ChannelId,
        store: Arc<WaveformStore>,
    ) -> Result<Self> {
        Self::with_faults(config, SimulationFaults::default(), primary, secondary, store)
    }

    pub fn with_faults(
        config: SimulationConfig,
        faults: SimulationFaults,
        primary: ChannelId,
        secondary: ChannelId,
        store: Arc<WaveformStore>,
    ) -> Result<Self> {
        if config.primary_timescale_fs <= 0 || config.secondary_timescale_fs <= 0 {
            return Err(InstrumentError::invalid_simulation("timescales must be positive"));
        }
        if config.symbol_period_fs <= 0 {
            return Err(InstrumentError::invalid_simulation("symbol period must be positive"));
        }
        if config.samples == 0 {
            return Err(InstrumentError::invalid_simulation("samples must be non-zero"));
        }

        let state = SimState {
            armed: None,
            rng: StdRng::seed_from_u64(config.seed),
            captures: 0,
        };
        Ok(Self {
            name: format!("sim:{}+{}", primary, secondary),
            config,
            faults,
            primary,
            secondary,
            store,
            state: Mutex::new(state),
            arms: AtomicU64::new(0),
        })
    }

    pub fn arm_count(&self) -> u64 {
        self.arms.load(Ordering::SeqCst)
    }

    pub fn capture_count(&self) -> Result<u64> {
        Ok(self.lock()?.captures)
    }

    pub fn is_armed(&self) -> Result<bool> {
        Ok(self.lock()?.armed.is_some())
    }

    /// Advance one host tick; publishes the armed acquisition when it is due
    ///
    /// Returns the signature of a newly published capture.
    pub fn tick(&self) -> Result<Option<ArrivalSignature>> {
        let mut state = self.lock()?;
        let Some(remaining) = state.armed else {
            return Ok(None);
        };
        if remaining > 0 {
            state.armed = Some(remaining - 1);
            return Ok(None);
        }
        state.armed = None;
        self.acquire_locked(&mut state).map(Some)
    }

    /// Acquire and publish immediately, armed or not
    pub fn acquire(&self) -> Result<ArrivalSignature> {
        let mut state = self.lock()?;
        state.armed = None;
        self.acquire_locked(&mut state)
    }

    #[instrument(name = "sim_acquire", skip_all, fields(capture = state.captures))]
    fn acquire_locked(&self, state: &mut SimState) -> Result<ArrivalSignature> {
        let cfg = &self.config;
        let capture = state.captures;
        let t0: i64 = state.rng.random_range(0..FS_PER_SECOND);
        let jitter = if cfg.jitter_fs > 0 {
            state.rng.random_range(-cfg.jitter_fs..=cfg.jitter_fs)
        } else {
            0
        };
        let delay = cfg.skew_fs + jitter;
        let mismatched = self.faults.mismatched_captures.contains(&capture);

        let primary = self.render(
            &mut state.rng,
            t0,
            cfg.primary_timescale_fs,
            cfg.primary_trigger_phase_fs,
            0,
            cfg.sparse,
        )?;
        let secondary = self.render(
            &mut state.rng,
            t0,
            cfg.secondary_timescale_fs,
            cfg.secondary_trigger_phase_fs,
            delay,
            cfg.sparse != mismatched,
        )?;

        let signature = ArrivalSignature::new(EPOCH_S + capture as i64, t0);
        // secondary first: a new primary signature implies both are in place
        self.store.publish(
            self.secondary.clone(),
            Capture {
                signature,
                waveform: secondary,
            },
        )?;
        self.store.publish(
            self.primary.clone(),
            Capture {
                signature,
                waveform: primary,
            },
        )?;
        state.captures += 1;

        debug!(delay_fs = delay, mismatched, "capture published");
        Ok(signature)
    }

    /// Sample the pattern as seen by one channel
    fn render(
        &self,
        rng: &mut StdRng,
        t0: i64,
        timescale: i64,
        trigger_phase: i64,
        delay: i64,
        sparse: bool,
    ) -> Result<Waveform> {
        let cfg = &self.config;
        let levels: Vec<f32> = (0..cfg.samples as i64)
            .map(|i| {
                let t = t0 + i * timescale + trigger_phase - delay;
                pattern_level(cfg.seed, t.div_euclid(cfg.symbol_period_fs))
            })
            .collect();

        let mut noise = || {
            if cfg.noise > 0.0 {
                rng.random_range(-cfg.noise..=cfg.noise)
            } else {
                0.0
            }
        };

        if !sparse {
            let samples = levels.iter().map(|l| l + noise()).collect();
            return Ok(UniformWaveform::new(timescale, trigger_phase, samples)?.into());
        }

        // one sample per run of equal level
        let mut offsets = Vec::new();
        let mut durations = Vec::new();
        let mut samples = Vec::new();
        let mut start = 0usize;
        for i in 1..=levels.len() {
            if i == levels.len() || levels[i] != levels[start] {
                offsets.push(start as i64);
                durations.push((i - start) as i64);
                samples.push(levels[start] + noise());
                start = i;
            }
        }
        Ok(SparseWaveform::new(timescale, trigger_phase, offsets, durations, samples)?.into())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|_| InstrumentError::invalid_simulation("simulation state poisoned"))
    }
}

impl TriggerControl for SimulatedScopePair {
    fn name(&self) -> &str {
        &self.name
    }

    fn arm_single_shot(&self) -> std::result::Result<(), ContractError> {
        if self.faults.refuse_arm {
            return Err(ContractError::trigger_arm(&self.name, "arm refused"));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| ContractError::trigger_arm(&self.name, "simulation state poisoned"))?;
        state.armed = Some(self.config.arrival_delay_ticks);
        self.arms.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// +/-1 level of calibration symbol `symbol`
fn pattern_level(seed: u64, symbol: i64) -> f32 {
    let mut z = seed ^ (symbol as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    if z & 1 == 0 {
        -1.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::WaveformKind;

    fn pair(config: SimulationConfig, faults: SimulationFaults) -> (SimulatedScopePair, Arc<WaveformStore>) {
        let store = Arc::new(WaveformStore::new());
        let sim = SimulatedScopePair::with_faults(
            config,
            faults,
            "scope1/CH1".into(),
            "scope2/CH1".into(),
            store.clone(),
        )
        .unwrap();
        (sim, store)
    }

    fn small() -> SimulationConfig {
        SimulationConfig {
            samples: 256,
            noise: 0.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_publish_after_delay() {
        let (sim, store) = pair(
            SimulationConfig {
                arrival_delay_ticks: 2,
                ..small()
            },
            SimulationFaults::default(),
        );
        assert_eq!(sim.tick().unwrap(), None);

        sim.arm_single_shot().unwrap();
        assert_eq!(sim.tick().unwrap(), None);
        assert_eq!(sim.tick().unwrap(), None);
        let signature = sim.tick().unwrap().expect("capture due");

        assert_eq!(store.signature("scope1/CH1").unwrap(), Some(signature));
        assert_eq!(store.signature("scope2/CH1").unwrap(), Some(signature));
        assert!(!sim.is_armed().unwrap());
        assert_eq!(sim.tick().unwrap(), None);
        assert_eq!(sim.capture_count().unwrap(), 1);
    }

    #[test]
    fn test_signatures_change_per_capture() {
        let (sim, _) = pair(small(), SimulationFaults::default());
        let a = sim.acquire().unwrap();
        let b = sim.acquire().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_secondary_delayed_copy() {
        let config = SimulationConfig {
            skew_fs: 3 * 1_000_000,
            ..small()
        };
        let (sim, store) = pair(config, SimulationFaults::default());
        sim.acquire().unwrap();

        let primary = store.latest("scope1/CH1").unwrap().unwrap();
        let secondary = store.latest("scope2/CH1").unwrap().unwrap();
        // equal timescales, no noise: secondary[j + 3] == primary[j]
        for j in 0..200 {
            assert_eq!(secondary.waveform.amplitude(j + 3), primary.waveform.amplitude(j));
        }
    }

    #[test]
    fn test_sparse_runs_cover_capture() {
        let config = SimulationConfig {
            sparse: true,
            ..small()
        };
        let (sim, store) = pair(config, SimulationFaults::default());
        sim.acquire().unwrap();

        let capture = store.latest("scope1/CH1").unwrap().unwrap();
        let Waveform::Sparse(ref sparse) = capture.waveform else {
            panic!("expected sparse capture");
        };
        let covered: i64 = sparse.durations().iter().sum();
        assert_eq!(covered, 256);
        assert!(sparse.len() < 256);
    }

    #[test]
    fn test_mismatch_fault() {
        let faults = SimulationFaults {
            mismatched_captures: vec![1],
            ..SimulationFaults::default()
        };
        let (sim, store) = pair(small(), faults);

        sim.acquire().unwrap();
        assert_eq!(store.latest("scope2/CH1").unwrap().unwrap().waveform.kind(), WaveformKind::Uniform);
        sim.acquire().unwrap();
        assert_eq!(store.latest("scope2/CH1").unwrap().unwrap().waveform.kind(), WaveformKind::Sparse);
        assert_eq!(store.latest("scope1/CH1").unwrap().unwrap().waveform.kind(), WaveformKind::Uniform);
    }

    #[test]
    fn test_refused_arm() {
        let faults = SimulationFaults {
            refuse_arm: true,
            ..SimulationFaults::default()
        };
        let (sim, _) = pair(small(), faults);
        let err = sim.arm_single_shot().unwrap_err();
        assert!(matches!(err, ContractError::TriggerArm { .. }));
        assert_eq!(sim.arm_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(WaveformStore::new());
        let config = SimulationConfig {
            symbol_period_fs: 0,
            ..SimulationConfig::default()
        };
        let result = SimulatedScopePair::new(config, "a/CH1".into(), "b/CH1".into(), store);
        assert!(matches!(result, Err(InstrumentError::InvalidSimulation { .. })));
    }
}
