//! WaveformStore - shared waveform data between acquisition and correlation
//!
//! Acquisition publishes captures under the write lock; correlation reads
//! both waveforms of a pair under one read lock for its whole duration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::{ChannelId, ContractError, Waveform};

/// Data-arrival signature of a capture, used only for change detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrivalSignature {
    /// Whole seconds of the trigger timestamp
    pub timestamp: i64,
    /// Sub-second fraction (fs)
    pub femtoseconds: i64,
}

impl ArrivalSignature {
    pub fn new(timestamp: i64, femtoseconds: i64) -> Self {
        Self {
            timestamp,
            femtoseconds,
        }
    }
}

/// One acquired waveform and its arrival signature
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub signature: ArrivalSignature,
    pub waveform: Waveform,
}

/// Latest capture per channel
#[derive(Debug, Default)]
pub struct WaveformStore {
    inner: RwLock<HashMap<ChannelId, Arc<Capture>>>,
}

impl WaveformStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest capture of `channel`
    pub fn publish(&self, channel: ChannelId, capture: Capture) -> Result<(), ContractError> {
        self.write()?.insert(channel, Arc::new(capture));
        Ok(())
    }

    /// Latest capture of `channel`
    pub fn latest(&self, channel: &str) -> Result<Option<Arc<Capture>>, ContractError> {
        Ok(self.read()?.get(channel).cloned())
    }

    /// Arrival signature of the latest capture of `channel`
    pub fn signature(&self, channel: &str) -> Result<Option<ArrivalSignature>, ContractError> {
        Ok(self.read()?.get(channel).map(|c| c.signature))
    }

    /// Run `f` on the latest captures of both channels while holding the
    /// read lock. Returns `Ok(None)` if either channel has no data.
    pub fn with_pair<R>(
        &self,
        primary: &str,
        secondary: &str,
        f: impl FnOnce(&Capture, &Capture) -> R,
    ) -> Result<Option<R>, ContractError> {
        let guard = self.read()?;
        match (guard.get(primary), guard.get(secondary)) {
            (Some(p), Some(s)) => Ok(Some(f(p, s))),
            _ => Ok(None),
        }
    }

    /// Drop every capture (acquisition subsystem teardown)
    pub fn clear(&self) -> Result<(), ContractError> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ChannelId, Arc<Capture>>>, ContractError> {
        self.inner.read().map_err(|_| ContractError::StorePoisoned)
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<ChannelId, Arc<Capture>>>, ContractError> {
        self.inner.write().map_err(|_| ContractError::StorePoisoned)
    }
}
