//! Collaborator traits - trigger subsystem and calibration sink
//!
//! The deskew session only talks to hardware through these seams; the
//! `instruments` crate provides simulated implementations.

use crate::{ContractError, InstrumentId};

/// Trigger subsystem of the instrument group
///
/// Arming is fire-and-forget: captures show up later in the
/// [`WaveformStore`](crate::WaveformStore) with a new arrival signature.
pub trait TriggerControl: Send + Sync {
    /// Name used for logging
    fn name(&self) -> &str;

    /// Arm every instrument of the group for one acquisition
    fn arm_single_shot(&self) -> Result<(), ContractError>;
}

/// Receives the final deskew value of a calibration session
pub trait CalibrationSink {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Record the skew (fs) to apply to `instrument`
    fn record_skew(&mut self, instrument: &InstrumentId, skew_fs: i64) -> Result<(), ContractError>;
}

impl<T: TriggerControl + ?Sized> TriggerControl for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn arm_single_shot(&self) -> Result<(), ContractError> {
        (**self).arm_single_shot()
    }
}
