//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_calibration;
pub use validate::run_validate;

use correlator::DeviceCapabilities;

use crate::cli::DeviceArg;

/// Capabilities of the simulated device selected on the command line
pub(crate) fn device_capabilities(device: DeviceArg) -> Option<DeviceCapabilities> {
    match device {
        DeviceArg::None => None,
        DeviceArg::Simulated => Some(DeviceCapabilities::full()),
        DeviceArg::SimulatedNoFp64 => Some(DeviceCapabilities {
            shader_float64: false,
            ..DeviceCapabilities::full()
        }),
    }
}
