//! The hardware abstraction boundary: whatever drives physical or simulated
//! I/O. `sample_inputs`/`commit_outputs` run once per scan cycle, inside the
//! buffer lock, so implementations must return quickly.

use crate::error::HardwareError;
use crate::glue::image::IoImageState;

pub trait HardwareLayer: Send + Sync {
    fn initialize(&self) -> Result<(), HardwareError>;
    fn finalize(&self);

    /// Copies physical/simulated input state into the image's input arrays.
    fn sample_inputs(&self, image: &mut IoImageState);

    /// Drives physical/simulated outputs from the image's output arrays.
    fn commit_outputs(&self, image: &IoImageState);
}

pub mod simulator;
pub use simulator::SimulatorHardware;
