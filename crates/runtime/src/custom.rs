//! Deployment-specific hook points, distinct from the hardware boundary:
//! stands in for the original's `custom_layer.h` (`initCustomLayer`,
//! `updateCustomIn`, `updateCustomOut`). Where [`HardwareLayer`] drives
//! physical/simulated I/O, a custom layer massages the image for a specific
//! deployment -- unit conversions, derived signals, ignored-pin bookkeeping
//! -- without needing its own hardware contract.
//!
//! [`HardwareLayer`]: crate::hardware::HardwareLayer

use crate::glue::image::IoImageState;

pub trait CustomLayer: Send + Sync {
    /// One-shot hook, called once during bootstrap after hardware init.
    fn init(&self) {}

    /// Runs every scan cycle, after `sample_inputs` and before the program
    /// `tick`, under the buffer lock.
    fn update_in(&self, _image: &mut IoImageState) {}

    /// Runs every scan cycle, after the program `tick` and before
    /// `commit_outputs`, under the buffer lock.
    fn update_out(&self, _image: &IoImageState) {}
}

/// Default custom layer for deployments with nothing to plug in here.
#[derive(Debug, Default)]
pub struct NoopCustomLayer;

impl CustomLayer for NoopCustomLayer {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glue::image::IoImageState;

    #[test]
    fn noop_custom_layer_touches_nothing() {
        let layer = NoopCustomLayer;
        let mut image = IoImageState::new();
        layer.init();
        layer.update_in(&mut image);
        layer.update_out(&image);
    }
}
