use tracing::info;

use super::HardwareLayer;
use crate::error::HardwareError;
use crate::glue::image::IoImageState;

/// Stand-in hardware layer used when no physical I/O is attached. Never
/// fails to initialize; loops `bool_output[0][0]` back into
/// `bool_input[0][0]` so a Modbus client can observe its own writes come
/// back around a scan cycle later. Real fieldbus/GPIO backends would
/// implement the same trait.
#[derive(Debug, Default)]
pub struct SimulatorHardware;

impl SimulatorHardware {
    pub fn new() -> Self {
        Self
    }
}

impl HardwareLayer for SimulatorHardware {
    fn initialize(&self) -> Result<(), HardwareError> {
        info!("simulator hardware layer initialized, no physical I/O attached");
        Ok(())
    }

    fn finalize(&self) {
        info!("simulator hardware layer finalized");
    }

    fn sample_inputs(&self, image: &mut IoImageState) {
        if let Some(value) = image.bool_output[0][0] {
            image.bool_input[0][0] = Some(value);
        }
    }

    fn commit_outputs(&self, _image: &IoImageState) {
        // The simulator has nothing physical to drive.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glue::image::{BoolArray, IoImageState};

    #[test]
    fn loops_output_back_into_input() {
        let hardware = SimulatorHardware::new();
        let mut image = IoImageState::new();
        image.bind_bool(BoolArray::Input, 0, 0, false);
        image.bind_bool(BoolArray::Output, 0, 0, true);

        hardware.sample_inputs(&mut image);

        assert_eq!(image.bool_at(BoolArray::Input, 0, 0), Ok(true));
    }

    #[test]
    fn does_nothing_when_output_unbound() {
        let hardware = SimulatorHardware::new();
        let mut image = IoImageState::new();
        image.bind_bool(BoolArray::Input, 0, 0, false);

        hardware.sample_inputs(&mut image);

        assert_eq!(image.bool_at(BoolArray::Input, 0, 0), Ok(false));
    }
}
