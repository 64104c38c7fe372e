//! Typed errors for the runtime's internal module boundaries. `main` and
//! `bootstrap` collect context with `anyhow`; these enums exist so callers
//! one layer down can match on the error kind instead of inspecting a
//! formatted chain.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} could not be read: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: ini::Error,
    },
}

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("hardware initialization failed: {0}")]
    InitFailed(String),
}

/// The Modbus exception codes this slave can emit. `Busy` is defined for
/// completeness with the original's error table but no handler raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModbusException {
    #[error("illegal function")]
    IllegalFunction = 1,
    #[error("illegal data address")]
    IllegalDataAddress = 2,
    #[error("illegal data value")]
    IllegalDataValue = 3,
    #[error("slave device failure")]
    SlaveDeviceFailure = 4,
    #[error("slave device busy")]
    Busy = 6,
}

impl ModbusException {
    pub fn code(self) -> u8 {
        self as u8
    }
}
