//! Error types for the load engine.

use thiserror::Error;

use crate::context::{ParamRef, Producer};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Errors on the serial command channel.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Line buffer overflow")]
    BufferError,
    #[error("Unknown command")]
    UnknownCommand,
}

/// Configuration mistakes reported to the caller instead of being applied.
///
/// The control loop itself never errors; out-of-range values clamp and
/// hardware faults surface through the sticky fault code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Two periodic producers may not drive the same target parameter.
    #[error("Parameter already driven by another source")]
    ParamBusy {
        param: ParamRef,
        owner: Producer,
    },
    /// Rule or timer index outside the fixed tables.
    #[error("Index out of range")]
    IndexOutOfRange,
    /// The fixed-capacity table is full.
    #[error("Table full")]
    TableFull,
}
