//! Hardware abstraction for the analog front end.
//!
//! The engine calls these once per tick and never retries or times out;
//! the board-support layer is expected to hand back latched, internally
//! consistent snapshots (single writer, single reader).

use crate::units::Celsius;

/// Shunt range selection. Chosen from the persisted power-mode setting, not
/// from the measured current; there is no auto-ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Range {
    #[default]
    Low,
    High,
    /// Shunt relay fully open. Used for the error shutdown path only.
    Disconnected,
}

/// Electrical regulation mode of the analog board. CR and CP are emulated
/// digitally on top of CC, so only CC and CV exist down here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogMode {
    ConstantCurrent,
    ConstantVoltage,
}

/// Which of the two temperature sensors to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempSensor {
    Sink,
    Ambient,
}

/// The analog front end as seen from the control loop.
///
/// Raw ADC/DAC codes cross this boundary; the calibration mapper owns the
/// conversion to physical units. Failures are invisible at this layer.
pub trait LoadHal {
    /// Latest latched current-sense ADC code.
    fn read_current_raw(&mut self) -> i32;
    /// Latest latched voltage-sense ADC code.
    fn read_voltage_raw(&mut self) -> i32;
    fn read_temperature(&mut self, sensor: TempSensor) -> Celsius;
    fn select_shunt_range(&mut self, range: Range);
    fn select_control_mode(&mut self, mode: AnalogMode);
    /// Write the set-point DAC. Full 16-bit code space.
    fn set_dac(&mut self, code: u16);
    fn read_trigger_in(&mut self) -> bool;
    fn set_trigger_out(&mut self, level: bool);
}

/// Full-scale DAC code.
pub const DAC_MAX: u16 = u16::MAX;
