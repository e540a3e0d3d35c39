//! Shared per-tick state: the commanded operating point, the latest
//! measurement snapshot, persisted settings and producer arbitration.
//!
//! One [`ControlContext`] is owned by the engine and passed by mutable
//! reference into each subsystem's tick; no subsystem keeps its own copy of
//! shared fields.

use strum::EnumCount;
use strum_macros::{EnumCount as EnumCountMacro, EnumIter};

use crate::{
    error::ConfigError,
    hal::{AnalogMode, Range},
    units::{Celsius, MicroAmps, MicroVolts, MicroWatts, MilliOhms},
};

/// Operating mode of the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter)]
pub enum Mode {
    /// Constant current.
    #[default]
    Cc,
    /// Constant voltage.
    Cv,
    /// Constant resistance (emulated over CC).
    Cr,
    /// Constant power (emulated over CC).
    Cp,
}

impl Mode {
    /// Electrical mode the analog board must be in for this logical mode.
    /// CR and CP regulate digitally on top of the CC loop.
    pub const fn analog(self) -> AnalogMode {
        match self {
            Mode::Cv => AnalogMode::ConstantVoltage,
            Mode::Cc | Mode::Cr | Mode::Cp => AnalogMode::ConstantCurrent,
        }
    }
}

/// Tagged selector for "the currently targeted parameter", replacing the raw
/// `int32_t *` the waveform/arbitrary/event subsystems used to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCountMacro)]
pub enum ParamRef {
    Current,
    Voltage,
    Resistance,
    Power,
}

/// A periodic producer that can claim write ownership of one parameter.
///
/// Manual (front panel / remote) writes always go through; only the two
/// tick-driven generators need arbitration, since both writing the same
/// field would silently interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    Waveform,
    Arbitrary,
}

/// Single-owner arbitration over the four target parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ownership {
    owners: [Option<Producer>; ParamRef::COUNT],
}

impl Ownership {
    pub fn owner(&self, param: ParamRef) -> Option<Producer> {
        self.owners[param as usize]
    }

    /// Claim `param` for `producer`. Re-claiming by the same producer is a
    /// no-op; a second producer gets [`ConfigError::ParamBusy`].
    pub fn claim(&mut self, param: ParamRef, producer: Producer) -> Result<(), ConfigError> {
        match self.owners[param as usize] {
            None => {
                self.owners[param as usize] = Some(producer);
                Ok(())
            }
            Some(owner) if owner == producer => Ok(()),
            Some(owner) => Err(ConfigError::ParamBusy { param, owner }),
        }
    }

    /// Release `param` if `producer` holds it.
    pub fn release(&mut self, param: ParamRef, producer: Producer) {
        if self.owners[param as usize] == Some(producer) {
            self.owners[param as usize] = None;
        }
    }
}

/// The commanded operating point. All four targets are held simultaneously so
/// that switching modes preserves the inactive ones.
#[derive(Debug, Clone, Copy)]
pub struct LoadCommand {
    pub mode: Mode,
    pub current: MicroAmps,
    pub voltage: MicroVolts,
    pub resistance: MilliOhms,
    pub power: MicroWatts,
    /// Conduction enable. Forced off by the safety shutdown and by a
    /// single-shot sequence completing.
    pub power_on: bool,
    /// Test/calibration override: front-panel and remote input is ignored.
    pub io_control_disabled: bool,
    /// Raw DAC code driven while the calibration procedure is active.
    pub dac_override: u16,
}

impl Default for LoadCommand {
    fn default() -> Self {
        Self {
            mode: Mode::Cc,
            current: MicroAmps::ZERO,
            voltage: MicroVolts::ZERO,
            // 1 Ω floor so CR never divides by zero.
            resistance: MilliOhms(1000),
            power: MicroWatts::ZERO,
            power_on: false,
            io_control_disabled: false,
            dac_override: 0,
        }
    }
}

impl LoadCommand {
    /// Read the target selected by `param`, in its native µ-unit.
    pub fn param(&self, param: ParamRef) -> i32 {
        match param {
            ParamRef::Current => self.current.0,
            ParamRef::Voltage => self.voltage.0,
            ParamRef::Resistance => self.resistance.0,
            ParamRef::Power => self.power.0,
        }
    }

    /// Write the target selected by `param`.
    pub fn set_param(&mut self, param: ParamRef, value: i32) {
        match param {
            ParamRef::Current => self.current = MicroAmps(value),
            ParamRef::Voltage => self.voltage = MicroVolts(value),
            ParamRef::Resistance => self.resistance = MilliOhms(value.max(1)),
            ParamRef::Power => self.power = MicroWatts(value),
        }
    }
}

/// Instantaneous measurements, written once per tick from calibrated reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadMeasurement {
    pub current: MicroAmps,
    pub voltage: MicroVolts,
    /// Derived each tick from the measured voltage/current pair.
    pub power: MicroWatts,
    pub temp_sink: Celsius,
    pub temp_ambient: Celsius,
    /// Hotter of the two sensors; drives the over-temperature interlock.
    pub temp_high: Celsius,
}

/// Persisted settings the engine consults each tick. Loaded at boot by the
/// (out-of-scope) persistence collaborator.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Requested shunt range. `Range::Disconnected` is not a valid setting
    /// and is treated as `Low`.
    pub power_mode: Range,
    /// Disconnect the shunt and force conduction off while the sticky fault
    /// code is non-zero.
    pub turn_off_on_error: bool,
    pub max_current_low: MicroAmps,
    pub max_current_high: MicroAmps,
    /// Interlock threshold for the hotter temperature sensor.
    pub over_temp: Celsius,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            power_mode: Range::Low,
            turn_off_on_error: true,
            max_current_low: MicroAmps(3_000_000),
            max_current_high: MicroAmps(10_000_000),
            over_temp: Celsius(85),
        }
    }
}

impl Settings {
    pub fn max_current(&self, range: Range) -> MicroAmps {
        match range {
            Range::High => self.max_current_high,
            Range::Low | Range::Disconnected => self.max_current_low,
        }
    }
}

/// Everything the subsystems share, passed by `&mut` into each tick.
#[derive(Debug, Default)]
pub struct ControlContext {
    pub command: LoadCommand,
    pub measurement: LoadMeasurement,
    pub settings: Settings,
    pub ownership: Ownership,
    /// Level requested for the trigger output; written to the HAL once per
    /// tick by the engine.
    pub trigger_out: bool,
}
