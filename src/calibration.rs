//! Two-point piecewise-linear calibration between raw DAC/ADC codes and
//! physical µ-units.
//!
//! Each channel carries exactly two `(raw, physical)` pairs acquired by the
//! (out-of-scope) calibration procedure, which validates monotonicity before
//! committing a table; the mapper never re-validates at use time. Linear
//! extrapolation beyond the two points is permitted and expected.

use crate::scaling::map_range;

/// One acquired calibration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalPoint {
    pub raw: i32,
    pub physical: i32,
}

/// A two-point channel: DAC→physical for set channels, ADC→physical for
/// sense channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalChannel {
    pub lo: CalPoint,
    pub hi: CalPoint,
}

impl CalChannel {
    pub const fn new(lo: CalPoint, hi: CalPoint) -> Self {
        Self { lo, hi }
    }

    /// Map a raw converter code to its physical value.
    pub fn to_physical(&self, raw: i32) -> i32 {
        map_range(raw, self.lo.raw, self.hi.raw, self.lo.physical, self.hi.physical)
    }

    /// Map a physical value back to a raw converter code.
    pub fn to_raw(&self, physical: i32) -> i32 {
        map_range(physical, self.lo.physical, self.hi.physical, self.lo.raw, self.hi.raw)
    }
}

/// `shunt_factor` fixed-point base: 10000 == 1.0.
pub const SHUNT_FACTOR_ONE: i32 = 10_000;

/// The full calibration set for the analog front end.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationTables {
    /// DAC code → sunk current, calibrated on the low-range shunt.
    pub current_set: CalChannel,
    /// ADC code → measured current, calibrated on the low-range shunt.
    pub current_sense: CalChannel,
    /// DAC code → regulated voltage.
    pub voltage_set: CalChannel,
    /// ADC code → measured voltage.
    pub voltage_sense: CalChannel,
    /// Ratio of high-range to low-range current for the same shunt sense
    /// voltage, base 10000. Sense readings multiply by it, set-points divide.
    pub shunt_factor: i32,
    /// Calibration procedure in progress: mode actuation is bypassed in favor
    /// of the raw DAC override and the safety shutdown is disabled.
    pub active: bool,
}

impl Default for CalibrationTables {
    /// Nominal transfer of the analog board, used when no valid calibration
    /// is persisted: 16-bit codes spanning 0–10 A and 0–40 V, low and high
    /// ranges 1:10.
    fn default() -> Self {
        let amps = CalChannel::new(
            CalPoint { raw: 0, physical: 0 },
            CalPoint {
                raw: 65_535,
                physical: 10_000_000,
            },
        );
        let volts = CalChannel::new(
            CalPoint { raw: 0, physical: 0 },
            CalPoint {
                raw: 65_535,
                physical: 40_000_000,
            },
        );
        Self {
            current_set: amps,
            current_sense: amps,
            voltage_set: volts,
            voltage_sense: volts,
            shunt_factor: 10 * SHUNT_FACTOR_ONE,
            active: false,
        }
    }
}

impl CalibrationTables {
    /// Boot path: use the persisted tables when the persistence collaborator
    /// marked them valid, otherwise fall back to the nominal transfer.
    pub fn from_persisted(tables: Option<CalibrationTables>) -> Self {
        tables.unwrap_or_default()
    }

    /// Scale a low-range-calibrated sense reading up to the high range.
    pub fn sense_through_shunt(&self, physical: i32) -> i32 {
        (physical as i64 * self.shunt_factor as i64 / SHUNT_FACTOR_ONE as i64) as i32
    }

    /// Scale a high-range set-point down into the low-range table domain.
    pub fn set_through_shunt(&self, physical: i32) -> i32 {
        if self.shunt_factor == 0 {
            return physical;
        }
        (physical as i64 * SHUNT_FACTOR_ONE as i64 / self.shunt_factor as i64) as i32
    }
}
