//! Hysteretic fault detection comparing commanded vs. measured state.
//!
//! Each condition drives a saturating counter: +2 per tick while it holds,
//! −1 per tick otherwise, clamped to 0..=254. Once a counter crosses the
//! threshold its bit in the sticky code is set and never cleared again by
//! this component; only an explicit operator reset clears it.

use modular_bitfield::prelude::*;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::context::{LoadCommand, LoadMeasurement, Mode};

/// Counter ceiling. Saturation keeps recovery time bounded.
pub const COUNTER_MAX: u8 = 254;
/// A fault bit latches once its counter exceeds this.
pub const COUNTER_THRESHOLD: u8 = 200;

/// Current flow measurable with conduction commanded off. 100 µA.
const LEAK_LIMIT_UA: i32 = 100;
/// Regulation deviation margins on top of ±12.5% (±25% for power).
const CC_MARGIN_UA: i32 = 10_000;
const CV_MARGIN_UV: i32 = 100_000;
const CP_MARGIN_UW: i32 = 100_000;

/// The four supervised conditions, in sticky-code bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum FaultKind {
    /// Measurable current while `power_on` is false.
    SinkWhileOff,
    /// CC regulation outside ±12.5% of target + 10 mA.
    CcOutOfBand,
    /// CV regulation outside ±12.5% of target + 100 mV.
    CvOutOfBand,
    /// CP regulation outside ±25% of target + 100 mW.
    CpOutOfBand,
}

/// The 32-bit sticky fault code, one flag per condition.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultCode {
    pub sink_while_off: bool,
    pub cc_out_of_band: bool,
    pub cv_out_of_band: bool,
    pub cp_out_of_band: bool,
    #[skip]
    __: B28,
}

impl FaultCode {
    /// The raw bitmask, as shown to the operator and tested by the
    /// turn-off-on-error shutdown path.
    pub fn bits(&self) -> u32 {
        u32::from_le_bytes(self.into_bytes())
    }

    pub fn any(&self) -> bool {
        self.bits() != 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorMonitor {
    counters: [u8; 4],
    code: FaultCode,
}

impl Default for ErrorMonitor {
    fn default() -> Self {
        Self {
            counters: [0; 4],
            code: FaultCode::new(),
        }
    }
}

impl ErrorMonitor {
    /// One tick of supervision. While the calibration procedure is active all
    /// conditions read as false, so counters decay and nothing new latches.
    pub fn update(&mut self, command: &LoadCommand, measurement: &LoadMeasurement, calibrating: bool) {
        for kind in FaultKind::iter() {
            let idx = kind as usize;
            let held = !calibrating && condition(kind, command, measurement);
            if held {
                self.counters[idx] = self.counters[idx].saturating_add(2).min(COUNTER_MAX);
            } else {
                self.counters[idx] = self.counters[idx].saturating_sub(1);
            }
            if self.counters[idx] > COUNTER_THRESHOLD {
                self.latch(kind);
            }
        }
    }

    pub fn code(&self) -> FaultCode {
        self.code
    }

    pub fn counter(&self, kind: FaultKind) -> u8 {
        self.counters[kind as usize]
    }

    /// Operator-initiated reset, the only way a latched bit clears.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn latch(&mut self, kind: FaultKind) {
        match kind {
            FaultKind::SinkWhileOff => self.code.set_sink_while_off(true),
            FaultKind::CcOutOfBand => self.code.set_cc_out_of_band(true),
            FaultKind::CvOutOfBand => self.code.set_cv_out_of_band(true),
            FaultKind::CpOutOfBand => self.code.set_cp_out_of_band(true),
        }
    }
}

fn condition(kind: FaultKind, command: &LoadCommand, measurement: &LoadMeasurement) -> bool {
    match kind {
        FaultKind::SinkWhileOff => {
            !command.power_on && measurement.current.abs().0 > LEAK_LIMIT_UA
        }
        FaultKind::CcOutOfBand => {
            command.mode == Mode::Cc
                && measurement.voltage.0 > 500_000
                && deviates(measurement.current.0, command.current.0, 8, CC_MARGIN_UA)
        }
        FaultKind::CvOutOfBand => {
            command.mode == Mode::Cv
                && measurement.current.0 > 1_000
                && deviates(measurement.voltage.0, command.voltage.0, 8, CV_MARGIN_UV)
        }
        FaultKind::CpOutOfBand => {
            command.mode == Mode::Cp
                && (measurement.current.0 > 1_000 || measurement.voltage.0 > 500_000)
                && deviates(measurement.power.0, command.power.0, 4, CP_MARGIN_UW)
        }
    }
}

/// |measured − target| > target / divisor + margin. Divisor 8 is ±12.5%,
/// divisor 4 is ±25%.
fn deviates(measured: i32, target: i32, divisor: i32, margin: i32) -> bool {
    let band = target.abs() / divisor + margin;
    (measured as i64 - target as i64).abs() > band as i64
}
