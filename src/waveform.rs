//! Phase-accumulator waveform generator.
//!
//! A 16-bit phase wraps once per period and indexes the shape functions;
//! the per-tick increment is `(2^32 / period_ms) >> 16`, so period is
//! expressed directly in ticks without floating point. Sine comes from a
//! 1025-entry quarter-wave table with quadrant folding and linear
//! interpolation between adjacent entries; no runtime trig on an FPU-less
//! target.

use fugit::MillisDurationU32;

use crate::{
    context::{LoadCommand, Ownership, ParamRef, Producer},
    error::ConfigError,
    scaling::map_range,
    sine_table::SINE_QUARTER,
};

/// Waveform shape. `None` parks the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Form {
    #[default]
    None,
    Sine,
    Saw,
    Square,
    Triangle,
}

/// Shortest representable period: one tick per half-cycle.
pub const MIN_PERIOD_MS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct WaveformState {
    pub form: Form,
    /// Peak deviation from `offset`, in the target parameter's µ-unit.
    amplitude: i32,
    offset: i32,
    period_ms: u32,
    /// Derived display value, `1_000_000 / period_ms` (mHz). Kept mutually
    /// consistent with the period.
    frequency_mhz: u32,
    phase: u16,
    increment: u16,
    target: ParamRef,
    switched_on: bool,
}

impl Default for WaveformState {
    fn default() -> Self {
        let mut w = Self {
            form: Form::None,
            amplitude: 0,
            offset: 0,
            period_ms: 1000,
            frequency_mhz: 0,
            phase: 0,
            increment: 0,
            target: ParamRef::Current,
            switched_on: false,
        };
        w.set_period_ms(1000);
        w
    }
}

impl WaveformState {
    /// Advance one tick and, while switched on, write the sample into the
    /// owned target parameter.
    pub fn tick(&mut self, command: &mut LoadCommand) {
        if !self.switched_on {
            return;
        }
        self.phase = self.phase.wrapping_add(self.increment);
        command.set_param(self.target, self.value_at(self.phase));
    }

    /// The generator's output at an arbitrary phase, including `offset`.
    /// Periodic with period 65536 phase units.
    pub fn value_at(&self, phase: u16) -> i32 {
        let amp = self.amplitude;
        let swing = match self.form {
            Form::None => 0,
            Form::Square => {
                if phase < 32_768 { amp } else { -amp }
            }
            Form::Saw => map_range(phase as i32, 0, 65_535, -amp, amp),
            Form::Triangle => {
                if phase < 32_768 {
                    map_range(phase as i32, 0, 32_767, -amp, amp)
                } else {
                    map_range(phase as i32, 32_768, 65_535, amp, -amp)
                }
            }
            Form::Sine => sine_swing(phase, amp),
        };
        self.offset + swing
    }

    /// Claim the target parameter and start free-running.
    pub fn switch_on(&mut self, ownership: &mut Ownership) -> Result<(), ConfigError> {
        ownership.claim(self.target, Producer::Waveform)?;
        self.phase = 0;
        self.switched_on = true;
        Ok(())
    }

    pub fn switch_off(&mut self, ownership: &mut Ownership) {
        ownership.release(self.target, Producer::Waveform);
        self.switched_on = false;
    }

    pub fn is_on(&self) -> bool {
        self.switched_on
    }

    pub fn target(&self) -> ParamRef {
        self.target
    }

    /// Retarget the generator, moving the ownership claim when running.
    pub fn set_target(
        &mut self,
        target: ParamRef,
        ownership: &mut Ownership,
    ) -> Result<(), ConfigError> {
        if self.switched_on && target != self.target {
            ownership.claim(target, Producer::Waveform)?;
            ownership.release(self.target, Producer::Waveform);
        }
        self.target = target;
        Ok(())
    }

    pub fn set_period(&mut self, period: MillisDurationU32) {
        self.set_period_ms(period.ticks());
    }

    pub fn period(&self) -> MillisDurationU32 {
        MillisDurationU32::from_ticks(self.period_ms)
    }

    /// Frequency in millihertz.
    pub fn frequency_mhz(&self) -> u32 {
        self.frequency_mhz
    }

    /// Setting the frequency recomputes the period, and vice versa.
    pub fn set_frequency_mhz(&mut self, frequency_mhz: u32) {
        let period = if frequency_mhz == 0 {
            u32::MAX
        } else {
            1_000_000 / frequency_mhz
        };
        self.set_period_ms(period);
    }

    pub fn set_period_ms(&mut self, period_ms: u32) {
        self.period_ms = period_ms.max(MIN_PERIOD_MS);
        self.frequency_mhz = 1_000_000 / self.period_ms;
        self.increment = (((1u64 << 32) / self.period_ms as u64) >> 16) as u16;
    }

    pub fn amplitude(&self) -> i32 {
        self.amplitude
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn set_amplitude(&mut self, amplitude: i32) {
        self.amplitude = amplitude.max(0);
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    /// Lower swing extreme, the GUI's "min" field.
    pub fn min(&self) -> i32 {
        self.offset - self.amplitude
    }

    /// Upper swing extreme, the GUI's "max" field.
    pub fn max(&self) -> i32 {
        self.offset + self.amplitude
    }

    /// Editing min/max re-derives amplitude and offset.
    pub fn set_bounds(&mut self, min: i32, max: i32) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.amplitude = (max - min) / 2;
        self.offset = (max + min) / 2;
    }

    pub fn phase(&self) -> u16 {
        self.phase
    }
}

/// Sine deviation at `phase`, scaled to `amp`, via the quarter-wave table.
fn sine_swing(phase: u16, amp: i32) -> i32 {
    let quadrant = phase >> 14;
    let offset = (phase & 0x3FFF) as u32;
    let (index_phase, negate) = match quadrant {
        0 => (offset, false),
        1 => (16_384 - offset, false),
        2 => (offset, true),
        _ => (16_384 - offset, true),
    };
    // 16384 phase units span the 1024 table intervals: 16 units per entry.
    let idx = (index_phase >> 4) as usize;
    let frac = (index_phase & 0xF) as i64;
    let a = SINE_QUARTER[idx] as i64;
    let b = if idx < 1024 {
        SINE_QUARTER[idx + 1] as i64
    } else {
        a
    };
    let lut = a + (b - a) * frac / 16;
    let swing = (amp as i64 * lut / 65_535) as i32;
    if negate { -swing } else { swing }
}
