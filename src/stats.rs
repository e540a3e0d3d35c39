//! Running statistics over the measured channels.

use crate::context::LoadMeasurement;

/// min/max/avg/sum aggregation over one measured quantity.
///
/// `min` starts at `i32::MAX` (and `max` at `i32::MIN`) so the first sample
/// becomes both extremes. The average is a truncating integer division,
/// recomputed on every update.
#[derive(Debug, Clone, Copy)]
pub struct StatChannel {
    pub min: i32,
    pub max: i32,
    pub avg: i32,
    pub sum: i64,
    pub nsamples: u32,
}

impl Default for StatChannel {
    fn default() -> Self {
        Self {
            min: i32::MAX,
            max: i32::MIN,
            avg: 0,
            sum: 0,
            nsamples: 0,
        }
    }
}

impl StatChannel {
    pub fn update(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value as i64;
        self.nsamples += 1;
        self.avg = (self.sum / self.nsamples as i64) as i32;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One channel per displayed quantity, updated at the end of every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub voltage: StatChannel,
    pub current: StatChannel,
    pub power: StatChannel,
}

impl Statistics {
    pub fn update(&mut self, measurement: &LoadMeasurement) {
        self.voltage.update(measurement.voltage.0);
        self.current.update(measurement.current.0);
        self.power.update(measurement.power.0);
    }

    pub fn reset(&mut self) {
        self.voltage.reset();
        self.current.reset();
        self.power.reset();
    }
}
