//! Fixed-point physical units used throughout the engine.
//!
//! Every quantity is a signed 32-bit integer in micro- (or milli-) units, the
//! same representation the analog front end works in. The newtypes exist to
//! stop µA/µV/mΩ/µW mix-ups at compile time; arithmetic that crosses units
//! goes through the raw `i32` value deliberately.

/// Current in microamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MicroAmps(pub i32);

/// Voltage in microvolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MicroVolts(pub i32);

/// Resistance in milliohms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MilliOhms(pub i32);

/// Power in microwatts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MicroWatts(pub i32);

/// Temperature in whole degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Celsius(pub i16);

impl MicroAmps {
    pub const ZERO: Self = Self(0);

    /// Magnitude, for fault comparisons on signed readings.
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl MicroVolts {
    pub const ZERO: Self = Self(0);

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

impl MicroWatts {
    pub const ZERO: Self = Self(0);

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }
}

/// Power from a measured voltage/current pair.
///
/// µV · µA = 10^-12 W, so the product is divided back down to µW in i64.
pub const fn power_from(voltage: MicroVolts, current: MicroAmps) -> MicroWatts {
    MicroWatts(((voltage.0 as i64 * current.0 as i64) / 1_000_000) as i32)
}
