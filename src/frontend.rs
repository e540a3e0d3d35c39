//! Calibrated access to the analog front end.
//!
//! We use the nomenclature that "set" means to command an actuation and
//! "read" means to get back a measured value. Out-of-range set-points are
//! silently clamped; that is documented behavior, not an error condition.

use crate::{
    calibration::CalibrationTables,
    hal::{AnalogMode, DAC_MAX, LoadHal, Range, TempSensor},
    units::{Celsius, MicroAmps, MicroVolts},
};

/// Owns the HAL plus the active calibration and shunt range.
pub struct Frontend<H: LoadHal> {
    hal: H,
    pub cal: CalibrationTables,
    range: Range,
}

impl<H: LoadHal> Frontend<H> {
    pub fn new(mut hal: H, cal: CalibrationTables) -> Self {
        hal.select_shunt_range(Range::Low);
        Self {
            hal,
            cal,
            range: Range::Low,
        }
    }

    pub fn range(&self) -> Range {
        self.range
    }

    /// Switch the shunt relays. No-op when the range is already selected, so
    /// the relay driver is only exercised on actual transitions.
    pub fn select_range(&mut self, range: Range) {
        if self.range != range {
            self.range = range;
            self.hal.select_shunt_range(range);
        }
    }

    pub fn select_control_mode(&mut self, mode: AnalogMode) {
        self.hal.select_control_mode(mode);
    }

    /// Command a sunk current. Clamps to `[0, max]`, converts through the
    /// shunt factor on the high range, maps through the current-set table and
    /// clamps the resulting DAC code to its valid span.
    pub fn set_current(&mut self, current: MicroAmps, max: MicroAmps) {
        let clamped = current.0.clamp(0, max.0);
        let table_value = match self.range {
            Range::High => self.cal.set_through_shunt(clamped),
            Range::Low | Range::Disconnected => clamped,
        };
        self.write_dac(self.cal.current_set.to_raw(table_value));
    }

    /// Command a regulated voltage through the voltage-set table.
    pub fn set_voltage(&mut self, voltage: MicroVolts) {
        self.write_dac(self.cal.voltage_set.to_raw(voltage.0.max(0)));
    }

    /// Raw DAC write, used by the calibration procedure's override path.
    pub fn set_dac_raw(&mut self, code: u16) {
        self.hal.set_dac(code);
    }

    /// Measured current through the sense table, rescaled out of the shunt
    /// factor when the high-power range is active.
    pub fn read_current(&mut self) -> MicroAmps {
        let raw = self.hal.read_current_raw();
        let physical = self.cal.current_sense.to_physical(raw);
        MicroAmps(match self.range {
            Range::High => self.cal.sense_through_shunt(physical),
            Range::Low | Range::Disconnected => physical,
        })
    }

    pub fn read_voltage(&mut self) -> MicroVolts {
        let raw = self.hal.read_voltage_raw();
        MicroVolts(self.cal.voltage_sense.to_physical(raw))
    }

    pub fn read_temperature(&mut self, sensor: TempSensor) -> Celsius {
        self.hal.read_temperature(sensor)
    }

    pub fn read_trigger_in(&mut self) -> bool {
        self.hal.read_trigger_in()
    }

    pub fn set_trigger_out(&mut self, level: bool) {
        self.hal.set_trigger_out(level);
    }

    fn write_dac(&mut self, code: i32) {
        self.hal.set_dac(code.clamp(0, DAC_MAX as i32) as u16);
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }
}
