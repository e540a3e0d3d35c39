//! We use this mocking module in unit tests to emulate the analog front end.

use crate::{
    hal::{AnalogMode, LoadHal, Range, TempSensor},
    units::Celsius,
};

/// Scriptable analog board: tests preload the ADC/temperature/trigger
/// readings and inspect the recorded DAC, relay and trigger writes.
pub struct MockHal {
    /// Next current-sense ADC code to hand back.
    pub current_raw: i32,
    /// Next voltage-sense ADC code to hand back.
    pub voltage_raw: i32,
    pub temp_sink: Celsius,
    pub temp_ambient: Celsius,
    pub trigger_in: bool,
    /// Every DAC code written, in order.
    pub dac_writes: heapless::Vec<u16, 64>,
    /// Most recent shunt range selection.
    pub range: Range,
    /// Number of relay writes seen.
    pub range_writes: usize,
    /// Most recent analog mode selection.
    pub analog_mode: Option<AnalogMode>,
    pub trigger_out: bool,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            current_raw: 0,
            voltage_raw: 0,
            temp_sink: Celsius(25),
            temp_ambient: Celsius(25),
            trigger_in: false,
            dac_writes: heapless::Vec::new(),
            range: Range::Low,
            range_writes: 0,
            analog_mode: None,
            trigger_out: false,
        }
    }

    pub fn last_dac(&self) -> Option<u16> {
        self.dac_writes.last().copied()
    }
}

impl LoadHal for MockHal {
    fn read_current_raw(&mut self) -> i32 {
        self.current_raw
    }

    fn read_voltage_raw(&mut self) -> i32 {
        self.voltage_raw
    }

    fn read_temperature(&mut self, sensor: TempSensor) -> Celsius {
        match sensor {
            TempSensor::Sink => self.temp_sink,
            TempSensor::Ambient => self.temp_ambient,
        }
    }

    fn select_shunt_range(&mut self, range: Range) {
        self.range = range;
        self.range_writes += 1;
    }

    fn select_control_mode(&mut self, mode: AnalogMode) {
        self.analog_mode = Some(mode);
    }

    fn set_dac(&mut self, code: u16) {
        // Keep only the tail once the log fills; tests care about recency.
        if self.dac_writes.is_full() {
            self.dac_writes.remove(0);
        }
        let _ = self.dac_writes.push(code);
    }

    fn read_trigger_in(&mut self) -> bool {
        self.trigger_in
    }

    fn set_trigger_out(&mut self, level: bool) {
        self.trigger_out = level;
    }
}
