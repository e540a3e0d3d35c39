//! The control loop: one `tick()` per millisecond, invoked by an external
//! scheduler.
//!
//! Tick order is fixed: shunt range selection, calibrated measurement read,
//! fault-counter update, then (unless calibrating) events → arbitrary
//! sequence → waveform → parameter clamp → mode actuation → trigger out →
//! shutdown check, and finally statistics. Mode transitions happen only on
//! explicit command, never inferred from measurements.

use crate::{
    arbitrary::ArbitrarySequence,
    calibration::CalibrationTables,
    context::{ControlContext, Mode, Settings},
    events::EventEngine,
    frontend::Frontend,
    hal::{DAC_MAX, LoadHal, Range, TempSensor},
    monitor::ErrorMonitor,
    stats::Statistics,
    units::{MicroAmps, MicroVolts, power_from},
    waveform::WaveformState,
};

pub struct LoadEngine<H: LoadHal> {
    pub frontend: Frontend<H>,
    pub ctx: ControlContext,
    pub waveform: WaveformState,
    pub arbitrary: ArbitrarySequence,
    pub events: EventEngine,
    pub monitor: ErrorMonitor,
    pub stats: Statistics,
}

impl<H: LoadHal> LoadEngine<H> {
    pub fn new(hal: H, cal: CalibrationTables, settings: Settings) -> Self {
        let mut engine = Self {
            frontend: Frontend::new(hal, cal),
            ctx: ControlContext::default(),
            waveform: WaveformState::default(),
            arbitrary: ArbitrarySequence::default(),
            events: EventEngine::default(),
            monitor: ErrorMonitor::default(),
            stats: Statistics::default(),
        };
        engine.ctx.settings = settings;
        engine
    }

    /// Boot path: persisted calibration when the persistence collaborator
    /// marked it valid, nominal fallback otherwise.
    pub fn from_persisted(hal: H, cal: Option<CalibrationTables>, settings: Settings) -> Self {
        Self::new(hal, CalibrationTables::from_persisted(cal), settings)
    }

    /// One millisecond of the control loop.
    pub fn tick(&mut self) {
        self.select_range();
        self.read_measurements();

        let calibrating = self.frontend.cal.active;
        self.monitor
            .update(&self.ctx.command, &self.ctx.measurement, calibrating);

        if calibrating {
            // The calibration procedure drives the DAC directly, but the
            // analog board must still be configured for the logical mode so
            // its measurements see the right hardware path.
            self.frontend
                .select_control_mode(self.ctx.command.mode.analog());
            self.frontend.set_dac_raw(self.ctx.command.dac_override);
        } else {
            self.events.tick_timers();
            let trigger_in = self.frontend.read_trigger_in();
            self.events.update_trigger(trigger_in);
            self.events.evaluate(&mut self.ctx);

            self.arbitrary.tick(&mut self.ctx.command);
            self.waveform.tick(&mut self.ctx.command);

            self.clamp_command();
            self.actuate();
            self.frontend.set_trigger_out(self.ctx.trigger_out);

            // Idempotent shutdown: repeats every tick while the code stands.
            if self.ctx.settings.turn_off_on_error && self.monitor.code().any() {
                self.ctx.command.power_on = false;
            }
        }

        self.stats.update(&self.ctx.measurement);
    }

    /// Low unless the persisted power mode asks for High; a standing fault
    /// with turn-off-on-error configured disconnects the shunt entirely and
    /// forces conduction off. An active calibration suspends the disconnect:
    /// the procedure has to sink current even with a stale latched code.
    fn select_range(&mut self) {
        let mut range = match self.ctx.settings.power_mode {
            Range::High => Range::High,
            Range::Low | Range::Disconnected => Range::Low,
        };
        if !self.frontend.cal.active
            && self.ctx.settings.turn_off_on_error
            && self.monitor.code().any()
        {
            range = Range::Disconnected;
            self.ctx.command.power_on = false;
        }
        self.frontend.select_range(range);
    }

    fn read_measurements(&mut self) {
        let current = self.frontend.read_current();
        let voltage = self.frontend.read_voltage();
        let temp_sink = self.frontend.read_temperature(TempSensor::Sink);
        let temp_ambient = self.frontend.read_temperature(TempSensor::Ambient);

        let m = &mut self.ctx.measurement;
        m.current = current;
        m.voltage = voltage;
        m.power = power_from(voltage, current);
        m.temp_sink = temp_sink;
        m.temp_ambient = temp_ambient;
        m.temp_high = temp_sink.max(temp_ambient);
    }

    fn clamp_command(&mut self) {
        let max = self.ctx.settings.max_current(self.frontend.range());
        let cmd = &mut self.ctx.command;
        cmd.current = MicroAmps(cmd.current.0.clamp(0, max.0));
        cmd.voltage = MicroVolts(cmd.voltage.0.max(0));
        cmd.power.0 = cmd.power.0.max(0);
        cmd.resistance.0 = cmd.resistance.0.max(1);
    }

    /// Mode-specific actuation through the calibration mapper.
    fn actuate(&mut self) {
        let cmd = self.ctx.command;
        let meas = self.ctx.measurement;
        self.frontend.select_control_mode(cmd.mode.analog());

        let enable = cmd.power_on && meas.temp_high < self.ctx.settings.over_temp;
        let max = self.ctx.settings.max_current(self.frontend.range());

        match cmd.mode {
            Mode::Cc => {
                let target = if enable { cmd.current } else { MicroAmps::ZERO };
                self.frontend.set_current(target, max);
            }
            Mode::Cv => {
                if enable {
                    self.frontend.set_voltage(cmd.voltage);
                } else {
                    // Full-scale DAC stops conduction in CV, the same safety
                    // direction as CC's zero.
                    self.frontend.set_dac_raw(DAC_MAX);
                }
            }
            // CR and CP re-derive a current target from the measurement taken
            // earlier this tick, which reflects the previous tick's actuation.
            // The one-tick lag is the accepted regulation characteristic.
            Mode::Cr => {
                let derived =
                    (meas.voltage.0 as i64 * 1000 / cmd.resistance.0.max(1) as i64) as i32;
                let target = if enable { MicroAmps(derived) } else { MicroAmps::ZERO };
                self.frontend.set_current(target, max);
            }
            Mode::Cp => {
                let derived = if meas.voltage.0 > 0 {
                    (cmd.power.0 as i64 * 1_000_000 / meas.voltage.0 as i64) as i32
                } else {
                    0
                };
                let target = if enable { MicroAmps(derived) } else { MicroAmps::ZERO };
                self.frontend.set_current(target, max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{EventAction, EventRule, EventSource},
        hal::AnalogMode,
        mock_hal::MockHal,
        units::{Celsius, MicroWatts, MilliOhms},
        waveform::Form,
    };

    fn engine() -> LoadEngine<MockHal> {
        LoadEngine::new(
            MockHal::new(),
            CalibrationTables::default(),
            Settings::default(),
        )
    }

    /// Point the scripted ADC codes at the given physical operating point.
    fn script_measurement(engine: &mut LoadEngine<MockHal>, ua: i32, uv: i32) {
        let current_raw = engine.frontend.cal.current_sense.to_raw(ua);
        let voltage_raw = engine.frontend.cal.voltage_sense.to_raw(uv);
        let hal = engine.frontend.hal_mut();
        hal.current_raw = current_raw;
        hal.voltage_raw = voltage_raw;
    }

    #[test]
    fn steady_cc_operation_actuates_and_stays_clean() {
        let mut engine = engine();
        engine.ctx.command.mode = Mode::Cc;
        engine.ctx.command.current = MicroAmps(500_000);
        engine.ctx.command.power_on = true;
        script_measurement(&mut engine, 500_000, 5_000_000);

        for _ in 0..200 {
            engine.tick();
        }

        let expected = engine.frontend.cal.current_set.to_raw(500_000) as u16;
        assert_eq!(engine.frontend.hal().last_dac(), Some(expected));
        assert_eq!(engine.frontend.hal().analog_mode, Some(AnalogMode::ConstantCurrent));
        assert!(!engine.monitor.code().any());
        assert!(engine.ctx.command.power_on);
        assert_eq!(engine.stats.current.nsamples, 200);
    }

    #[test]
    fn power_off_commands_zero_current() {
        let mut engine = engine();
        engine.ctx.command.current = MicroAmps(500_000);
        engine.ctx.command.power_on = false;
        engine.tick();
        assert_eq!(engine.frontend.hal().last_dac(), Some(0));
    }

    #[test]
    fn cv_disable_commands_full_scale() {
        let mut engine = engine();
        engine.ctx.command.mode = Mode::Cv;
        engine.ctx.command.voltage = MicroVolts(12_000_000);
        engine.ctx.command.power_on = false;
        engine.tick();
        assert_eq!(engine.frontend.hal().last_dac(), Some(DAC_MAX));
        assert_eq!(engine.frontend.hal().analog_mode, Some(AnalogMode::ConstantVoltage));
    }

    #[test]
    fn cr_derives_current_from_measured_voltage() {
        let mut engine = engine();
        engine.ctx.command.mode = Mode::Cr;
        engine.ctx.command.resistance = MilliOhms(1_000); // 1 Ω
        engine.ctx.command.power_on = true;
        script_measurement(&mut engine, 2_000_000, 2_000_000);

        engine.tick();

        // 2 V across 1 Ω asks for 2 A.
        let code = engine.frontend.hal().last_dac().unwrap() as i32;
        let expected = engine.frontend.cal.current_set.to_raw(2_000_000);
        assert!((code - expected).abs() <= 16, "code={code} expected={expected}");
    }

    #[test]
    fn cp_derives_current_from_measured_voltage() {
        let mut engine = engine();
        engine.ctx.command.mode = Mode::Cp;
        engine.ctx.command.power = MicroWatts(4_000_000); // 4 W
        engine.ctx.command.power_on = true;
        script_measurement(&mut engine, 2_000_000, 2_000_000);

        engine.tick();

        // 4 W at 2 V asks for 2 A.
        let code = engine.frontend.hal().last_dac().unwrap() as i32;
        let expected = engine.frontend.cal.current_set.to_raw(2_000_000);
        assert!((code - expected).abs() <= 16, "code={code} expected={expected}");
    }

    #[test]
    fn cp_with_no_voltage_commands_zero() {
        let mut engine = engine();
        engine.ctx.command.mode = Mode::Cp;
        engine.ctx.command.power = MicroWatts(4_000_000);
        engine.ctx.command.power_on = true;
        engine.tick();
        assert_eq!(engine.frontend.hal().last_dac(), Some(0));
    }

    #[test]
    fn over_temperature_interlock_forces_safe_actuation() {
        let mut engine = engine();
        engine.ctx.command.current = MicroAmps(1_000_000);
        engine.ctx.command.power_on = true;
        engine.frontend.hal_mut().temp_sink = Celsius(95);
        engine.tick();
        assert_eq!(engine.frontend.hal().last_dac(), Some(0));
        // The command itself survives; only the actuation is interlocked.
        assert!(engine.ctx.command.power_on);
        assert_eq!(engine.ctx.measurement.temp_high, Celsius(95));
    }

    #[test]
    fn standing_fault_disconnects_shunt_and_forces_off() {
        let mut engine = engine();
        // Leak current with conduction off latches SinkWhileOff.
        engine.ctx.command.power_on = false;
        script_measurement(&mut engine, 50_000, 0);

        for _ in 0..150 {
            engine.tick();
        }
        assert!(engine.monitor.code().sink_while_off());

        engine.ctx.command.power_on = true; // operator tries to re-enable
        engine.tick();
        engine.tick();
        assert!(!engine.ctx.command.power_on);
        assert_eq!(engine.frontend.hal().range, Range::Disconnected);
    }

    #[test]
    fn fault_without_turn_off_on_error_keeps_running() {
        let mut engine = engine();
        engine.ctx.settings.turn_off_on_error = false;
        engine.ctx.command.power_on = false;
        script_measurement(&mut engine, 50_000, 0);
        for _ in 0..150 {
            engine.tick();
        }
        assert!(engine.monitor.code().sink_while_off());
        engine.ctx.command.power_on = true;
        engine.tick();
        assert!(engine.ctx.command.power_on);
        assert_eq!(engine.frontend.hal().range, Range::Low);
    }

    #[test]
    fn high_power_mode_selects_high_range() {
        let mut engine = engine();
        engine.ctx.settings.power_mode = Range::High;
        engine.tick();
        assert_eq!(engine.frontend.hal().range, Range::High);
    }

    #[test]
    fn calibration_suspends_the_fault_disconnect() {
        let mut engine = engine();
        engine.ctx.command.power_on = false;
        script_measurement(&mut engine, 50_000, 0);
        for _ in 0..150 {
            engine.tick();
        }
        assert!(engine.monitor.code().sink_while_off());
        assert_eq!(engine.frontend.hal().range, Range::Disconnected);

        // The procedure must be able to sink current with the code still
        // latched.
        engine.frontend.cal.active = true;
        engine.ctx.command.dac_override = 5000;
        engine.ctx.command.power_on = true;
        engine.tick();
        engine.tick();
        assert_eq!(engine.frontend.hal().range, Range::Low);
        assert!(engine.ctx.command.power_on);
        assert_eq!(engine.frontend.hal().last_dac(), Some(5000));
    }

    #[test]
    fn calibration_active_bypasses_mode_actuation() {
        let mut engine = engine();
        engine.frontend.cal.active = true;
        engine.ctx.command.dac_override = 1234;
        engine.ctx.command.mode = Mode::Cv;
        engine.ctx.command.current = MicroAmps(3_000_000);
        engine.tick();
        assert_eq!(engine.frontend.hal().last_dac(), Some(1234));
        // The analog board still tracks the logical mode for the procedure.
        assert_eq!(engine.frontend.hal().analog_mode, Some(AnalogMode::ConstantVoltage));
    }

    #[test]
    fn command_clamp_limits_current_to_the_active_range() {
        let mut engine = engine();
        engine.ctx.command.current = MicroAmps(9_000_000); // above the 3 A low-range cap
        engine.ctx.command.power_on = true;
        engine.tick();
        assert_eq!(engine.ctx.command.current, engine.ctx.settings.max_current_low);
    }

    #[test]
    fn timer_rule_switches_mode_on_the_fifty_first_tick() {
        let mut engine = engine();
        engine
            .events
            .add_rule(EventRule {
                source: EventSource::TimerZero(0),
                action: EventAction::SetLoadMode(Mode::Cv),
            })
            .unwrap();
        engine.events.timers.arm_ms(0, 50).unwrap();

        for tick in 1..=50 {
            engine.tick();
            assert_eq!(engine.ctx.command.mode, Mode::Cc, "tick {tick}");
        }
        engine.tick();
        assert_eq!(engine.ctx.command.mode, Mode::Cv);
    }

    #[test]
    fn waveform_drives_the_current_target() {
        let mut engine = engine();
        engine.waveform.form = Form::Square;
        engine.waveform.set_amplitude(200_000);
        engine.waveform.set_offset(500_000);
        engine.waveform.set_period_ms(2);
        engine.waveform.switch_on(&mut engine.ctx.ownership).unwrap();
        engine.ctx.command.power_on = true;
        script_measurement(&mut engine, 500_000, 5_000_000);

        engine.tick();
        let low = engine.ctx.command.current.0;
        engine.tick();
        let high = engine.ctx.command.current.0;
        assert_eq!(low, 300_000);
        assert_eq!(high, 700_000);
    }

    #[test]
    fn trigger_out_follows_event_actions() {
        let mut engine = engine();
        engine
            .events
            .add_rule(EventRule {
                source: EventSource::TriggerRise,
                action: EventAction::TriggerHigh,
            })
            .unwrap();
        engine.tick();
        assert!(!engine.frontend.hal().trigger_out);
        engine.frontend.hal_mut().trigger_in = true;
        engine.tick();
        assert!(engine.frontend.hal().trigger_out);
    }
}
