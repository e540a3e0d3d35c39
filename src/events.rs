//! Rule-based event engine: condition → action pairs evaluated once per tick.
//!
//! Rules are stateless between evaluations except through the shared timer
//! bank. An action that mutates a source's underlying parameter takes effect
//! on the next tick's evaluation; actions are never re-evaluated within the
//! same tick.

use fugit::MillisDurationU32;
use heapless::Vec;

use crate::{
    context::{ControlContext, Mode, ParamRef},
    error::ConfigError,
};

pub const MAX_RULES: usize = 10;
pub const MAX_TIMERS: usize = 5;

/// A stopped timer parks at this sentinel and never triggers.
pub const TIMER_STOPPED: i32 = -1;

/// Bank of millisecond down-counters shared by the rules.
///
/// A timer that has counted down to zero reports expiry on the *following*
/// tick's decrement pass, then stops. One rule may re-arm a timer from any
/// state, including stopped.
#[derive(Debug, Clone, Copy)]
pub struct TimerBank {
    values: [i32; MAX_TIMERS],
    expired: [bool; MAX_TIMERS],
}

impl Default for TimerBank {
    fn default() -> Self {
        Self {
            values: [TIMER_STOPPED; MAX_TIMERS],
            expired: [false; MAX_TIMERS],
        }
    }
}

impl TimerBank {
    pub fn arm(&mut self, index: usize, duration: MillisDurationU32) -> Result<(), ConfigError> {
        self.arm_ms(index, duration.ticks() as i32)
    }

    pub fn arm_ms(&mut self, index: usize, ms: i32) -> Result<(), ConfigError> {
        if index >= MAX_TIMERS {
            return Err(ConfigError::IndexOutOfRange);
        }
        self.values[index] = ms.max(0);
        self.expired[index] = false;
        Ok(())
    }

    pub fn stop(&mut self, index: usize) {
        if index < MAX_TIMERS {
            self.values[index] = TIMER_STOPPED;
            self.expired[index] = false;
        }
    }

    /// Current count, or the stopped sentinel for an out-of-range index.
    pub fn value(&self, index: usize) -> i32 {
        self.values.get(index).copied().unwrap_or(TIMER_STOPPED)
    }

    /// True for exactly one tick once the timer has sat through a full tick
    /// at zero. Out-of-range indices never expire.
    pub fn expired(&self, index: usize) -> bool {
        self.expired.get(index).copied().unwrap_or(false)
    }

    /// Once-per-tick decrement pass.
    pub fn tick(&mut self) {
        for i in 0..MAX_TIMERS {
            self.expired[i] = false;
            if self.values[i] == 0 {
                self.expired[i] = true;
                self.values[i] = TIMER_STOPPED;
            } else if self.values[i] > 0 {
                self.values[i] -= 1;
            }
        }
    }
}

/// What a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSource {
    /// Slot exists in the table but never fires.
    #[default]
    Disabled,
    TriggerRise,
    TriggerFall,
    /// Fires while the selected target parameter exceeds the limit.
    ParamAbove(ParamRef, i32),
    /// Fires while the selected target parameter is below the limit.
    ParamBelow(ParamRef, i32),
    /// Fires on the expiry tick of the given timer.
    TimerZero(usize),
}

/// What a firing rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    SetParam(ParamRef, i32),
    /// Re-arm a timer, in ms.
    SetTimer(usize, i32),
    TriggerHigh,
    TriggerLow,
    SetLoadMode(Mode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRule {
    pub source: EventSource,
    pub action: EventAction,
}

#[derive(Debug, Clone, Default)]
pub struct EventEngine {
    rules: Vec<EventRule, MAX_RULES>,
    pub timers: TimerBank,
    prev_trigger: bool,
    /// −1 / 0 / +1: sign of this tick's trigger-input change.
    edge: i8,
}

impl EventEngine {
    pub fn rules(&self) -> &[EventRule] {
        &self.rules
    }

    pub fn add_rule(&mut self, rule: EventRule) -> Result<(), ConfigError> {
        self.rules.push(rule).map_err(|_| ConfigError::TableFull)
    }

    pub fn set_rule(&mut self, index: usize, rule: EventRule) -> Result<(), ConfigError> {
        match self.rules.get_mut(index) {
            Some(slot) => {
                *slot = rule;
                Ok(())
            }
            None => Err(ConfigError::IndexOutOfRange),
        }
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<(), ConfigError> {
        if index >= self.rules.len() {
            return Err(ConfigError::IndexOutOfRange);
        }
        self.rules.remove(index);
        Ok(())
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    /// Decrement the timer bank. First of the engine's three per-tick steps.
    pub fn tick_timers(&mut self) {
        self.timers.tick();
    }

    /// Latch this tick's trigger-input edge, computed once per tick.
    pub fn update_trigger(&mut self, level: bool) {
        self.edge = level as i8 - self.prev_trigger as i8;
        self.prev_trigger = level;
    }

    /// Evaluate every rule's source against pre-action state, then apply the
    /// firing actions in table order. The two passes keep an action that
    /// mutates another rule's source parameter from being seen until the
    /// next tick.
    pub fn evaluate(&mut self, ctx: &mut ControlContext) {
        let mut pending: Vec<EventAction, MAX_RULES> = Vec::new();
        for rule in &self.rules {
            if self.source_holds(rule.source, ctx) {
                // Cannot overflow: at most one action per rule slot.
                let _ = pending.push(rule.action);
            }
        }
        for action in pending {
            self.apply(action, ctx);
        }
    }

    fn source_holds(&self, source: EventSource, ctx: &ControlContext) -> bool {
        match source {
            EventSource::Disabled => false,
            EventSource::TriggerRise => self.edge > 0,
            EventSource::TriggerFall => self.edge < 0,
            EventSource::ParamAbove(param, limit) => ctx.command.param(param) > limit,
            EventSource::ParamBelow(param, limit) => ctx.command.param(param) < limit,
            EventSource::TimerZero(index) => self.timers.expired(index),
        }
    }

    fn apply(&mut self, action: EventAction, ctx: &mut ControlContext) {
        match action {
            EventAction::SetParam(param, value) => ctx.command.set_param(param, value),
            EventAction::SetTimer(index, ms) => {
                let _ = self.timers.arm_ms(index, ms);
            }
            EventAction::TriggerHigh => ctx.trigger_out = true,
            EventAction::TriggerLow => ctx.trigger_out = false,
            EventAction::SetLoadMode(mode) => ctx.command.mode = mode,
        }
    }
}
