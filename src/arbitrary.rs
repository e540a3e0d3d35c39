//! Arbitrary sequence player: piecewise playback of a user-authored point
//! list, single-shot or looped.
//!
//! The list stays sorted by time and never becomes empty; the editor API
//! enforces both. Playback treats the list as periodic with period
//! `sequence_length`, so sampling wraps at both ends.

use heapless::Vec;

use crate::{
    context::{LoadCommand, Ownership, ParamRef, Producer},
    error::ConfigError,
    scaling::map_range,
};

pub const MAX_POINTS: usize = 20;

/// How the span after a point is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hold {
    /// Zero-order hold: replicate the point's value until the next point.
    #[default]
    Zoh,
    /// First-order hold: interpolate linearly toward the next point.
    Foh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqPoint {
    /// Milliseconds relative to the start of the sequence.
    pub time: i32,
    pub value: i32,
    pub hold: Hold,
}

impl SeqPoint {
    pub const fn zero() -> Self {
        Self {
            time: 0,
            value: 0,
            hold: Hold::Zoh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    SingleShot,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeqState {
    #[default]
    Disabled,
    /// Enabled, waiting for conduction to start.
    Armed,
    Running,
}

#[derive(Debug, Clone)]
pub struct ArbitrarySequence {
    points: Vec<SeqPoint, MAX_POINTS>,
    /// Loop period in ms.
    sequence_length: i32,
    pub mode: PlayMode,
    state: SeqState,
    target: ParamRef,
    /// Playback position within the current period, ms.
    cursor: i32,
}

impl Default for ArbitrarySequence {
    fn default() -> Self {
        let mut points = Vec::new();
        let _ = points.push(SeqPoint::zero());
        Self {
            points,
            sequence_length: 1000,
            mode: PlayMode::SingleShot,
            state: SeqState::Disabled,
            target: ParamRef::Current,
            cursor: 0,
        }
    }
}

impl ArbitrarySequence {
    pub fn state(&self) -> SeqState {
        self.state
    }

    pub fn target(&self) -> ParamRef {
        self.target
    }

    pub fn points(&self) -> &[SeqPoint] {
        &self.points
    }

    pub fn sequence_length(&self) -> i32 {
        self.sequence_length
    }

    pub fn cursor(&self) -> i32 {
        self.cursor
    }

    /// Enable playback: claims the target parameter and waits for power-on.
    pub fn arm(&mut self, ownership: &mut Ownership) -> Result<(), ConfigError> {
        ownership.claim(self.target, Producer::Arbitrary)?;
        self.cursor = 0;
        self.state = SeqState::Armed;
        Ok(())
    }

    pub fn disable(&mut self, ownership: &mut Ownership) {
        ownership.release(self.target, Producer::Arbitrary);
        self.state = SeqState::Disabled;
        self.cursor = 0;
    }

    pub fn set_target(
        &mut self,
        target: ParamRef,
        ownership: &mut Ownership,
    ) -> Result<(), ConfigError> {
        if self.state != SeqState::Disabled && target != self.target {
            ownership.claim(target, Producer::Arbitrary)?;
            ownership.release(self.target, Producer::Arbitrary);
        }
        self.target = target;
        Ok(())
    }

    /// One tick of playback. Armed sequences start when conduction starts;
    /// a single-shot wrap re-arms and forces conduction off.
    pub fn tick(&mut self, command: &mut LoadCommand) {
        match self.state {
            SeqState::Disabled => {}
            SeqState::Armed => {
                if command.power_on {
                    self.cursor = 0;
                    self.state = SeqState::Running;
                    command.set_param(self.target, self.value_at(0));
                }
            }
            SeqState::Running => {
                self.cursor += 1;
                if self.cursor >= self.sequence_length {
                    self.cursor = 0;
                    if self.mode == PlayMode::SingleShot {
                        self.state = SeqState::Armed;
                        command.power_on = false;
                        return;
                    }
                }
                command.set_param(self.target, self.value_at(self.cursor));
            }
        }
    }

    /// Sample the sequence at time `t`, treating it as periodic.
    ///
    /// Between two points the *earlier* point's hold type decides: ZOH
    /// replicates its value, FOH interpolates toward the next. Before the
    /// first point the last point (shifted one period earlier) is the
    /// predecessor; past the last point the first (shifted later) is the
    /// successor.
    pub fn value_at(&self, t: i32) -> i32 {
        let n = self.points.len();
        let len = self.sequence_length;
        let next_idx = self.points.iter().position(|p| p.time > t).unwrap_or(n);

        let (prev, next) = if next_idx == 0 {
            let last = self.points[n - 1];
            (
                SeqPoint {
                    time: last.time - len,
                    ..last
                },
                self.points[0],
            )
        } else if next_idx == n {
            let first = self.points[0];
            (
                self.points[n - 1],
                SeqPoint {
                    time: first.time + len,
                    ..first
                },
            )
        } else {
            (self.points[next_idx - 1], self.points[next_idx])
        };

        match prev.hold {
            Hold::Zoh => prev.value,
            Hold::Foh => map_range(t, prev.time, next.time, prev.value, next.value),
        }
    }

    /// Insert a point, keeping time order. A point at an already-used time
    /// replaces the existing one.
    pub fn insert_point(&mut self, point: SeqPoint) -> Result<(), ConfigError> {
        let point = SeqPoint {
            time: point.time.clamp(0, self.sequence_length),
            ..point
        };
        if let Some(existing) = self.points.iter_mut().find(|p| p.time == point.time) {
            *existing = point;
            return Ok(());
        }
        if self.points.is_full() {
            return Err(ConfigError::TableFull);
        }
        let at = self
            .points
            .iter()
            .position(|p| p.time > point.time)
            .unwrap_or(self.points.len());
        self.points
            .insert(at, point)
            .map_err(|_| ConfigError::TableFull)
    }

    /// Delete a point. The list never empties: removing the final point
    /// synthesizes a zero-time/zero-value one.
    pub fn delete_point(&mut self, index: usize) -> Result<(), ConfigError> {
        if index >= self.points.len() {
            return Err(ConfigError::IndexOutOfRange);
        }
        self.points.remove(index);
        if self.points.is_empty() {
            let _ = self.points.push(SeqPoint::zero());
        }
        Ok(())
    }

    /// Move a point to a new time, re-sorting the list.
    pub fn retime_point(&mut self, index: usize, time: i32) -> Result<(), ConfigError> {
        if index >= self.points.len() {
            return Err(ConfigError::IndexOutOfRange);
        }
        let mut point = self.points[index];
        point.time = time;
        self.points.remove(index);
        let result = self.insert_point(point);
        if self.points.is_empty() {
            let _ = self.points.push(SeqPoint::zero());
        }
        result
    }

    /// Change the loop period. Shrinking deletes every point beyond the new
    /// length; the list is refilled with a zero point if nothing survives.
    pub fn set_sequence_length(&mut self, length: i32) {
        self.sequence_length = length.max(1);
        self.adjust_points_to_length();
    }

    fn adjust_points_to_length(&mut self) {
        let len = self.sequence_length;
        self.points.retain(|p| p.time <= len);
        if self.points.is_empty() {
            let _ = self.points.push(SeqPoint::zero());
        }
        if self.cursor >= len {
            self.cursor = 0;
        }
    }
}
