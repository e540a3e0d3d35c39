//! Real-time control engine for a programmable DC electronic load.
//!
//! The instrument sinks a regulated current, voltage, resistance or power from
//! a device under test through an analog front end (DAC set-point, ADC
//! read-back, range-switching shunts). This crate is the part that runs once
//! per millisecond: the [`engine::LoadEngine`] tick orchestrates calibration
//! mapping, the waveform and arbitrary-sequence generators, the rule-based
//! event engine and the hysteretic fault monitor, then writes the actuation
//! for the active mode (CC / CV / CR / CP) out to the hardware.
//!
//! Hardware is reached exclusively through the [`hal::LoadHal`] trait, so the
//! whole engine runs on the host for testing. It supports `no_std`
//! environments by use of the `no_std` feature flag; all arithmetic is
//! integer fixed-point (µA / µV / mΩ / µW), no FPU required.
//!
//! The serial command channel ([`command::CommandPort`]) works over any
//! interface implementing [`embedded_io::Read`] and [`embedded_io::Write`].

#![cfg_attr(feature = "no_std", no_std)]

pub mod arbitrary;
pub mod calibration;
pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod frontend;
pub mod hal;
pub mod monitor;
pub mod scaling;
mod sine_table;
pub mod stats;
pub mod units;
pub mod waveform;

#[cfg(test)]
mod mock_hal;
#[cfg(test)]
mod mock_serial;
