//! Board wiring and PIO generator adapters.
//!
//! Raspberry Pi Pico:
//! * `GP0` carries the PPM waveform, driven by PIO0 state machine 0 through
//!   side-set so the pin is only ever touched by the generator program;
//! * `GP25` is the on-board LED, toggled by the heartbeat task.

pub mod generator;
pub mod program;
pub mod words;

/// Heartbeat toggle interval.
pub const HEARTBEAT_PERIOD_MS: u64 = 500;
