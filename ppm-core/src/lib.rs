#![no_std]

// Frame timing engine for two-pulse PPM output.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library; hardware lives behind the generator traits.

pub mod control;
pub mod engine;
pub mod generator;
pub mod repl;
pub mod scheduler;
pub mod sweep;
pub mod telemetry;
pub mod timing;
