//! Coal loader firmware library.
//!
//! Motion safety and power control for a model-railway coal loader: a
//! quadrature-decoded travel encoder, a direction-aware motor/magnet
//! power sequencer with relay interlocks, a stall-detecting movement
//! watchdog, a blink-coded error display, and the operator state
//! machine that ties them together.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod config;
pub mod display;
pub mod encoder;
pub mod error;
pub mod fsm;
pub mod inputs;
pub mod power;
pub mod safety;
pub mod time;

pub mod pins;

// ESP-IDF-only internals; host builds get no-op shims inside.
pub mod drivers;
