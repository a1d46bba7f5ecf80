//! Hardware drivers: one-shot peripheral init and the tick timers.
//!
//! Everything in here is behind `#[cfg(target_os = "espidf")]` with host
//! no-op shims, so the rest of the crate compiles and tests on the host.

pub mod hw_init;
pub mod hw_timer;
