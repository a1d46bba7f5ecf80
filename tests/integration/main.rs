//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the wired-together
//! control stack — state machine, power sequencer, watchdog, display,
//! and the real encoder atomics.  All tests run on the host (x86_64)
//! with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod load_cycle_tests;
mod rig;
mod stall_tests;
