//! Movement watchdog — stall detection over a ring of position snapshots.
//!
//! Every safety tick (~61 Hz) the watchdog records the encoder position
//! into a ring of `WATCHDOG_LOOKBACK + 1` slots and compares the fresh
//! sample against the one recorded `WATCHDOG_LOOKBACK` ticks earlier.  If
//! the motor is being driven but the encoder moved no more than the stall
//! threshold over that window, the drive is cut immediately and a fault is
//! latched.
//!
//! Arming seeds every ring slot with the current position offset by
//! `i32::MIN` (wrapping).  The biased seeds are astronomically far from
//! any reachable position, so the first `WATCHDOG_LOOKBACK` comparisons
//! after arming can never trip — that is the ramp-up grace that lets the
//! motor spin up from standstill without a false stall.

use log::{info, warn};

use crate::config::LoaderConfig;
use crate::display::ErrorDisplay;
use crate::encoder;
use crate::error::ErrorCode;
use crate::power::{Motion, PowerSequencer};
use crate::time::MonotonicClock;

/// How many ticks back the stall comparison reaches.
pub const WATCHDOG_LOOKBACK: usize = 3;

/// Evidence captured when a stall trips, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallEvidence {
    /// Position at the tick that tripped.
    pub current: i32,
    /// Position `WATCHDOG_LOOKBACK` ticks earlier.
    pub previous: i32,
}

/// Stall-detecting movement watchdog.
pub struct MovementWatchdog {
    armed: bool,
    faulted: bool,
    ring: [i32; WATCHDOG_LOOKBACK + 1],
    /// Next slot to overwrite; the slot after it (oldest) is the
    /// comparison sample.
    idx: usize,
    threshold: u32,
}

impl MovementWatchdog {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            armed: false,
            faulted: false,
            ring: [0; WATCHDOG_LOOKBACK + 1],
            idx: 0,
            threshold: config.stall_threshold,
        }
    }

    /// Arm the watchdog at the given position.  The power sequencer calls
    /// this immediately before enabling motor drive.
    pub fn arm(&mut self, position: i32) {
        let seed = position.wrapping_add(i32::MIN);
        self.ring = [seed; WATCHDOG_LOOKBACK + 1];
        self.armed = true;
    }

    /// Disarm without touching the fault latch.  The power sequencer calls
    /// this immediately before cutting motor drive.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// True while a stall fault is latched.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Drop the fault latch.  The caller clears the error display alongside.
    pub fn clear_faults(&mut self) {
        if self.faulted {
            info!("watchdog: fault cleared");
        }
        self.faulted = false;
    }

    /// Latch a stall fault.
    pub fn latch_fault(&mut self) {
        self.faulted = true;
    }

    /// Record one tick's position sample and check for a stall.
    ///
    /// Returns `Some` when the sample moved no more than the threshold
    /// relative to the sample `WATCHDOG_LOOKBACK` ticks ago.  Pure ring
    /// arithmetic — the caller decides what a stall means.
    pub fn observe(&mut self, position: i32) -> Option<StallEvidence> {
        if !self.armed {
            return None;
        }
        self.ring[self.idx] = position;
        self.idx = (self.idx + 1) % self.ring.len();
        let previous = self.ring[self.idx];
        let travel = position.wrapping_sub(previous).unsigned_abs();
        if travel <= self.threshold {
            Some(StallEvidence { current: position, previous })
        } else {
            None
        }
    }
}

/// Run one safety tick: refresh the error display, surface missed encoder
/// edges, and stall-check the motor.
///
/// On a stall the motor is forced to Halt through the sequencer (which
/// disarms the watchdog as a side effect), the fault latches, and error
/// code 3 starts blinking.
pub fn service_tick(
    watchdog: &mut MovementWatchdog,
    power: &mut PowerSequencer,
    display: &mut ErrorDisplay,
) {
    let clock = MonotonicClock::new();
    display.refresh(clock.now_ms());

    let missed = encoder::take_double_steps();
    if missed > 0 {
        warn!("encoder: {missed} double-step transition(s) — edges were missed");
    }

    let position = encoder::position();
    if let Some(evidence) = watchdog.observe(position) {
        warn!(
            "watchdog: stall at {} (was {} {WATCHDOG_LOOKBACK} ticks ago)",
            evidence.current, evidence.previous
        );
        power.set_motor(Motion::Halt, watchdog, display);
        watchdog.latch_fault();
        display.flag(ErrorCode::MotorStall);
    }
}
