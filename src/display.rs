//! Blink-coded error display on the status LED.
//!
//! Each active error code is shown as a burst of blinks: code *k* blinks
//! *k* times.  Time is divided into ticks of [`TICK_MS`]; a cycle is
//! [`ErrorCode::COUNT`] ticks.  At the start of each cycle the display
//! picks the next active code (ascending, wrapping) and blinks during the
//! first *k* ticks of the cycle, where a blink is the LED lit for the
//! first [`BLINK_MS`] of a tick.  With codes 2 and 3 active the LED shows
//! blink-blink, pause, blink-blink-blink, pause, repeating.
//!
//! `refresh()` is phase-based and total: it only compares timestamps and
//! writes the LED, so it is safe to call far more often than the tick
//! rate.  The power sequencer relies on that — its blocking interlock
//! waits keep calling `refresh()` so blink codes never freeze mid-wait.

use heapless::Vec;
use log::info;

use crate::drivers::hw_init;
use crate::error::ErrorCode;
use crate::pins;

/// Display tick length (ms).
pub const TICK_MS: u64 = 250;
/// LED-on portion at the start of a blinking tick (ms).
pub const BLINK_MS: u64 = 100;

/// Multiplexes up to [`ErrorCode::COUNT`] blink codes onto one LED.
pub struct ErrorDisplay {
    /// Latched state per code, indexed by `blinks - 1`.
    status: [bool; ErrorCode::COUNT],
    /// Start of the current tick (monotonic ms).
    tick_start_ms: u64,
    /// Tick index within the current cycle (0-based).
    tick_index: u8,
    /// Blink count being displayed this cycle; 0 = dark cycle.
    cycle_blinks: u8,
    /// Shadow of the LED pin, so tests can observe it.
    led_lit: bool,
}

impl ErrorDisplay {
    pub fn new(now_ms: u64) -> Self {
        Self {
            status: [false; ErrorCode::COUNT],
            tick_start_ms: now_ms,
            tick_index: 0,
            cycle_blinks: 0,
            led_lit: false,
        }
    }

    /// Latch an error code for display.  Idempotent.
    pub fn flag(&mut self, code: ErrorCode) {
        let slot = usize::from(code.blinks() - 1);
        if !self.status[slot] {
            info!("display: flagging error {} ({})", code.blinks(), code);
        }
        self.status[slot] = true;
    }

    /// Clear every latched code.  The LED goes dark at the next refresh.
    pub fn clear_all(&mut self) {
        self.status = [false; ErrorCode::COUNT];
    }

    /// Codes currently latched, ascending.
    pub fn active_codes(&self) -> Vec<ErrorCode, { ErrorCode::COUNT }> {
        let mut codes = Vec::new();
        for (slot, &set) in self.status.iter().enumerate() {
            if set {
                // Slots map 1:1 onto defined codes.
                if let Some(code) = ErrorCode::from_blinks(slot as u8 + 1) {
                    let _ = codes.push(code);
                }
            }
        }
        codes
    }

    /// True if any code is latched.
    pub fn any_active(&self) -> bool {
        self.status.iter().any(|&set| set)
    }

    /// Advance the display to `now_ms` and drive the LED.
    ///
    /// Non-blocking; call at least once per display tick (the safety tick
    /// at ~61 Hz more than covers it) and from inside any blocking wait.
    pub fn refresh(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.tick_start_ms) >= TICK_MS {
            self.tick_start_ms = now_ms;
            self.tick_index += 1;
            if usize::from(self.tick_index) >= ErrorCode::COUNT {
                self.tick_index = 0;
                self.cycle_blinks = self.next_blinks(self.cycle_blinks);
            }
        }

        let in_blink_window = now_ms.saturating_sub(self.tick_start_ms) < BLINK_MS;
        let lit = self.cycle_blinks > 0 && self.tick_index < self.cycle_blinks && in_blink_window;
        self.set_led(lit);
    }

    /// LED state as of the last refresh.
    pub fn is_lit(&self) -> bool {
        self.led_lit
    }

    /// Blink count shown during the current cycle (0 = dark).
    pub fn current_cycle_blinks(&self) -> u8 {
        self.cycle_blinks
    }

    /// Tick index within the current cycle (0-based).
    pub fn tick_in_cycle(&self) -> u8 {
        self.tick_index
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Next active code after `prev` in ascending wrapping order, as a
    /// blink count.  Returns 0 when nothing is latched.
    fn next_blinks(&self, prev: u8) -> u8 {
        for offset in 1..=ErrorCode::COUNT as u8 {
            let blinks = (prev + offset - 1) % ErrorCode::COUNT as u8 + 1;
            if self.status[usize::from(blinks - 1)] {
                return blinks;
            }
        }
        0
    }

    fn set_led(&mut self, lit: bool) {
        self.led_lit = lit;
        hw_init::gpio_write(pins::ERROR_LED_GPIO, lit);
    }
}
