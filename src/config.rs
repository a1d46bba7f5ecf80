//! System configuration parameters
//!
//! All tunable parameters for the coal-loader mechanism.  The defaults are
//! the values the mechanism was commissioned with; several of them are part
//! of the power-stage timing contract (flyback and relay-settle delays,
//! magnet pulse length) and should not be changed casually.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    // --- Motor PWM presets (raw 8-bit duty) ---
    /// Duty for slow movement (homing, manual override).
    pub slow_duty: u8,
    /// Duty for fast movement (normal load cycle).
    pub fast_duty: u8,

    // --- Electromagnet ---
    /// Duty during the initial grab pulse.
    pub magnet_pulse_duty: u8,
    /// Duty after the pulse completes (holding the load).
    pub magnet_hold_duty: u8,
    /// Pulse length in PWM periods (~122 Hz).
    pub magnet_pulse_cycles: u32,

    // --- Direction-change interlocks ---
    /// Time for motor flyback to discharge after the drive is cut (ms).
    pub flyback_delay_ms: u64,
    /// Time for the reversal relay contacts to settle after switching (ms).
    pub relay_settle_ms: u64,

    // --- Movement watchdog ---
    /// Minimum encoder travel (counts) between compared watchdog samples.
    /// At or below this the motor is considered stalled.
    pub stall_threshold: u32,

    // --- Input debouncing ---
    /// Consecutive agreeing samples before a button/endstop registers.
    pub debounce_count: u8,

    // --- Travel envelope (encoder counts, home = 0, lowering = positive) ---
    /// Position at which the load cycle stops to grab coal.
    pub travel_target: i32,
    /// Absolute travel beyond which something is mechanically wrong.
    pub max_travel: i32,
    /// Tolerated overrun past the travel target.
    pub overshoot_buffer: i32,
    /// Tolerated travel past home while raising.
    pub undershoot_buffer: i32,

    // --- Cycle delays ---
    /// Dwell after energising the magnet before lifting (ms).
    pub magnet_grab_delay_ms: u64,
    /// Additional dwell with the motor halted before lifting (ms).
    pub motor_grab_delay_ms: u64,
    /// Minimum time in Idle before the go button is honoured (ms).
    pub idle_delay_ms: u64,

    // --- Timing ---
    /// Safety tick period (µs). ~61 Hz drives the watchdog and error display.
    pub safety_tick_period_us: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            // Motor
            slow_duty: 75,
            fast_duty: 255,

            // Magnet
            magnet_pulse_duty: 255,
            magnet_hold_duty: 100,
            magnet_pulse_cycles: 15,

            // Interlocks
            flyback_delay_ms: 100,
            relay_settle_ms: 250,

            // Watchdog
            stall_threshold: 100,

            // Debounce
            debounce_count: 5,

            // Travel envelope
            travel_target: 60_000,
            max_travel: 75_000,
            overshoot_buffer: 500,
            undershoot_buffer: 500,

            // Cycle delays
            magnet_grab_delay_ms: 250,
            motor_grab_delay_ms: 500,
            idle_delay_ms: 2000,

            // Timing
            safety_tick_period_us: 16_393, // ~61 Hz
        }
    }
}

impl LoaderConfig {
    /// Safety tick period rounded to whole milliseconds, for tick-counted
    /// state delays.
    pub fn safety_tick_period_ms(&self) -> u64 {
        self.safety_tick_period_us / 1000
    }
}
