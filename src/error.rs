//! Unified error types for the coal-loader firmware.
//!
//! Two distinct categories live here.  `Error` covers fallible operations
//! (really only peripheral bring-up — everything after init is total).
//! `ErrorCode` is the operator-facing taxonomy shown on the status LED as
//! blink codes; codes are *state*, latched and displayed until cleared, not
//! values that propagate through `Result`.  All variants are `Copy` so they
//! pass through the safety path without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Operator-facing blink codes
// ---------------------------------------------------------------------------

/// Blink-coded errors shown on the status LED.  The discriminant is the
/// number of blinks (1-indexed, displayed in ascending order when several
/// are active).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Position escaped the allowed travel envelope.
    TravelOvershoot = 1,
    /// Endstop engaged at a position where it cannot physically be.
    EndstopContradiction = 2,
    /// Watchdog saw insufficient encoder travel with the motor driven.
    MotorStall = 3,
    /// Homing never found the endstop within the travel limit.
    HomingFailed = 4,
}

impl ErrorCode {
    /// Total number of defined codes — sizes the display status array.
    pub const COUNT: usize = 4;

    /// Number of blinks used to display this code.
    pub const fn blinks(self) -> u8 {
        self as u8
    }

    /// Bitmask for accumulating codes in a fault bitfield.
    pub const fn mask(self) -> u8 {
        1 << (self as u8 - 1)
    }

    /// Convert a 1-indexed blink count back to a code.
    pub fn from_blinks(blinks: u8) -> Option<Self> {
        match blinks {
            1 => Some(Self::TravelOvershoot),
            2 => Some(Self::EndstopContradiction),
            3 => Some(Self::MotorStall),
            4 => Some(Self::HomingFailed),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TravelOvershoot => write!(f, "travel overshoot"),
            Self::EndstopContradiction => write!(f, "endstop contradiction"),
            Self::MotorStall => write!(f, "motor stall"),
            Self::HomingFailed => write!(f, "homing failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<crate::drivers::hw_init::HwInitError> for Error {
    fn from(err: crate::drivers::hw_init::HwInitError) -> Self {
        use crate::drivers::hw_init::HwInitError;
        Self::Init(match err {
            HwInitError::GpioConfigFailed(_) => "GPIO config failed",
            HwInitError::LedcInitFailed(_) => "LEDC timer/channel config failed",
            HwInitError::IsrInstallFailed(_) => "GPIO ISR service install failed",
        })
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
