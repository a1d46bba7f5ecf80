//! Monotonic time source.
//!
//! All power-stage interlock timing and the error-display phase arithmetic
//! work in milliseconds from a single process-wide monotonic epoch.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **`not(target_os = "espidf")`** — uses `std::time::Instant` anchored at
//!   first use, for host-side testing and simulation.

#[cfg(not(target_os = "espidf"))]
use std::sync::OnceLock;

#[cfg(not(target_os = "espidf"))]
static EPOCH: OnceLock<std::time::Instant> = OnceLock::new();

/// Milliseconds since boot (monotonic).
#[cfg(target_os = "espidf")]
pub fn now_ms() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
}

/// Milliseconds since first call (monotonic).
#[cfg(not(target_os = "espidf"))]
pub fn now_ms() -> u64 {
    EPOCH.get_or_init(std::time::Instant::now).elapsed().as_millis() as u64
}

/// Handle for monotonic time queries.
///
/// Zero-sized — every instance reads the same process-wide clock, so
/// timestamps taken through different handles are directly comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }

    /// Milliseconds since boot (monotonic).
    pub fn now_ms(&self) -> u64 {
        now_ms()
    }
}
