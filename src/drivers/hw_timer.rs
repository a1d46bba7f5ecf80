//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Two periodic timers drive the firmware's fixed-rate work:
//!
//! - the **safety timer** (~61 Hz) marks pending ticks for the main loop,
//!   which drains them into `safety::service_tick()`;
//! - the **magnet timer** (~122 Hz, one period of the power PWM carrier)
//!   clocks `power::magnet_pulse_tick()` so the pull-in pulse is counted
//!   in PWM cycles.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely touch the atomics they update.  On simulation targets
//! the main loop pushes ticks itself between sleeps.

use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Safety tick period (µs): ~61 Hz, two PWM carrier periods.
pub const SAFETY_TICK_PERIOD_US: u64 = 16_393;
/// Magnet tick period (µs): one PWM carrier period at 122 Hz.
pub const MAGNET_TICK_PERIOD_US: u64 = 8_196;

/// Safety ticks elapsed but not yet serviced by the main loop.
static SAFETY_TICKS_PENDING: AtomicU32 = AtomicU32::new(0);

/// Drain the pending safety tick count.  If the main loop stalls the
/// ticks accumulate here rather than being lost, so the watchdog ring
/// advances once per elapsed period when the loop catches up.
pub fn take_pending_safety_ticks() -> u32 {
    SAFETY_TICKS_PENDING.swap(0, Ordering::AcqRel)
}

/// Mark one safety tick as pending.  Called by the timer on hardware and
/// by the sleep loop in simulation.
pub fn push_safety_tick() {
    SAFETY_TICKS_PENDING.fetch_add(1, Ordering::AcqRel);
}

#[cfg(target_os = "espidf")]
static mut SAFETY_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut MAGNET_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: SAFETY_TIMER is written once in `start_timers()` before any
/// timer callbacks fire.  Only called from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn safety_timer() -> esp_timer_handle_t { unsafe { SAFETY_TIMER } }

/// SAFETY: Same invariants as `safety_timer()`.
#[cfg(target_os = "espidf")]
unsafe fn magnet_timer() -> esp_timer_handle_t { unsafe { MAGNET_TIMER } }

#[cfg(target_os = "espidf")]
unsafe extern "C" fn safety_tick_cb(_arg: *mut core::ffi::c_void) {
    push_safety_tick();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn magnet_tick_cb(_arg: *mut core::ffi::c_void) {
    crate::power::magnet_pulse_tick();
}

/// Start the hardware tick timers.
///
/// - ~61 Hz safety tick (16.393 ms period)
/// - ~122 Hz magnet pulse tick (8.196 ms period)
#[cfg(target_os = "espidf")]
pub fn start_timers() {
    // SAFETY: SAFETY_TIMER and MAGNET_TIMER are written here once at boot
    // from the single main-task context before any timer callbacks fire.
    // The callbacks only touch atomics.
    unsafe {
        let safety_args = esp_timer_create_args_t {
            callback: Some(safety_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"safety\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&safety_args, &raw mut SAFETY_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: safety timer create failed (rc={}) — no watchdog ticks", ret);
            return;
        }
        let ret = esp_timer_start_periodic(SAFETY_TIMER, SAFETY_TICK_PERIOD_US);
        if ret != ESP_OK {
            log::error!("hw_timer: safety timer start failed (rc={})", ret);
            return;
        }

        let magnet_args = esp_timer_create_args_t {
            callback: Some(magnet_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"magnet\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&magnet_args, &raw mut MAGNET_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: magnet timer create failed (rc={}) — no pulse countdown", ret);
            return;
        }
        let ret = esp_timer_start_periodic(MAGNET_TIMER, MAGNET_TICK_PERIOD_US);
        if ret != ESP_OK {
            log::error!("hw_timer: magnet timer start failed (rc={})", ret);
            return;
        }

        info!("hw_timer: safety@61Hz + magnet@122Hz started");
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers() {
    log::info!("hw_timer(sim): timers not started (ticks driven by sleep loop)");
}

/// Stop all hardware tick timers.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: SAFETY_TIMER/MAGNET_TIMER are valid handles if start_timers()
    // succeeded; null-check prevents double-free.
    unsafe {
        // SAFETY: safety_timer()/magnet_timer() contract — main task only.
        let st = safety_timer();
        if !st.is_null() { esp_timer_stop(st); }
        let mt = magnet_timer();
        if !mt.is_null() { esp_timer_stop(mt); }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
