//! Coal loader firmware — main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  ISRs / timer task                                             │
//! │    encoder edge ISRs ──► position atomics                      │
//! │    magnet timer (~122 Hz) ──► pulse countdown atomics          │
//! │    safety timer (~61 Hz) ──► pending-tick atomic               │
//! │                                                                │
//! │  Main loop (one pass per safety tick)                          │
//! │    drain safety ticks ──► watchdog + error display             │
//! │    sample + debounce inputs                                    │
//! │    FSM tick (pure logic on the context blackboard)             │
//! │    apply actuator commands through the power sequencer         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use coalloader::config::LoaderConfig;
use coalloader::display::ErrorDisplay;
use coalloader::drivers::{hw_init, hw_timer};
use coalloader::encoder;
use coalloader::fsm::context::LoaderContext;
use coalloader::fsm::{states, Fsm, StateId};
use coalloader::inputs::{DebouncedInputs, RawSample};
use coalloader::pins;
use coalloader::power::PowerSequencer;
use coalloader::safety::{self, MovementWatchdog};
use coalloader::time::MonotonicClock;

/// Apply one tick's actuator commands in dependency order: fault state
/// first (recovery re-homes), then the position reference, then the
/// drives.  One-shots are consumed here and cleared for the next tick.
fn apply_commands(
    ctx: &mut LoaderContext,
    power: &mut PowerSequencer,
    watchdog: &mut MovementWatchdog,
    display: &mut ErrorDisplay,
) {
    if ctx.commands.clear_faults {
        watchdog.clear_faults();
        display.clear_all();
    }
    if ctx.commands.zero_encoder {
        encoder::zero();
    }

    power.set_speed(ctx.commands.speed);
    power.set_motor(ctx.commands.movement, watchdog, display);
    power.set_magnet(ctx.commands.magnet_on);

    if let Some(code) = ctx.commands.flag_error {
        display.flag(code);
    }
    ctx.commands.clear_one_shots();
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CoalLoader v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Peripheral init failure is critical — log and halt.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // Seed the decoder from the live pin levels before any edge can fire.
    encoder::init();
    hw_timer::start_timers();
    if let Err(e) = hw_init::init_isr_service() {
        log::error!("ISR service init failed: {} — continuing without encoder edges", e);
    }

    // ── 3. Configuration ──────────────────────────────────────
    let config = LoaderConfig::default();
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config serialise failed: {}", e),
    }

    // ── 4. Construct the control stack ────────────────────────
    let clock = MonotonicClock::new();
    let mut display = ErrorDisplay::new(clock.now_ms());
    let mut watchdog = MovementWatchdog::new(&config);
    let mut power = PowerSequencer::new(&config);
    let mut inputs = DebouncedInputs::new(&config);

    let mut ctx = LoaderContext::new(config.clone());
    let mut fsm = Fsm::new(states::build_state_table(), StateId::Init);
    fsm.start(&mut ctx);
    apply_commands(&mut ctx, &mut power, &mut watchdog, &mut display);

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        // Simulate the safety timer via sleep on non-espidf targets.
        // On real hardware the loop blocks briefly and the esp_timer
        // callbacks mark ticks as they elapse.
        #[cfg(not(target_os = "espidf"))]
        {
            std::thread::sleep(std::time::Duration::from_millis(
                config.safety_tick_period_ms(),
            ));
            hw_timer::push_safety_tick();
        }
        #[cfg(target_os = "espidf")]
        std::thread::sleep(std::time::Duration::from_millis(1));

        // Watchdog and display run once per elapsed safety tick even if
        // the loop fell behind.
        for _ in 0..hw_timer::take_pending_safety_ticks() {
            safety::service_tick(&mut watchdog, &mut power, &mut display);

            // Observations for this tick.
            let snapshot = inputs.sample(RawSample::from_hardware());
            ctx.inputs = snapshot;
            ctx.position = encoder::position();
            ctx.faulted = watchdog.is_faulted();

            fsm.tick(&mut ctx);
            apply_commands(&mut ctx, &mut power, &mut watchdog, &mut display);

            // Panel lamp mirrors the debounced endstop.
            hw_init::gpio_write(pins::ENDSTOP_LED_GPIO, snapshot.endstop);
        }
    }
}
