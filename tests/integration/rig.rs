//! Host test rig: the full control stack wired together the way the
//! firmware main loop wires it, with the encoder driven by synthetic
//! quadrature edges instead of ISRs.
//!
//! The encoder and magnet atomics are process-wide, so every test takes
//! the rig lock for its whole body.

use std::sync::{Mutex, MutexGuard};

use coalloader::config::LoaderConfig;
use coalloader::display::ErrorDisplay;
use coalloader::encoder;
use coalloader::fsm::context::LoaderContext;
use coalloader::fsm::{states, Fsm, StateId};
use coalloader::inputs::InputSnapshot;
use coalloader::power::PowerSequencer;
use coalloader::safety::{self, MovementWatchdog};
use coalloader::time::MonotonicClock;

static RIG_LOCK: Mutex<()> = Mutex::new(());

pub fn lock_rig() -> MutexGuard<'static, ()> {
    RIG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Gray phases in positive order, as `(a, b)` levels.
const PHASES: [(bool, bool); 4] = [
    (false, false),
    (false, true),
    (true, true),
    (true, false),
];

pub struct Rig {
    pub config: LoaderConfig,
    pub display: ErrorDisplay,
    pub watchdog: MovementWatchdog,
    pub power: PowerSequencer,
    pub ctx: LoaderContext,
    pub fsm: Fsm,
    /// Raw inputs the next tick will observe (already "debounced").
    pub inputs: InputSnapshot,
    /// Encoder phase tracked by the synthetic crank.
    phase: usize,
}

impl Rig {
    pub fn new() -> Self {
        // Seeds the decoder from the host gpio shims (both high) and
        // zeroes the position.
        encoder::init();
        let _ = encoder::take_double_steps();

        let config = LoaderConfig::default();
        let clock = MonotonicClock::new();
        let mut ctx = LoaderContext::new(config.clone());
        let mut fsm = Fsm::new(states::build_state_table(), StateId::Init);
        fsm.start(&mut ctx);

        let mut rig = Self {
            display: ErrorDisplay::new(clock.now_ms()),
            watchdog: MovementWatchdog::new(&config),
            power: PowerSequencer::new(&config),
            ctx,
            fsm,
            inputs: InputSnapshot::default(),
            config,
            // Host gpio_read returns high on both channels: state 0b11.
            phase: 2,
        };
        rig.apply();
        rig
    }

    /// Turn the encoder by `counts` (positive = lowering), pushing the
    /// same edge calls the GPIO ISRs would.
    pub fn crank(&mut self, counts: i32) {
        let dir: i8 = if counts >= 0 { 1 } else { -1 };
        for _ in 0..counts.unsigned_abs() {
            let (old_a, _) = PHASES[self.phase];
            self.phase = (self.phase as i8 + dir).rem_euclid(4) as usize;
            let (new_a, new_b) = PHASES[self.phase];
            if new_a != old_a {
                encoder::channel_a_edge(new_a, new_b);
            } else {
                encoder::channel_b_edge(new_a, new_b);
            }
        }
    }

    /// One safety tick plus one FSM tick, exactly as the main loop runs
    /// them.
    pub fn tick(&mut self) {
        safety::service_tick(&mut self.watchdog, &mut self.power, &mut self.display);

        self.ctx.inputs = self.inputs;
        self.ctx.position = encoder::position();
        self.ctx.faulted = self.watchdog.is_faulted();

        self.fsm.tick(&mut self.ctx);
        self.apply();
    }

    /// Run `n` ticks, cranking `counts_per_tick` before each.
    pub fn run(&mut self, n: usize, counts_per_tick: i32) {
        for _ in 0..n {
            self.crank(counts_per_tick);
            self.tick();
        }
    }

    /// Ticks needed to cover `ms` of state dwell.
    pub fn ticks_for_ms(&self, ms: u64) -> usize {
        (ms / self.ctx.tick_period_ms + 1) as usize
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    fn apply(&mut self) {
        if self.ctx.commands.clear_faults {
            self.watchdog.clear_faults();
            self.display.clear_all();
        }
        if self.ctx.commands.zero_encoder {
            encoder::zero();
        }

        self.power.set_speed(self.ctx.commands.speed);
        self.power
            .set_motor(self.ctx.commands.movement, &mut self.watchdog, &mut self.display);
        self.power.set_magnet(self.ctx.commands.magnet_on);

        if let Some(code) = self.ctx.commands.flag_error {
            self.display.flag(code);
        }
        self.ctx.commands.clear_one_shots();
    }
}
