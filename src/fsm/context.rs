//! Shared context threaded through every FSM handler.
//!
//! The context is the blackboard between the main loop and the state
//! handlers.  Each tick the loop fills in the *observations* (debounced
//! inputs, encoder position, fault latch), the handlers fill in the
//! *commands*, and the loop applies the commands to the actuators after
//! the tick returns.  Handlers never touch hardware directly, which is
//! what makes the whole state machine testable on the host.

use crate::config::LoaderConfig;
use crate::error::ErrorCode;
use crate::inputs::InputSnapshot;
use crate::power::{Motion, MotorSpeed};

/// Actuator commands produced by the state handlers each tick.
///
/// Commands are level-style, not edge-style: a handler states the output
/// it wants every tick and the main loop applies it through the power
/// sequencer, which already ignores no-op requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommands {
    /// Requested motor movement.
    pub movement: Motion,
    /// Requested motor speed preset.
    pub speed: MotorSpeed,
    /// Requested electromagnet state.
    pub magnet_on: bool,
    /// One-shot: re-home the encoder to zero this tick.
    pub zero_encoder: bool,
    /// One-shot: latch an error code on the display this tick.
    pub flag_error: Option<ErrorCode>,
    /// One-shot: clear latched faults and the display this tick.
    pub clear_faults: bool,
}

impl ActuatorCommands {
    /// Everything off, nothing pending.
    pub fn all_off() -> Self {
        Self {
            movement: Motion::Halt,
            speed: MotorSpeed::Slow,
            magnet_on: false,
            zero_encoder: false,
            flag_error: None,
            clear_faults: false,
        }
    }

    /// Reset the one-shot fields.  The main loop calls this after
    /// applying the commands, before the next tick.
    pub fn clear_one_shots(&mut self) {
        self.zero_encoder = false;
        self.flag_error = None;
        self.clear_faults = false;
    }
}

impl Default for ActuatorCommands {
    fn default() -> Self {
        Self::all_off()
    }
}

/// The FSM blackboard.
pub struct LoaderContext {
    /// Debounced operator inputs and endstop, sampled this tick.
    pub inputs: InputSnapshot,
    /// Encoder position sampled this tick (counts, positive = lowered).
    pub position: i32,
    /// True while the movement watchdog holds a latched fault.
    pub faulted: bool,
    /// Actuator commands for the main loop to apply after this tick.
    pub commands: ActuatorCommands,
    /// Loader configuration (travel envelope, delays, presets).
    pub config: LoaderConfig,
    /// Ticks spent in the current state (0 on the entry tick).
    pub ticks_in_state: u64,
    /// Ticks since the FSM started.
    pub total_ticks: u64,
    /// Tick period in ms, for converting state dwell times.
    pub tick_period_ms: u64,
}

impl LoaderContext {
    pub fn new(config: LoaderConfig) -> Self {
        let tick_period_ms = config.safety_tick_period_ms();
        Self {
            inputs: InputSnapshot::default(),
            position: 0,
            faulted: false,
            commands: ActuatorCommands::all_off(),
            config,
            ticks_in_state: 0,
            total_ticks: 0,
            tick_period_ms,
        }
    }

    /// Milliseconds spent in the current state.
    pub fn ms_in_state(&self) -> u64 {
        self.ticks_in_state * self.tick_period_ms
    }
}
