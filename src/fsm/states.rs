//! State handlers for the coal loader.
//!
//! The cycle: `Init` homes the bucket against the top endstop, `Idle`
//! rests there, `Down` lowers to the pile, `Grab` energises the magnet,
//! `Up` raises the load, and dropping it happens as `Idle` re-enters and
//! releases the magnet over the tender.  `Override` gives the operator a
//! slow manual jog, and `Faulted` is the latched safe state every other
//! state falls into when something goes wrong.
//!
//! Handlers only read observations and write commands on the context.
//! The travel-envelope checks here back up the hardware endstop: the
//! encoder is the second opinion that catches a missed or lying switch.

use log::{error, warn};

use super::context::LoaderContext;
use super::{StateDescriptor, StateId};
use crate::error::ErrorCode;
use crate::power::{Motion, MotorSpeed};

/// Build the complete state table.  Index must equal `StateId as usize`.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Init,
            name: "Init",
            on_enter: Some(init_enter),
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::Down,
            name: "Down",
            on_enter: Some(down_enter),
            on_exit: None,
            on_update: down_update,
        },
        StateDescriptor {
            id: StateId::Grab,
            name: "Grab",
            on_enter: Some(grab_enter),
            on_exit: None,
            on_update: grab_update,
        },
        StateDescriptor {
            id: StateId::Up,
            name: "Up",
            on_enter: Some(up_enter),
            on_exit: None,
            on_update: up_update,
        },
        StateDescriptor {
            id: StateId::Override,
            name: "Override",
            on_enter: Some(override_enter),
            on_exit: Some(override_exit),
            on_update: override_update,
        },
        StateDescriptor {
            id: StateId::Faulted,
            name: "Faulted",
            on_enter: Some(faulted_enter),
            on_exit: None,
            on_update: faulted_update,
        },
    ]
}

/// Watchdog latch check shared by every state except `Faulted` itself.
fn fault_pending(ctx: &LoaderContext) -> bool {
    ctx.faulted
}

// ---------------------------------------------------------------------------
// Init — home against the top endstop
// ---------------------------------------------------------------------------

fn init_enter(ctx: &mut LoaderContext) {
    // Position is unknown; call wherever we are zero so the runaway
    // check below has a reference.
    ctx.commands.zero_encoder = true;
    ctx.commands.magnet_on = false;
    ctx.commands.speed = MotorSpeed::Slow;
    ctx.commands.movement = Motion::Backward;
}

fn init_update(ctx: &mut LoaderContext) -> Option<StateId> {
    if fault_pending(ctx) {
        return Some(StateId::Faulted);
    }

    if ctx.inputs.endstop {
        ctx.commands.movement = Motion::Halt;
        ctx.commands.zero_encoder = true;
        return Some(StateId::Idle);
    }

    // Raising moves the count negative; travelling a full envelope
    // without seeing the endstop means the switch or wiring is dead.
    if ctx.position <= -ctx.config.max_travel {
        error!("homing: no endstop within {} counts", ctx.config.max_travel);
        ctx.commands.flag_error = Some(ErrorCode::HomingFailed);
        return Some(StateId::Faulted);
    }

    None
}

// ---------------------------------------------------------------------------
// Idle — parked at the top; entering here releases any held load
// ---------------------------------------------------------------------------

fn idle_enter(ctx: &mut LoaderContext) {
    ctx.commands.movement = Motion::Halt;
    ctx.commands.magnet_on = false;
}

fn idle_update(ctx: &mut LoaderContext) -> Option<StateId> {
    if fault_pending(ctx) {
        return Some(StateId::Faulted);
    }

    // Manual jog is available immediately.
    if ctx.inputs.forward || ctx.inputs.back {
        return Some(StateId::Override);
    }

    // The cycle button is gated by the idle dwell so a bouncing release
    // from the previous cycle cannot immediately restart it.
    if ctx.inputs.go && ctx.ms_in_state() >= ctx.config.idle_delay_ms {
        return Some(StateId::Down);
    }

    None
}

// ---------------------------------------------------------------------------
// Down — lower the bucket to the pile at full speed
// ---------------------------------------------------------------------------

fn down_enter(ctx: &mut LoaderContext) {
    ctx.commands.magnet_on = false;
    ctx.commands.speed = MotorSpeed::Fast;
    ctx.commands.movement = Motion::Forward;
}

fn down_update(ctx: &mut LoaderContext) -> Option<StateId> {
    if fault_pending(ctx) {
        return Some(StateId::Faulted);
    }

    // The top endstop cannot close while lowering away from it.
    if ctx.inputs.endstop {
        error!("descent: endstop closed at {} counts", ctx.position);
        ctx.commands.flag_error = Some(ErrorCode::EndstopContradiction);
        return Some(StateId::Faulted);
    }

    if ctx.position > ctx.config.travel_target + ctx.config.overshoot_buffer {
        error!("descent: overshot target, at {} counts", ctx.position);
        ctx.commands.flag_error = Some(ErrorCode::TravelOvershoot);
        return Some(StateId::Faulted);
    }

    if ctx.position >= ctx.config.travel_target {
        return Some(StateId::Grab);
    }

    None
}

// ---------------------------------------------------------------------------
// Grab — halt on the pile and energise the magnet
// ---------------------------------------------------------------------------

fn grab_enter(ctx: &mut LoaderContext) {
    ctx.commands.movement = Motion::Halt;
}

fn grab_update(ctx: &mut LoaderContext) -> Option<StateId> {
    if fault_pending(ctx) {
        return Some(StateId::Faulted);
    }

    // Coasting after the halt still counts toward the envelope.
    if ctx.position > ctx.config.travel_target + ctx.config.overshoot_buffer {
        warn!("grab: coasted past the envelope, at {} counts", ctx.position);
        ctx.commands.flag_error = Some(ErrorCode::TravelOvershoot);
        return Some(StateId::Faulted);
    }

    // Let the mechanism settle, then energise, then give the magnet
    // time to seat into the coal before pulling away.
    let dwell = ctx.ms_in_state();
    if dwell >= ctx.config.magnet_grab_delay_ms {
        ctx.commands.magnet_on = true;
    }
    if dwell >= ctx.config.magnet_grab_delay_ms + ctx.config.motor_grab_delay_ms {
        return Some(StateId::Up);
    }

    None
}

// ---------------------------------------------------------------------------
// Up — raise the load back to the endstop at full speed
// ---------------------------------------------------------------------------

fn up_enter(ctx: &mut LoaderContext) {
    ctx.commands.speed = MotorSpeed::Fast;
    ctx.commands.movement = Motion::Backward;
}

fn up_update(ctx: &mut LoaderContext) -> Option<StateId> {
    if fault_pending(ctx) {
        return Some(StateId::Faulted);
    }

    if ctx.inputs.endstop {
        ctx.commands.movement = Motion::Halt;
        // Home drifts a few counts per cycle; re-zero on every arrival.
        ctx.commands.zero_encoder = true;
        return Some(StateId::Idle);
    }

    // Past where home can possibly be: the endstop failed to close.
    if ctx.position < -ctx.config.undershoot_buffer {
        error!("ascent: passed home without the endstop, at {} counts", ctx.position);
        ctx.commands.flag_error = Some(ErrorCode::TravelOvershoot);
        return Some(StateId::Faulted);
    }

    None
}

// ---------------------------------------------------------------------------
// Override — manual jog under the direction buttons
// ---------------------------------------------------------------------------

fn override_enter(ctx: &mut LoaderContext) {
    ctx.commands.speed = MotorSpeed::Slow;
}

fn override_exit(ctx: &mut LoaderContext) {
    ctx.commands.movement = Motion::Halt;
}

fn override_update(ctx: &mut LoaderContext) -> Option<StateId> {
    if fault_pending(ctx) {
        return Some(StateId::Faulted);
    }

    ctx.commands.movement = match (ctx.inputs.forward, ctx.inputs.back) {
        (true, false) => Motion::Forward,
        (false, true) => Motion::Backward,
        // Both pressed is an operator mistake; hold still rather than
        // pick a side.
        (true, true) => Motion::Halt,
        (false, false) => return Some(StateId::Idle),
    };

    None
}

// ---------------------------------------------------------------------------
// Faulted — latched safe state
// ---------------------------------------------------------------------------

fn faulted_enter(ctx: &mut LoaderContext) {
    ctx.commands.movement = Motion::Halt;
    ctx.commands.magnet_on = false;
}

fn faulted_update(ctx: &mut LoaderContext) -> Option<StateId> {
    // Outputs stay pinned off while latched.
    ctx.commands.movement = Motion::Halt;
    ctx.commands.magnet_on = false;

    // The operator acknowledges by pressing GO; position is suspect
    // after a fault, so recovery always re-homes.
    if ctx.inputs.go {
        ctx.commands.clear_faults = true;
        return Some(StateId::Init);
    }

    None
}
