//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern: a fixed table of state descriptors, each
//! a row of plain `fn` pointers — no closures, no dynamic dispatch, no
//! heap.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  StateTable                                               │
//! │  ┌──────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ StateId  │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├──────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Init     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Idle     │ …         │ …        │ …                 │  │
//! │  │ Down     │ …         │ …        │ …                 │  │
//! │  │ Grab     │ …         │ …        │ …                 │  │
//! │  │ Up       │ …         │ …        │ …                 │  │
//! │  │ Override │ …         │ …        │ …                 │  │
//! │  │ Faulted  │ …         │ …        │ …                 │  │
//! │  └──────────┴───────────┴──────────┴───────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  If
//! it returns `Some(next_id)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next, and updates the current pointer.
//! All functions receive `&mut LoaderContext`, which holds the debounced
//! inputs, the position sample, actuator commands, config, and timing.

pub mod context;
pub mod states;

use context::LoaderContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all loader states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    /// Homing: raise slowly until the endstop defines position zero.
    Init = 0,
    /// At rest at the top, waiting for the operator.
    Idle = 1,
    /// Lowering the bucket to the coal pile.
    Down = 2,
    /// Halted at the pile, energising the magnet.
    Grab = 3,
    /// Raising the load back to the top.
    Up = 4,
    /// Manual jog under the operator's direction buttons.
    Override = 5,
    /// Latched fault: everything off until the operator clears it.
    Faulted = 6,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 7;

    /// Convert a `u8` index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Faulted` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Init,
            1 => Self::Idle,
            2 => Self::Down,
            3 => Self::Grab,
            4 => Self::Up,
            5 => Self::Override,
            6 => Self::Faulted,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Faulted
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut LoaderContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut LoaderContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array — no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and is driven with
/// a mutable [`LoaderContext`] threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter (wraps at u64::MAX).
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut LoaderContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut LoaderContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition regardless of what `on_update`
    /// returned (used by tests to set up scenarios mid-cycle).
    pub fn force_transition(&mut self, next: StateId, ctx: &mut LoaderContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut LoaderContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        // Exit current state
        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        // Update pointer and timing
        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        // Enter new state
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}


#[cfg(all(test, not(target_os = "espidf")))]
mod proptests {
    use super::context::LoaderContext;
    use super::*;
    use crate::config::LoaderConfig;
    use proptest::prelude::*;

    fn arb_tick_input() -> impl Strategy<Value = (i32, bool, bool, bool, bool, bool)> {
        (
            -80_000i32..80_000, // position
            any::<bool>(),      // go
            any::<bool>(),      // forward
            any::<bool>(),      // back
            any::<bool>(),      // endstop
            any::<bool>(),      // faulted
        )
    }

    proptest! {
        #[test]
        fn no_invalid_state_reachable(
            inputs in proptest::collection::vec(arb_tick_input(), 1..200)
        ) {
            let mut fsm = Fsm::new(states::build_state_table(), StateId::Init);
            let mut ctx = LoaderContext::new(LoaderConfig::default());
            fsm.start(&mut ctx);

            for (position, go, forward, back, endstop, faulted) in inputs {
                ctx.position = position;
                ctx.inputs.go = go;
                ctx.inputs.forward = forward;
                ctx.inputs.back = back;
                ctx.inputs.endstop = endstop;
                ctx.faulted = faulted;
                fsm.tick(&mut ctx);

                let current = fsm.current_state();
                prop_assert_eq!(StateId::from_index(current as usize), current);

                // A latched fault must pin the machine in Faulted — unless
                // GO is acknowledging it this very tick, which legitimately
                // re-enters Init.
                if faulted && !go {
                    prop_assert_eq!(current, StateId::Faulted);
                }
            }
        }

        #[test]
        fn faulted_never_energises_actuators(seed_position in -80_000i32..80_000) {
            let mut fsm = Fsm::new(states::build_state_table(), StateId::Init);
            let mut ctx = LoaderContext::new(LoaderConfig::default());
            fsm.start(&mut ctx);

            ctx.position = seed_position;
            ctx.faulted = true;
            for _ in 0..5 {
                fsm.tick(&mut ctx);
                prop_assert_eq!(ctx.commands.movement, crate::power::Motion::Halt);
                prop_assert!(!ctx.commands.magnet_on);
            }
        }
    }
}
