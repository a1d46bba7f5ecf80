//! Quadrature position decoder for the motor-shaft encoder.
//!
//! Both encoder channels raise an interrupt on every edge.  Each edge is
//! decoded against the previous 2-bit channel sample through a 16-entry
//! delta table, so no transition is ever guessed at: every one of the
//! 16 (old, new) sample pairs has a defined position delta, including the
//! "impossible" both-bits-changed pairs, which contribute ±2 and are
//! tallied separately as evidence of missed edges.
//!
//! Position and the previous sample live in `static` atomics because
//! ESP-IDF ISR callbacks cannot capture closures — the same pattern as any
//! other ISR-shared state in this firmware.  `position()` is a single
//! `AtomicI32` load, so readers always see a complete, torn-free value no
//! matter what the edge handlers are doing.

use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use crate::drivers::hw_init;
use crate::pins;

/// Which encoder channel raised the edge interrupt.
///
/// The two channels use mirrored delta tables: an edge seen on A with a
/// given sample pair moves the position the opposite way to the same pair
/// seen on B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

// Delta tables indexed by (new_b << 3) | (new_a << 2) | (old_b << 1) | old_a.
// Entries where old == new are 0 (spurious interrupt, no movement); entries
// where both bits changed are ±2 (an intermediate edge was missed).

#[rustfmt::skip]
const DELTA_A: [i8; 16] = [
     0,  1, -1, -2,
    -1,  0,  2,  1,
     1,  2,  0, -1,
    -2, -1,  1,  0,
];

#[rustfmt::skip]
const DELTA_B: [i8; 16] = [
     0,  1, -1,  2,
    -1,  0, -2,  1,
     1, -2,  0, -1,
     2, -1,  1,  0,
];

/// Decode one edge: previous 2-bit sample + fresh pin levels → new sample
/// and signed position delta.
///
/// Pure function — the ISR glue below applies the result to the shared
/// atomics, and the tests drive it directly.
pub fn decode(old_state: u8, channel: Channel, new_a: bool, new_b: bool) -> (u8, i8) {
    let new_state = (u8::from(new_b) << 1) | u8::from(new_a);
    let index = usize::from((new_state << 2) | (old_state & 0b11));
    let delta = match channel {
        Channel::A => DELTA_A[index],
        Channel::B => DELTA_B[index],
    };
    (new_state, delta)
}

// ---------------------------------------------------------------------------
// Shared decoder state
// ---------------------------------------------------------------------------

/// Previous 2-bit channel sample (bit 1 = B, bit 0 = A).
static QUAD_STATE: AtomicU8 = AtomicU8::new(0);
/// Signed position in encoder counts.  Written only by the edge handlers
/// (and `zero()`); read from anywhere with a single atomic load.
static POSITION: AtomicI32 = AtomicI32::new(0);
/// Count of both-bits-changed transitions (missed intermediate edges).
/// Logged from task context — never from the ISR.
static DOUBLE_STEPS: AtomicU32 = AtomicU32::new(0);

fn apply_edge(channel: Channel, new_a: bool, new_b: bool) {
    let old = QUAD_STATE.load(Ordering::Relaxed);
    let (new_state, delta) = decode(old, channel, new_a, new_b);
    QUAD_STATE.store(new_state, Ordering::Relaxed);
    if delta != 0 {
        POSITION.fetch_add(i32::from(delta), Ordering::AcqRel);
    }
    if delta == 2 || delta == -2 {
        DOUBLE_STEPS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Called from the channel-A GPIO ISR with freshly sampled pin levels.
pub fn channel_a_edge(new_a: bool, new_b: bool) {
    apply_edge(Channel::A, new_a, new_b);
}

/// Called from the channel-B GPIO ISR with freshly sampled pin levels.
pub fn channel_b_edge(new_a: bool, new_b: bool) {
    apply_edge(Channel::B, new_a, new_b);
}

/// Current position in encoder counts.  Lock-free, torn-free.
pub fn position() -> i32 {
    POSITION.load(Ordering::Acquire)
}

/// Re-home: declare the current mechanical position to be zero.
pub fn zero() {
    POSITION.store(0, Ordering::Release);
}

/// Drain the missed-edge tally (both-bits-changed transitions since the
/// last call).  The safety tick logs a warning when this is nonzero.
pub fn take_double_steps() -> u32 {
    DOUBLE_STEPS.swap(0, Ordering::Relaxed)
}

/// Seed the decoder from the live pin levels and zero the position.
/// Must run after the encoder GPIOs are configured and before their
/// interrupts are enabled, so the first real edge decodes against a true
/// sample instead of a power-on default.
pub fn init() {
    let a = hw_init::gpio_read(pins::ENC_A_GPIO);
    let b = hw_init::gpio_read(pins::ENC_B_GPIO);
    QUAD_STATE.store((u8::from(b) << 1) | u8::from(a), Ordering::Relaxed);
    POSITION.store(0, Ordering::Release);
    DOUBLE_STEPS.store(0, Ordering::Relaxed);
}
