//! Full load-cycle scenarios on the wired-together stack.

use coalloader::error::ErrorCode;
use coalloader::fsm::StateId;
use coalloader::power::{self, Motion};

use crate::rig::{lock_rig, Rig};

/// Healthy descent rate: comfortably past the stall threshold per
/// watchdog window, and fast enough to keep the tests quick.
const COUNTS_PER_TICK: i32 = 400;

/// Home a fresh rig: the endstop closes immediately.
fn homed_rig() -> Rig {
    let mut rig = Rig::new();
    assert_eq!(rig.state(), StateId::Init);
    rig.inputs.endstop = true;
    rig.tick();
    assert_eq!(rig.state(), StateId::Idle);
    rig.inputs.endstop = false;
    rig
}

/// Wait out the idle dwell and press GO.
fn start_cycle(rig: &mut Rig) {
    let idle_ticks = rig.ticks_for_ms(rig.config.idle_delay_ms);
    rig.run(idle_ticks, 0);
    rig.inputs.go = true;
    rig.tick();
    rig.inputs.go = false;
    assert_eq!(rig.state(), StateId::Down);
}

#[test]
fn homing_halts_and_zeroes_at_the_endstop() {
    let _guard = lock_rig();
    let mut rig = Rig::new();

    // Raise a little way before the endstop closes.
    rig.run(5, -COUNTS_PER_TICK);
    assert_eq!(rig.state(), StateId::Init);
    assert!(rig.power.is_motor_enabled());

    rig.inputs.endstop = true;
    rig.tick();
    assert_eq!(rig.state(), StateId::Idle);
    assert!(!rig.power.is_motor_enabled());
    assert_eq!(coalloader::encoder::position(), 0, "home re-zeroes");
}

#[test]
fn complete_cycle_descends_grabs_raises_and_releases() {
    let _guard = lock_rig();
    let mut rig = homed_rig();
    start_cycle(&mut rig);

    // Descend until the target hands over to Grab.
    let mut ticks = 0;
    while rig.state() == StateId::Down {
        rig.crank(COUNTS_PER_TICK);
        rig.tick();
        ticks += 1;
        assert!(ticks < 500, "descent never reached the target");
    }
    assert_eq!(rig.state(), StateId::Grab);
    assert!(!rig.power.is_motor_enabled(), "halted on the pile");
    assert!(rig.ctx.position >= rig.config.travel_target);

    // Dwell: the magnet energises partway through and pulses at full
    // duty until the hardware countdown drops it to hold.
    let dwell = rig.config.magnet_grab_delay_ms + rig.config.motor_grab_delay_ms;
    let mut saw_magnet_on = false;
    for _ in 0..rig.ticks_for_ms(dwell) {
        rig.tick();
        saw_magnet_on |= rig.power.is_magnet_enabled();
        if rig.state() != StateId::Grab {
            break;
        }
    }
    assert!(saw_magnet_on, "magnet must energise during the grab dwell");
    assert_eq!(rig.state(), StateId::Up);
    assert_eq!(rig.power.movement(), Motion::Backward);
    assert!(rig.power.is_magnet_enabled(), "load held while raising");

    // Raise back to the top.
    let mut ticks = 0;
    while rig.ctx.position > COUNTS_PER_TICK {
        rig.crank(-COUNTS_PER_TICK);
        rig.tick();
        assert_eq!(rig.state(), StateId::Up);
        ticks += 1;
        assert!(ticks < 500, "ascent never came home");
    }
    rig.inputs.endstop = true;
    rig.tick();
    rig.inputs.endstop = false;

    assert_eq!(rig.state(), StateId::Idle);
    assert!(!rig.power.is_motor_enabled());
    assert!(!rig.power.is_magnet_enabled(), "load dropped at the top");
    assert_eq!(power::magnet_duty(), 0);
    assert_eq!(coalloader::encoder::position(), 0);
    assert!(!rig.display.any_active(), "clean cycle flags nothing");
}

#[test]
fn endstop_mid_descent_latches_a_contradiction_fault() {
    let _guard = lock_rig();
    let mut rig = homed_rig();
    start_cycle(&mut rig);

    rig.run(10, COUNTS_PER_TICK);
    assert_eq!(rig.state(), StateId::Down);

    rig.inputs.endstop = true;
    rig.tick();
    rig.inputs.endstop = false;

    assert_eq!(rig.state(), StateId::Faulted);
    assert!(!rig.power.is_motor_enabled());
    assert!(!rig.power.is_magnet_enabled());
    let codes = rig.display.active_codes();
    assert_eq!(codes.as_slice(), &[ErrorCode::EndstopContradiction]);
}

#[test]
fn grab_pulse_drops_to_hold_duty() {
    let _guard = lock_rig();
    let mut rig = homed_rig();
    start_cycle(&mut rig);

    while rig.state() == StateId::Down {
        rig.crank(COUNTS_PER_TICK);
        rig.tick();
    }
    assert_eq!(rig.state(), StateId::Grab);

    // Dwell until the magnet energises at full pulse duty.
    while !rig.power.is_magnet_enabled() {
        rig.tick();
        assert_eq!(rig.state(), StateId::Grab, "magnet must come on during Grab");
    }
    assert_eq!(power::magnet_duty(), rig.config.magnet_pulse_duty);

    // The period timer counts the pulse out and drops to hold.
    for _ in 0..=rig.config.magnet_pulse_cycles {
        power::magnet_pulse_tick();
    }
    assert_eq!(power::magnet_duty(), rig.config.magnet_hold_duty);

    // The FSM keeps commanding magnet-on each tick; the sequencer must
    // not restart the pulse.
    rig.tick();
    assert_eq!(power::magnet_duty(), rig.config.magnet_hold_duty);
}

#[test]
fn override_direction_flip_respects_interlocks() {
    let _guard = lock_rig();
    let mut rig = homed_rig();

    rig.inputs.forward = true;
    rig.tick();
    rig.tick();
    assert_eq!(rig.power.movement(), Motion::Forward);
    rig.run(5, COUNTS_PER_TICK);

    // Flip to backward while still driving: the sequencer must wait out
    // flyback + relay settle before re-applying drive.
    let clock = coalloader::time::MonotonicClock::new();
    rig.inputs.forward = false;
    rig.inputs.back = true;
    let start = clock.now_ms();
    rig.tick();
    let elapsed = clock.now_ms() - start;
    assert_eq!(rig.power.movement(), Motion::Backward);
    assert!(
        elapsed >= rig.config.flyback_delay_ms + rig.config.relay_settle_ms,
        "direction flip took only {elapsed} ms"
    );
    assert!(rig.power.relay_backward());

    rig.inputs.back = false;
    rig.tick();
    assert_eq!(rig.state(), StateId::Idle);
}

#[test]
fn manual_override_jogs_both_ways() {
    let _guard = lock_rig();
    let mut rig = homed_rig();

    rig.inputs.forward = true;
    rig.tick();
    assert_eq!(rig.state(), StateId::Override);
    rig.tick();
    assert_eq!(rig.power.movement(), Motion::Forward);
    assert_eq!(rig.power.motor_duty(), rig.config.slow_duty, "jog is slow");

    // Jog down a bit, then release.
    rig.run(5, COUNTS_PER_TICK);
    rig.inputs.forward = false;
    rig.tick();
    assert_eq!(rig.state(), StateId::Idle);
    assert!(!rig.power.is_motor_enabled());

    // Jog back up.
    rig.inputs.back = true;
    rig.tick();
    rig.tick();
    assert_eq!(rig.power.movement(), Motion::Backward);
    rig.run(5, -COUNTS_PER_TICK);
    rig.inputs.back = false;
    rig.tick();
    assert_eq!(rig.state(), StateId::Idle);
}
