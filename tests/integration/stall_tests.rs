//! Stall detection through the full safety path: watchdog trip, drive
//! cut, blink code, and operator recovery.

use coalloader::error::ErrorCode;
use coalloader::fsm::StateId;
use coalloader::safety::WATCHDOG_LOOKBACK;

use crate::rig::{lock_rig, Rig};

const COUNTS_PER_TICK: i32 = 400;

fn rig_in_down() -> Rig {
    let mut rig = Rig::new();
    rig.inputs.endstop = true;
    rig.tick();
    rig.inputs.endstop = false;
    assert_eq!(rig.state(), StateId::Idle);

    let idle_ticks = rig.ticks_for_ms(rig.config.idle_delay_ms);
    rig.run(idle_ticks, 0);
    rig.inputs.go = true;
    rig.tick();
    rig.inputs.go = false;
    assert_eq!(rig.state(), StateId::Down);
    rig
}

#[test]
fn jammed_descent_cuts_drive_and_blinks_code_three() {
    let _guard = lock_rig();
    let mut rig = rig_in_down();

    // Healthy motion first, then the mechanism jams solid.
    rig.run(10, COUNTS_PER_TICK);
    assert!(rig.power.is_motor_enabled());

    let mut ticks_to_fault = 0;
    while rig.state() != StateId::Faulted {
        rig.tick(); // no crank: the encoder is frozen
        ticks_to_fault += 1;
        assert!(
            ticks_to_fault <= WATCHDOG_LOOKBACK + 2,
            "stall must fault within the lookback window"
        );
    }

    assert!(!rig.power.is_motor_enabled(), "drive cut on the stall tick");
    assert!(rig.watchdog.is_faulted());
    let codes = rig.display.active_codes();
    assert_eq!(codes.as_slice(), &[ErrorCode::MotorStall]);
}

#[test]
fn crawling_descent_is_still_a_stall() {
    let _guard = lock_rig();
    let mut rig = rig_in_down();

    // Below threshold/lookback per tick: moving, but far too slowly.
    let crawl = (rig.config.stall_threshold / WATCHDOG_LOOKBACK as u32) as i32;
    let mut ticks = 0;
    while rig.state() != StateId::Faulted {
        rig.crank(crawl);
        rig.tick();
        ticks += 1;
        assert!(ticks <= WATCHDOG_LOOKBACK + 2, "crawl must trip quickly");
    }
    assert!(rig.watchdog.is_faulted());
}

#[test]
fn go_clears_the_fault_and_rehomes() {
    let _guard = lock_rig();
    let mut rig = rig_in_down();
    rig.run(WATCHDOG_LOOKBACK + 2, 0);
    assert_eq!(rig.state(), StateId::Faulted);

    // Latched: nothing happens without the operator.
    rig.run(20, 0);
    assert_eq!(rig.state(), StateId::Faulted);
    assert!(rig.display.any_active());

    rig.inputs.go = true;
    rig.tick();
    rig.inputs.go = false;

    assert_eq!(rig.state(), StateId::Init);
    assert!(!rig.watchdog.is_faulted(), "latch cleared on acknowledge");
    assert!(!rig.display.any_active(), "blink codes cleared");
    assert!(rig.power.is_motor_enabled(), "re-homing drive running");

    // And the re-home completes normally.
    rig.run(3, -COUNTS_PER_TICK);
    rig.inputs.endstop = true;
    rig.tick();
    assert_eq!(rig.state(), StateId::Idle);
}
