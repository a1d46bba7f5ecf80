//! Power sequencer for the motor and electromagnet outputs.
//!
//! The motor drives through a PWM output plus a direction-reversal relay.
//! Reversing under power would arc the relay contacts and dump flyback
//! current through the driver, so every direction change runs a fixed
//! sequence: cut the drive, wait out the flyback discharge (~100 ms),
//! switch the relay, wait out the contact settle (~250 ms), re-apply
//! drive.  The waits are deliberate blocking waits — nothing else is
//! allowed to energise the motor while an interlock window is open — but
//! they are opportunistic where the original sequence permits: a settle
//! window that already elapsed while the mechanism sat idle costs nothing.
//!
//! The electromagnet gets a full-duty "pulse" when enabled so the coal
//! bites, then drops to a hold duty once the pulse length (counted in PWM
//! periods, ~122 Hz) is reached.  The per-period counting tick disarms
//! itself after the drop, exactly like a one-shot overflow interrupt.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use log::{debug, info};

use crate::config::LoaderConfig;
use crate::display::ErrorDisplay;
use crate::drivers::hw_init;
use crate::encoder;
use crate::pins;
use crate::safety::MovementWatchdog;
use crate::time::MonotonicClock;

/// Motor PWM duty preset selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSpeed {
    Slow,
    Fast,
}

/// Commanded motor movement.  Forward lowers the bucket, Backward raises
/// it, Halt cuts the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motion {
    Forward,
    Backward,
    #[default]
    Halt,
}

// ---------------------------------------------------------------------------
// Magnet pulse state
// ---------------------------------------------------------------------------
//
// The pulse counter runs in the PWM-period timer callback while set_magnet
// runs in the main task, so the shared pieces are atomics.  The duty shadow
// lets host tests observe the output without hardware.

static MAGNET_DUTY: AtomicU8 = AtomicU8::new(0);
static MAGNET_PULSE_COUNT: AtomicU32 = AtomicU32::new(0);
static MAGNET_PULSE_ARMED: AtomicBool = AtomicBool::new(false);
static MAGNET_HOLD_DUTY: AtomicU8 = AtomicU8::new(0);
static MAGNET_PULSE_CYCLES: AtomicU32 = AtomicU32::new(0);

fn write_magnet_duty(duty: u8) {
    MAGNET_DUTY.store(duty, Ordering::Release);
    hw_init::ledc_set(hw_init::LEDC_CH_MAGNET, duty);
}

/// Magnet duty as last written (pulse, hold, or 0).
pub fn magnet_duty() -> u8 {
    MAGNET_DUTY.load(Ordering::Acquire)
}

/// Count one PWM period toward the magnet pulse.
///
/// Driven by the ~122 Hz period timer on hardware and called directly by
/// tests.  Once the configured pulse length has elapsed the duty drops to
/// the hold level and the counter disarms itself — enabling the magnet
/// again re-arms it.
pub fn magnet_pulse_tick() {
    if !MAGNET_PULSE_ARMED.load(Ordering::Acquire) {
        return;
    }
    let elapsed = MAGNET_PULSE_COUNT.fetch_add(1, Ordering::Relaxed);
    if elapsed >= MAGNET_PULSE_CYCLES.load(Ordering::Relaxed) {
        write_magnet_duty(MAGNET_HOLD_DUTY.load(Ordering::Relaxed));
        MAGNET_PULSE_ARMED.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Power sequencer
// ---------------------------------------------------------------------------

/// Owns both power outputs and enforces the direction-change interlocks.
pub struct PowerSequencer {
    movement: Motion,
    speed: MotorSpeed,
    motor_enabled: bool,
    magnet_enabled: bool,
    /// Duty currently applied to the motor output.
    motor_duty: u8,
    /// Relay shadow: true = backward contacts engaged.
    relay_backward: bool,
    /// When the relay last switched (monotonic ms).
    last_relay_change_ms: u64,
    /// When motor drive was last cut (monotonic ms).
    last_motor_disable_ms: u64,
    clock: MonotonicClock,

    // Config-derived presets.
    slow_duty: u8,
    fast_duty: u8,
    magnet_pulse_duty: u8,
    flyback_delay_ms: u64,
    relay_settle_ms: u64,
}

impl PowerSequencer {
    pub fn new(config: &LoaderConfig) -> Self {
        MAGNET_HOLD_DUTY.store(config.magnet_hold_duty, Ordering::Relaxed);
        MAGNET_PULSE_CYCLES.store(config.magnet_pulse_cycles, Ordering::Relaxed);

        let clock = MonotonicClock::new();
        let now = clock.now_ms();
        let mut seq = Self {
            movement: Motion::Halt,
            speed: MotorSpeed::Slow,
            motor_enabled: false,
            magnet_enabled: false,
            motor_duty: 0,
            relay_backward: false,
            // Treat boot as a fresh relay change so the first move waits
            // out a full settle window.
            last_relay_change_ms: now,
            last_motor_disable_ms: now,
            clock,
            slow_duty: config.slow_duty,
            fast_duty: config.fast_duty,
            magnet_pulse_duty: config.magnet_pulse_duty,
            flyback_delay_ms: config.flyback_delay_ms,
            relay_settle_ms: config.relay_settle_ms,
        };
        seq.write_motor_duty(0);
        seq.write_relay(false);
        write_magnet_duty(0);
        seq
    }

    /// Command a motor movement, blocking through whatever interlock
    /// windows the transition requires (up to flyback + settle, ~350 ms).
    ///
    /// The watchdog is disarmed before drive is ever cut and re-armed
    /// just before it is re-applied, so interlock waits can never read as
    /// stalls.  `display` keeps refreshing during the waits.
    pub fn set_motor(
        &mut self,
        movement: Motion,
        watchdog: &mut MovementWatchdog,
        display: &mut ErrorDisplay,
    ) {
        if self.movement == movement {
            return;
        }
        debug!("power: motor {:?} -> {:?}", self.movement, movement);

        match movement {
            Motion::Forward => {
                if self.movement == Motion::Backward {
                    self.write_motor_duty(0);
                    watchdog.disarm();
                    self.last_motor_disable_ms = self.clock.now_ms();
                    self.wait_for(self.flyback_delay_ms, display);
                    self.write_relay(false);
                    self.last_relay_change_ms = self.clock.now_ms();
                }
                // Opportunistic: if the relay switched long ago (or not at
                // all this transition) this falls straight through.
                self.wait_since(self.last_relay_change_ms, self.relay_settle_ms, display);
                self.write_motor_duty(self.speed_duty());
                watchdog.arm(encoder::position());
                self.motor_enabled = true;
            }
            Motion::Backward => {
                if self.movement == Motion::Forward {
                    self.write_motor_duty(0);
                    watchdog.disarm();
                    self.last_motor_disable_ms = self.clock.now_ms();
                }
                // Opportunistic flyback: counts from whenever drive was
                // last cut, which may have been a while ago.
                self.wait_since(self.last_motor_disable_ms, self.flyback_delay_ms, display);
                self.write_relay(true);
                self.last_relay_change_ms = self.clock.now_ms();
                self.wait_for(self.relay_settle_ms, display);
                self.write_motor_duty(self.speed_duty());
                watchdog.arm(encoder::position());
                self.motor_enabled = true;
            }
            Motion::Halt => {
                self.write_motor_duty(0);
                watchdog.disarm();
                self.last_motor_disable_ms = self.clock.now_ms();
                if self.movement == Motion::Backward {
                    // Park the relay in the forward position so the next
                    // forward move needs no relay work.
                    self.wait_for(self.flyback_delay_ms, display);
                    self.write_relay(false);
                    self.last_relay_change_ms = self.clock.now_ms();
                }
                self.motor_enabled = false;
            }
        }
        self.movement = movement;
    }

    /// Select the motor duty preset.  Takes effect immediately when the
    /// motor is enabled, otherwise at the next `set_motor`.
    pub fn set_speed(&mut self, speed: MotorSpeed) {
        self.speed = speed;
        if self.motor_enabled {
            self.write_motor_duty(self.speed_duty());
        }
    }

    /// Enable or disable the electromagnet.
    ///
    /// Enabling starts the full-duty grab pulse and arms the period
    /// counter; disabling kills the output and the counter at once.
    pub fn set_magnet(&mut self, enable: bool) {
        if self.magnet_enabled == enable {
            return;
        }
        self.magnet_enabled = enable;
        if enable {
            info!("power: magnet on (pulse)");
            MAGNET_PULSE_COUNT.store(0, Ordering::Relaxed);
            write_magnet_duty(self.magnet_pulse_duty);
            MAGNET_PULSE_ARMED.store(true, Ordering::Release);
        } else {
            info!("power: magnet off");
            MAGNET_PULSE_ARMED.store(false, Ordering::Release);
            write_magnet_duty(0);
        }
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.motor_enabled
    }

    pub fn is_magnet_enabled(&self) -> bool {
        self.magnet_enabled
    }

    pub fn movement(&self) -> Motion {
        self.movement
    }

    pub fn speed(&self) -> MotorSpeed {
        self.speed
    }

    /// Motor duty as last written.
    pub fn motor_duty(&self) -> u8 {
        self.motor_duty
    }

    /// Relay shadow: true = backward contacts engaged.
    pub fn relay_backward(&self) -> bool {
        self.relay_backward
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn speed_duty(&self) -> u8 {
        match self.speed {
            MotorSpeed::Slow => self.slow_duty,
            MotorSpeed::Fast => self.fast_duty,
        }
    }

    fn write_motor_duty(&mut self, duty: u8) {
        self.motor_duty = duty;
        hw_init::ledc_set(hw_init::LEDC_CH_MOTOR, duty);
    }

    fn write_relay(&mut self, backward: bool) {
        self.relay_backward = backward;
        hw_init::gpio_write(pins::MOTOR_DIR_GPIO, backward);
    }

    /// Block until `duration_ms` has elapsed since `since_ms`, servicing
    /// the error display throughout.  Returns immediately if the window
    /// already elapsed.
    fn wait_since(&self, since_ms: u64, duration_ms: u64, display: &mut ErrorDisplay) {
        loop {
            let now = self.clock.now_ms();
            if now.saturating_sub(since_ms) >= duration_ms {
                return;
            }
            display.refresh(now);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Block for a full `duration_ms` from now.
    fn wait_for(&self, duration_ms: u64, display: &mut ErrorDisplay) {
        self.wait_since(self.clock.now_ms(), duration_ms, display);
    }
}
