//! GPIO / peripheral pin assignments for the coal-loader control board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Quadrature encoder (motor shaft)
// ---------------------------------------------------------------------------

/// Encoder channel A — input with pull-up, any-edge interrupt.
pub const ENC_A_GPIO: i32 = 4;
/// Encoder channel B — input with pull-up, any-edge interrupt.
pub const ENC_B_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Motor drive (PWM + direction relay)
// ---------------------------------------------------------------------------

/// Digital output driving the direction-reversal relay.
/// LOW = forward (lowering), HIGH = backward (raising).
pub const MOTOR_DIR_GPIO: i32 = 8;
/// LEDC PWM output for motor speed.
pub const MOTOR_PWM_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Electromagnet (PWM)
// ---------------------------------------------------------------------------

/// LEDC PWM output for the electromagnet coil driver.
pub const MAGNET_PWM_GPIO: i32 = 10;

// ---------------------------------------------------------------------------
// Operator buttons (active-low with pull-ups)
// ---------------------------------------------------------------------------

/// Momentary "go" button — starts a load cycle / clears faults.
pub const GO_GPIO: i32 = 15;
/// Manual-override jog forward (lower).
pub const FORWARD_GPIO: i32 = 16;
/// Manual-override jog backward (raise).
pub const BACK_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// Endstop + indicator LEDs
// ---------------------------------------------------------------------------

/// Home-position endstop switch (active-low with pull-up).
pub const ENDSTOP_GPIO: i32 = 6;
/// Indicator LED mirroring the debounced endstop state.
pub const ENDSTOP_LED_GPIO: i32 = 7;
/// Status LED used for blink-coded error display.
pub const ERROR_LED_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC base frequency for both power outputs.  The magnet pulse length is
/// counted in periods of this frequency, so it is part of the power-stage
/// timing contract.
pub const POWER_PWM_FREQ_HZ: u32 = 122;
