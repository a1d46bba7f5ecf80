//! Debounced operator inputs: buttons and the home endstop.
//!
//! All four inputs are mechanical contacts wired active-low with pull-ups,
//! sampled at the safety tick rate (~61 Hz).  Electrical noise on the long
//! cable run to the endstop can flip a single sample, so an input only
//! *registers* after `debounce_count` consecutive engaged samples; a single
//! disengaged sample releases it and restarts the count.

use crate::config::LoaderConfig;
use crate::drivers::hw_init;
use crate::pins;

/// Number of debounced input channels.
const CHANNELS: usize = 4;

const GO: usize = 0;
const FORWARD: usize = 1;
const BACK: usize = 2;
const ENDSTOP: usize = 3;

/// One raw sample of every input (true = contact engaged).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub go: bool,
    pub forward: bool,
    pub back: bool,
    pub endstop: bool,
}

impl RawSample {
    /// Read the live pin levels.  Contacts are active-low.
    pub fn from_hardware() -> Self {
        Self {
            go: !hw_init::gpio_read(pins::GO_GPIO),
            forward: !hw_init::gpio_read(pins::FORWARD_GPIO),
            back: !hw_init::gpio_read(pins::BACK_GPIO),
            endstop: !hw_init::gpio_read(pins::ENDSTOP_GPIO),
        }
    }

    fn channel(self, idx: usize) -> bool {
        match idx {
            GO => self.go,
            FORWARD => self.forward,
            BACK => self.back,
            _ => self.endstop,
        }
    }
}

/// Debounced view of the inputs (true = registered engaged).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    pub go: bool,
    pub forward: bool,
    pub back: bool,
    pub endstop: bool,
}

/// Consecutive-count debouncer over all input channels.
pub struct DebouncedInputs {
    counts: [u8; CHANNELS],
    engaged: [bool; CHANNELS],
    required: u8,
}

impl DebouncedInputs {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            counts: [0; CHANNELS],
            engaged: [false; CHANNELS],
            required: config.debounce_count.max(1),
        }
    }

    /// Feed one raw sample and return the debounced state.
    pub fn sample(&mut self, raw: RawSample) -> InputSnapshot {
        for idx in 0..CHANNELS {
            if raw.channel(idx) {
                self.counts[idx] = self.counts[idx].saturating_add(1);
                if self.counts[idx] >= self.required {
                    self.engaged[idx] = true;
                }
            } else {
                self.counts[idx] = 0;
                self.engaged[idx] = false;
            }
        }
        self.snapshot()
    }

    /// Debounced state as of the last sample.
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            go: self.engaged[GO],
            forward: self.engaged[FORWARD],
            back: self.engaged[BACK],
            endstop: self.engaged[ENDSTOP],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> DebouncedInputs {
        DebouncedInputs::new(&LoaderConfig::default())
    }

    const GO_DOWN: RawSample = RawSample { go: true, forward: false, back: false, endstop: false };
    const ALL_UP: RawSample = RawSample { go: false, forward: false, back: false, endstop: false };

    #[test]
    fn registers_only_after_required_consecutive_samples() {
        let mut inputs = debouncer();
        for _ in 0..4 {
            assert!(!inputs.sample(GO_DOWN).go);
        }
        assert!(inputs.sample(GO_DOWN).go, "fifth consecutive sample registers");
    }

    #[test]
    fn single_glitch_restarts_the_count() {
        let mut inputs = debouncer();
        for _ in 0..4 {
            inputs.sample(GO_DOWN);
        }
        inputs.sample(ALL_UP); // noise
        for _ in 0..4 {
            assert!(!inputs.sample(GO_DOWN).go);
        }
        assert!(inputs.sample(GO_DOWN).go);
    }

    #[test]
    fn releases_immediately() {
        let mut inputs = debouncer();
        for _ in 0..5 {
            inputs.sample(GO_DOWN);
        }
        assert!(inputs.snapshot().go);
        assert!(!inputs.sample(ALL_UP).go, "one open sample releases");
    }

    #[test]
    fn channels_are_independent() {
        let mut inputs = debouncer();
        let forward_and_endstop =
            RawSample { go: false, forward: true, back: false, endstop: true };
        for _ in 0..5 {
            inputs.sample(forward_and_endstop);
        }
        let snap = inputs.snapshot();
        assert!(snap.forward && snap.endstop);
        assert!(!snap.go && !snap.back);
    }

    #[test]
    fn held_input_stays_registered() {
        let mut inputs = debouncer();
        for _ in 0..100 {
            inputs.sample(GO_DOWN);
        }
        assert!(inputs.snapshot().go);
    }
}
