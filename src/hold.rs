//! Timed pauses inside an effect.

use crate::time::{Instant, secs_to_micros};
use crate::types::HoldState;

/// A pause that freezes an effect once it reaches a completion point.
///
/// `fraction` is the share of the effect's steps that must be done before the
/// hold fires: `0.5` pauses halfway, `1.0` pauses on arrival at the target.
#[derive(Debug, Clone)]
pub struct Hold {
    fraction: f32,
    threshold: u32,
    remaining: i64,
    duration: i64,
    last: Instant,
    state: HoldState,
}

impl Hold {
    /// Creates a hold of `seconds` at completion `fraction` (clamped to 0-1).
    pub fn new(seconds: f64, fraction: f64) -> Self {
        let duration = secs_to_micros(seconds) as i64;
        let fraction = if fraction.is_nan() {
            1.0
        } else {
            fraction.clamp(0.0, 1.0) as f32
        };
        Self {
            fraction,
            threshold: 0,
            remaining: duration,
            duration,
            last: Instant::ZERO,
            state: HoldState::Pending,
        }
    }

    /// Arms the hold for an effect of `total_steps` steps.
    ///
    /// Must be called again on every loop iteration of the owning effect.
    pub fn init(&mut self, total_steps: u32) {
        if total_steps == 0 {
            return;
        }
        self.state = HoldState::Pending;
        self.remaining = self.duration;
        let total = total_steps as f32;
        self.threshold = (total - total * self.fraction) as u32;
        trace!(
            "hold armed: {} us with {} steps remaining",
            self.duration,
            self.threshold
        );
    }

    /// Advances the hold given the effect's remaining steps.
    ///
    /// Returns `true` while the hold is active, meaning the effect must not
    /// step this tick.
    pub fn step(&mut self, steps_remaining: u32, now: Instant) -> bool {
        if self.state == HoldState::Pending && steps_remaining <= self.threshold {
            self.state = HoldState::Active;
            self.last = now;
            debug!(
                "hold active at {} steps remaining for {} us",
                steps_remaining,
                self.remaining
            );
        }
        if self.state == HoldState::Active {
            self.remaining -= now.micros_since(self.last) as i64;
            self.last = now;
            if self.remaining <= 0 {
                self.state = HoldState::Complete;
                debug!("hold complete");
            }
        }
        self.state == HoldState::Active
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state == HoldState::Pending
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == HoldState::Complete
    }

    /// Remaining-step count at which the hold fires.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Microseconds left on the countdown.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Configured length in microseconds.
    pub fn duration(&self) -> u32 {
        self.duration as u32
    }
}
