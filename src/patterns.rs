//! Ready-made patterns composed from effects and holds.
//!
//! Every pattern except [`Fader::rotate`] and [`Fader::self_test`] only
//! starts when the queue is empty and reports whether it did, so calling it
//! from the main loop on every tick keeps it repeating.

use crate::channel::ChannelOutput;
use crate::effect::EffectSpec;
use crate::fader::Fader;
use crate::time::{MICROS_PER_SEC, TimeSource, secs_to_micros};
use crate::types::FaderError;

impl<'t, O: ChannelOutput, T: TimeSource, const N: usize, const Q: usize> Fader<'t, O, T, N, Q> {
    /// Half of `seconds` (or of the default duration), never under 1 us.
    fn half_duration(&self, seconds: f64) -> f64 {
        let total = match secs_to_micros(seconds) {
            0 => self.default_duration(),
            micros => micros,
        };
        (total / 2).max(1) as f64 / MICROS_PER_SEC
    }

    fn fade_half(&mut self, levels: [u16; N], seconds: f64, hold: f64, resolved: bool) -> Result<u32, FaderError> {
        let spec = EffectSpec::new(levels).duration(self.half_duration(seconds));
        let uid = self.enqueue(spec, resolved)?;
        if hold > 0.0 {
            self.hold_last(hold, 1.0)?;
        }
        Ok(uid)
    }

    /// Fades to the minimum, or back to the levels saved before the last
    /// blink, holding for `hold` seconds at the end.
    pub fn blink(&mut self, seconds: f64, hold: f64) -> Result<bool, FaderError> {
        if self.effects_queued() > 0 {
            return Ok(false);
        }
        let target = if self.is_min() {
            self.recall(false, false, false)?
        } else {
            self.save(false);
            self.minimums()
        };
        self.fade_half(target, seconds, hold, true)?;
        Ok(true)
    }

    /// Fades to the mirror of the current levels.
    pub fn bounce(&mut self, seconds: f64, hold: f64) -> Result<bool, FaderError> {
        if self.effects_queued() > 0 {
            return Ok(false);
        }
        let target = self.color_inversion();
        self.fade_half(target, seconds, hold, true)?;
        Ok(true)
    }

    /// Fades between two colors: to `second` when showing `first`, to
    /// `first` otherwise.
    pub fn flash(&mut self, first: [u16; N], second: [u16; N], seconds: f64, hold: f64) -> Result<bool, FaderError> {
        if self.effects_queued() > 0 {
            return Ok(false);
        }
        let target = if self.is_color(first) { second } else { first };
        self.fade_half(target, seconds, hold, false)?;
        Ok(true)
    }

    /// Queues red, yellow, green, cyan, blue, magenta as six chained fades
    /// sharing `seconds`. Returns the first and last effect identities.
    pub fn rotate(&mut self, seconds: f64) -> Result<(u32, u32), FaderError> {
        let total = match secs_to_micros(seconds) {
            0 => self.default_duration(),
            micros => micros,
        };
        let segment = (total / 6).max(1) as f64 / MICROS_PER_SEC;

        let mut first = None;
        let mut last = 0;
        for index in 0..3 {
            for levels in [self.primary(index), self.secondary(index)] {
                last = self.enqueue(EffectSpec::new(levels).duration(segment), true)?;
                first.get_or_insert(last);
            }
        }
        Ok((first.unwrap_or(last), last))
    }

    /// Rotates through the colors when the queue is empty.
    pub fn cycle(&mut self, seconds: f64) -> Result<bool, FaderError> {
        if self.effects_queued() > 0 {
            return Ok(false);
        }
        self.rotate(seconds)?;
        Ok(true)
    }

    /// Cancels everything, rotates once and then restores the levels from
    /// before the test.
    pub fn self_test(&mut self, seconds: f64) -> Result<(), FaderError> {
        self.clear_effects(true);
        self.save(true);
        let (first, last) = self.rotate(seconds)?;
        self.enable_snapshot(first, last);
        debug!("self test queued: effects {} to {}", first, last);
        Ok(())
    }
}
