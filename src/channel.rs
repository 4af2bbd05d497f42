//! A single PWM output channel and its interpolation state.
//!
//! Provides [`Channel`], which owns one output's level, target, bounds and
//! affine input transform, and steps toward its target one unit at a time.
//! Also defines the [`ChannelOutput`] trait for hardware abstraction.

/// Resolution used when the requested one is outside 1-15 bits.
pub const DEFAULT_RESOLUTION: u8 = 8;

/// Source clock the PWM frequency ceiling is derived from.
pub const BASE_CLOCK_HZ: u32 = 80_000_000;

/// Trait for abstracting one PWM output.
///
/// Implement this for your hardware (LEDC channel, timer compare register,
/// etc.) so a [`Channel`] can drive it.
pub trait ChannelOutput {
    /// Binds the output at the given frequency and bit resolution.
    ///
    /// Called once when the owning channel is constructed, with values already
    /// normalized to the valid range.
    fn attach(&mut self, _frequency: u32, _resolution: u8) {}

    /// Writes a raw level, `0..=2^resolution - 1`.
    ///
    /// Polarity inversion has already been applied. This method cannot fail;
    /// handle hardware errors internally.
    fn write_level(&mut self, level: u16);

    /// Releases the output. Called when the channel is dropped.
    fn detach(&mut self) {}
}

/// One output channel.
///
/// Invariant: `minimum <= value <= maximum <= absolute_maximum`, and the same
/// bounds hold for `target`.
#[derive(Debug)]
pub struct Channel<O: ChannelOutput> {
    output: O,
    resolution: u8,
    frequency: u32,
    value: u16,
    target: u16,
    minimum: u16,
    maximum: u16,
    absolute_maximum: u16,
    scale: f32,
    offset: i16,
    last: u16,
    delta: u32,
    // Bresenham accumulator: each step adds `delta`, and the emitted count is
    // `accumulated / divisor`.
    divisor: u32,
    accumulated: u64,
    last_rounded: u32,
    inverted: bool,
}

impl<O: ChannelOutput> Channel<O> {
    /// Creates a channel at full scale and attaches its output. Nothing is
    /// written until the owner drives the level.
    ///
    /// `resolution` outside 1-15 falls back to [`DEFAULT_RESOLUTION`].
    /// `frequency` of zero, or above `BASE_CLOCK_HZ >> resolution`, falls back
    /// to that ceiling.
    pub fn new(mut output: O, resolution: u8, frequency: u32) -> Self {
        let resolution = if (1..=15).contains(&resolution) {
            resolution
        } else {
            DEFAULT_RESOLUTION
        };
        let max_frequency = BASE_CLOCK_HZ >> resolution;
        let frequency = if frequency == 0 || frequency > max_frequency {
            max_frequency
        } else {
            frequency
        };
        output.attach(frequency, resolution);

        let absolute_maximum = ((1u32 << resolution) - 1) as u16;
        let mut channel = Self {
            output,
            resolution,
            frequency,
            value: 0,
            target: 0,
            minimum: 0,
            maximum: absolute_maximum,
            absolute_maximum,
            scale: 1.0,
            offset: 0,
            last: 0,
            delta: 0,
            divisor: 0,
            accumulated: 0,
            last_rounded: 0,
            inverted: false,
        };
        channel.set(absolute_maximum, false);
        channel.target = channel.value;
        channel.save();
        channel
    }

    /// Pushes the current level to the output, honoring polarity.
    pub fn write(&mut self) {
        let level = if self.inverted {
            self.inversion_of(self.value)
        } else {
            self.value
        };
        self.output.write_level(level);
    }

    /// Clamps a level to the soft bounds.
    #[inline]
    pub fn conform(&self, level: u16) -> u16 {
        level.clamp(self.minimum, self.maximum)
    }

    fn conform_wide(&self, level: i32) -> u16 {
        level.clamp(self.minimum as i32, self.maximum as i32) as u16
    }

    /// Applies `scale` and `offset` to a raw input, then clamps.
    pub fn resolve(&self, raw: u16) -> u16 {
        let scaled = (raw as f32 * self.scale) as i32;
        self.conform_wide(scaled.saturating_add(self.offset as i32))
    }

    /// Sets the level from a raw input; writes the output when `immediate`.
    pub fn set(&mut self, raw: u16, immediate: bool) {
        self.value = self.resolve(raw);
        if immediate {
            self.write();
        }
    }

    /// Sets the fade target from a raw input.
    pub fn set_target(&mut self, raw: u16) {
        self.target = self.resolve(raw);
    }

    /// Sets the fade target to an already-resolved level.
    pub(crate) fn retarget(&mut self, level: u16) {
        self.target = self.conform(level);
    }

    /// Jumps straight to an already-resolved level, cancelling any fade.
    pub fn restore(&mut self, level: u16, immediate: bool) {
        self.value = self.conform(level);
        self.target = self.value;
        if immediate {
            self.write();
        }
    }

    /// Moves the level by `by` units (no scale/offset), clamped to bounds.
    pub fn increment(&mut self, by: i32, immediate: bool) {
        self.value = self.conform_wide((self.value as i32).saturating_add(by));
        if immediate {
            self.write();
        }
    }

    /// Saves the current level for a later [`recall`](Self::recall).
    pub fn save(&mut self) {
        self.last = self.value;
    }

    /// Restores the saved level and makes it the target.
    pub fn recall(&mut self, immediate: bool) -> u16 {
        self.restore(self.last, immediate);
        self.value
    }

    /// Whether the channel has not yet reached its target.
    #[inline]
    pub fn fading(&self) -> bool {
        self.value != self.target
    }

    /// Recomputes `|value - target|` and returns it.
    pub fn update_delta(&mut self) -> u32 {
        self.delta = (self.value as i32 - self.target as i32).unsigned_abs();
        self.delta
    }

    /// Prepares stepping so the current delta is covered in exactly
    /// `num_steps` calls to [`step`](Self::step).
    ///
    /// `num_steps` must be at least the delta of every channel taking part in
    /// the fade (the owning effect passes the maximum delta), so no single
    /// step moves more than one unit. Zero disables stepping.
    pub fn calculate(&mut self, num_steps: u32) {
        self.divisor = num_steps;
        self.accumulated = 0;
        self.last_rounded = 0;
    }

    /// Takes one interpolation step toward the target.
    ///
    /// Moves by one unit only when the accumulated fraction crosses the next
    /// integer, so the channel lands on its target on exactly the last of the
    /// `num_steps` steps with no rounding drift.
    pub fn step(&mut self) {
        if !self.fading() || self.divisor == 0 {
            return;
        }
        let full = self.delta as u64 * self.divisor as u64;
        if self.accumulated < full {
            self.accumulated += self.delta as u64;
        }
        let rounded = (self.accumulated / self.divisor as u64) as u32;
        if rounded > self.last_rounded {
            self.step_toward();
            self.write();
        }
        self.last_rounded = rounded;
    }

    /// Moves one unit toward the target without writing.
    fn step_toward(&mut self) {
        if self.value > self.target {
            self.value -= 1;
        } else if self.value < self.target {
            self.value += 1;
        }
    }

    /// Snaps to the target and writes.
    pub(crate) fn finish(&mut self) {
        if self.fading() {
            self.value = self.target;
            self.write();
        }
    }

    /// Sets the soft maximum, clamped to the hardware range.
    ///
    /// The minimum is lowered if needed, and the level and target are pulled
    /// back inside the new bounds.
    pub fn set_max(&mut self, level: u16) {
        self.maximum = level.min(self.absolute_maximum);
        self.minimum = self.minimum.min(self.maximum);
        self.reconform();
    }

    /// Sets the soft minimum, clamped to the current maximum.
    pub fn set_min(&mut self, level: u16) {
        self.minimum = level.min(self.maximum);
        self.reconform();
    }

    fn reconform(&mut self) {
        self.target = self.conform(self.target);
        let value = self.conform(self.value);
        if value != self.value {
            self.value = value;
            self.write();
        }
    }

    /// Sets the input scale factor used by [`resolve`](Self::resolve).
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    /// Sets the input offset used by [`resolve`](Self::resolve).
    pub fn set_offset(&mut self, offset: i16) {
        self.offset = offset;
    }

    /// Sets output polarity. Takes effect on the next write.
    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    /// Mirror of `level` within the hardware range.
    #[inline]
    pub fn inversion_of(&self, level: u16) -> u16 {
        self.absolute_maximum - level.min(self.absolute_maximum)
    }

    /// Mirror of the current level within the hardware range.
    #[inline]
    pub fn inversion(&self) -> u16 {
        self.inversion_of(self.value)
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn target(&self) -> u16 {
        self.target
    }

    pub fn minimum(&self) -> u16 {
        self.minimum
    }

    pub fn maximum(&self) -> u16 {
        self.maximum
    }

    pub fn absolute_maximum(&self) -> u16 {
        self.absolute_maximum
    }

    /// Level stored by the last [`save`](Self::save).
    pub fn saved(&self) -> u16 {
        self.last
    }

    pub fn delta(&self) -> u32 {
        self.delta
    }

    /// Current step size as 16.16 fixed point units per step.
    pub fn step_size(&self) -> u32 {
        if self.divisor == 0 {
            return 0;
        }
        (((self.delta as u64) << 16) / self.divisor as u64) as u32
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Borrows the underlying output.
    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: ChannelOutput> Drop for Channel<O> {
    fn drop(&mut self) {
        self.output.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Debug, Default)]
    struct MockOutput {
        attached: Option<(u32, u8)>,
        writes: Vec<u16, 512>,
    }

    impl ChannelOutput for MockOutput {
        fn attach(&mut self, frequency: u32, resolution: u8) {
            self.attached = Some((frequency, resolution));
        }

        fn write_level(&mut self, level: u16) {
            let _ = self.writes.push(level);
        }
    }

    fn channel(resolution: u8) -> Channel<MockOutput> {
        Channel::new(MockOutput::default(), resolution, 0)
    }

    #[test]
    fn construction_starts_at_full_scale_without_writing() {
        let ch = channel(8);
        assert_eq!(ch.value(), 255);
        assert_eq!(ch.target(), 255);
        assert_eq!(ch.saved(), 255);
        assert!(ch.output().writes.is_empty());
        assert_eq!(ch.output().attached, Some((80_000_000 >> 8, 8)));
    }

    #[test]
    fn invalid_resolution_falls_back_to_eight_bits() {
        assert_eq!(channel(0).resolution(), 8);
        assert_eq!(channel(16).absolute_maximum(), 255);
        assert_eq!(channel(10).absolute_maximum(), 1023);
    }

    #[test]
    fn out_of_range_frequency_falls_back_to_ceiling() {
        let ch = Channel::new(MockOutput::default(), 12, 1_000_000);
        assert_eq!(ch.frequency(), 80_000_000 >> 12);
        let ch = Channel::new(MockOutput::default(), 12, 5_000);
        assert_eq!(ch.frequency(), 5_000);
    }

    #[test]
    fn set_applies_scale_offset_and_bounds() {
        let mut ch = channel(8);
        ch.set_scale(2.0);
        ch.set_offset(10);
        ch.set(50, false);
        assert_eq!(ch.value(), 110);
        ch.set(200, false);
        assert_eq!(ch.value(), 255);

        ch.set_scale(1.0);
        ch.set_offset(-20);
        ch.set(5, false);
        assert_eq!(ch.value(), 0);
    }

    #[test]
    fn bounds_stay_ordered_and_pull_value_inside() {
        let mut ch = channel(8);
        ch.set_max(100);
        assert_eq!(ch.value(), 100);
        ch.set_min(150);
        assert_eq!(ch.minimum(), 100);
        ch.set_max(50);
        assert_eq!(ch.minimum(), 50);
        assert_eq!(ch.maximum(), 50);
        assert_eq!(ch.value(), 50);
        ch.set_max(1000);
        assert_eq!(ch.maximum(), 255);
    }

    #[test]
    fn step_lands_exactly_on_target_after_num_steps() {
        let mut ch = channel(8);
        ch.restore(0, false);
        ch.retarget(77);
        assert_eq!(ch.update_delta(), 77);
        ch.calculate(200);
        for i in 0..200 {
            assert!(ch.fading(), "arrived early at step {}", i);
            ch.step();
        }
        assert_eq!(ch.value(), 77);
        assert!(!ch.fading());
    }

    #[test]
    fn step_moves_downward() {
        let mut ch = channel(8);
        ch.retarget(200);
        ch.update_delta();
        ch.calculate(55);
        for _ in 0..55 {
            ch.step();
        }
        assert_eq!(ch.value(), 200);
    }

    #[test]
    fn zero_steps_disables_stepping() {
        let mut ch = channel(8);
        ch.retarget(0);
        ch.update_delta();
        ch.calculate(0);
        ch.step();
        assert_eq!(ch.value(), 255);
        assert_eq!(ch.step_size(), 0);
        ch.finish();
        assert_eq!(ch.value(), 0);
    }

    #[test]
    fn save_and_recall_round_trip() {
        let mut ch = channel(8);
        ch.restore(42, true);
        ch.save();
        ch.restore(7, true);
        ch.retarget(100);
        assert_eq!(ch.recall(true), 42);
        assert_eq!(ch.target(), 42);
        assert_eq!(ch.output().writes.last(), Some(&42));
    }

    #[test]
    fn inverted_polarity_mirrors_written_level() {
        let mut ch = channel(8);
        ch.set_inverted(true);
        ch.restore(55, true);
        assert_eq!(ch.value(), 55);
        assert_eq!(ch.output().writes.last(), Some(&200));
    }

    #[test]
    fn step_size_reports_fixed_point_fraction() {
        let mut ch = channel(8);
        ch.retarget(127);
        ch.update_delta();
        ch.calculate(256);
        assert_eq!(ch.step_size(), (128u32 << 16) / 256);
    }
}
