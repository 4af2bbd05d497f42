//! Wrapping microsecond clock abstraction.

/// Microseconds per second.
pub const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Longest start offset, in microseconds, that [`Instant::has_reached`]
/// can still tell apart from the past.
pub const MAX_DELAY_MICROS: u32 = i32::MAX as u32;

/// [`MAX_DELAY_MICROS`] in seconds.
pub const MAX_RELATIVE_SECS: f64 = MAX_DELAY_MICROS as f64 / MICROS_PER_SEC;

/// Trait for abstracting the hardware microsecond counter.
///
/// Implementations return a free-running counter that is allowed to wrap at
/// `u32::MAX`. The fader only ever looks at differences between readings.
pub trait TimeSource {
    /// Returns the current counter value.
    fn now(&self) -> Instant;
}

/// A point on the wrapping 32-bit microsecond clock.
///
/// Ordering is the plain numeric ordering of the counter; use
/// [`Instant::has_reached`] for comparisons that must survive a rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(pub u32);

impl Instant {
    /// The zero instant.
    pub const ZERO: Self = Instant(0);

    /// Returns the raw counter value.
    #[inline]
    pub const fn as_micros(self) -> u32 {
        self.0
    }

    /// Adds microseconds, wrapping at the 32-bit boundary.
    #[inline]
    pub const fn wrapping_add(self, micros: u32) -> Self {
        Instant(self.0.wrapping_add(micros))
    }

    /// Shifts by a signed number of microseconds, wrapping at the 32-bit boundary.
    #[inline]
    pub const fn wrapping_offset(self, delta: i64) -> Self {
        // Truncation keeps the result correct modulo 2^32.
        Instant(self.0.wrapping_add(delta as u32))
    }

    /// Microseconds elapsed since `earlier`, correct across one rollover.
    #[inline]
    pub const fn micros_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Whether this instant is at or past `other`, treating differences of
    /// less than half the clock range as "not yet reached".
    #[inline]
    pub const fn has_reached(self, other: Self) -> bool {
        (self.0.wrapping_sub(other.0) as i32) >= 0
    }
}

/// Converts seconds to the nearest whole microsecond, saturating into the
/// `u32` range.
///
/// Negative and NaN inputs map to zero.
pub fn secs_to_micros(seconds: f64) -> u32 {
    if seconds.is_nan() || seconds <= 0.0 {
        return 0;
    }
    let micros = seconds * MICROS_PER_SEC;
    if micros >= u32::MAX as f64 {
        u32::MAX
    } else {
        (micros + 0.5) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_to_micros_clamps_range() {
        assert_eq!(secs_to_micros(-1.0), 0);
        assert_eq!(secs_to_micros(f64::NAN), 0);
        assert_eq!(secs_to_micros(0.25), 250_000);
        assert_eq!(secs_to_micros(1e-6), 1);
        assert_eq!(secs_to_micros(0.000_001_6), 2);
        assert_eq!(secs_to_micros(1e12), u32::MAX);
    }

    #[test]
    fn elapsed_survives_rollover() {
        let before = Instant(u32::MAX - 10);
        let after = before.wrapping_add(30);
        assert_eq!(after, Instant(19));
        assert_eq!(after.micros_since(before), 30);
    }

    #[test]
    fn has_reached_uses_half_range() {
        assert!(Instant(100).has_reached(Instant(100)));
        assert!(Instant(101).has_reached(Instant(100)));
        assert!(!Instant(99).has_reached(Instant(100)));
        // Just past the rollover still counts as later.
        assert!(Instant(5).has_reached(Instant(u32::MAX - 5)));
        assert!(!Instant(u32::MAX - 5).has_reached(Instant(5)));
        // The longest accepted delay still reads as ahead.
        assert!(!Instant(0).has_reached(Instant(MAX_DELAY_MICROS)));
        assert!(Instant(0).has_reached(Instant(MAX_DELAY_MICROS + 2)));
    }

    #[test]
    fn signed_offset_moves_both_ways() {
        assert_eq!(Instant(1_000).wrapping_offset(-500), Instant(500));
        assert_eq!(Instant(1_000).wrapping_offset(500), Instant(1_500));
        assert_eq!(Instant(10).wrapping_offset(-20), Instant(u32::MAX - 9));
    }
}
