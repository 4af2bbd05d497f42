//! Core types shared by effects and the fader.

/// How many additional passes an effect makes after its first fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopCount {
    /// Repeat this many more times. `Finite(0)` is a one-shot effect.
    Finite(u32),

    /// Repeat until cancelled.
    Infinite,
}

impl LoopCount {
    /// Whether the effect should be requeued after completing.
    #[inline]
    pub fn repeats(self) -> bool {
        !matches!(self, LoopCount::Finite(0))
    }

    /// Count after one completed pass.
    #[inline]
    pub fn decrement(self) -> Self {
        match self {
            LoopCount::Finite(n) => LoopCount::Finite(n.saturating_sub(1)),
            LoopCount::Infinite => LoopCount::Infinite,
        }
    }
}

impl Default for LoopCount {
    fn default() -> Self {
        LoopCount::Finite(0)
    }
}

impl From<i32> for LoopCount {
    /// Negative values mean "forever", matching the usual `-1` convention.
    fn from(count: i32) -> Self {
        if count < 0 {
            LoopCount::Infinite
        } else {
            LoopCount::Finite(count as u32)
        }
    }
}

/// Lifecycle of an [`Effect`](crate::Effect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EffectState {
    /// Queued, waiting for its start time.
    Pending,

    /// Stepping channels toward the target (or holding).
    Active,

    /// Fade finished; waiting for the fader to retire or requeue it.
    Complete,

    /// Cancelled, or activated with nothing to do.
    Aborted,
}

/// Lifecycle of a [`Hold`](crate::Hold).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HoldState {
    /// Waiting for the effect to reach the hold's threshold.
    Pending,

    /// Freezing the owning effect while the countdown runs.
    Active,

    /// Countdown elapsed.
    Complete,
}

/// Fader operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaderError {
    /// The effect queue is at capacity.
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The effect already carries the maximum number of holds.
    HoldCapacityExceeded,

    /// The operation needs a queued effect and there is none.
    NoEffectQueued,
}

impl core::fmt::Display for FaderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FaderError::QueueFull { capacity } => {
                write!(f, "effect queue full (capacity {})", capacity)
            }
            FaderError::HoldCapacityExceeded => {
                write!(f, "effect hold capacity exceeded")
            }
            FaderError::NoEffectQueued => {
                write!(f, "no effect queued")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FaderError {}
