//! Command-based control for faders.
//!
//! Commands are plain data, so another task or thread can build them and
//! hand them over through any queue (`heapless::spsc`, `std::sync::mpsc`,
//! an RTOS mailbox). The owner of the [`Fader`](crate::Fader) applies them
//! between ticks with [`handle_command`](crate::Fader::handle_command) or
//! [`run_with`](crate::Fader::run_with).

use crate::effect::EffectSpec;
use crate::time::Instant;

/// Actions for controlling a fader.
#[derive(Debug, Clone, PartialEq)]
pub enum FaderCommand<const N: usize> {
    /// Set levels, immediately or as a default-length fade.
    Set { levels: [u16; N], immediate: bool },
    /// Queue an effect.
    CreateEffect(EffectSpec<N>),
    /// Hold the current effect, or every queued effect with `all`.
    Hold { seconds: f64, fraction: f64, all: bool },
    /// Hold the last queued effect.
    HoldLast { seconds: f64, fraction: f64 },
    /// Release the current hold.
    Resume,
    /// Cancel the current effect.
    CancelCurrent,
    /// Drop queued effects.
    ClearEffects { cancel: bool },
    /// Save levels.
    Save { global: bool },
    /// Apply saved levels.
    Recall { global: bool, immediate: bool },
    /// Soft maximum for every channel.
    SetMaximum(u16),
    /// Soft minimum for every channel.
    SetMinimum(u16),
    /// Fade to the mirrored levels.
    Invert,
    /// Arm snapshot save/recall triggers.
    EnableSnapshot { save_uid: u32, recall_uid: u32 },
    /// Synchronize the logical clock.
    SyncClock { at: Instant, adjust: bool },
}

impl<const N: usize> From<EffectSpec<N>> for FaderCommand<N> {
    fn from(spec: EffectSpec<N>) -> Self {
        FaderCommand::CreateEffect(spec)
    }
}
