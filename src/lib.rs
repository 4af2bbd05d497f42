#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`Fader`**: Owns `N` channels, a bounded effect queue and a logical clock; ticked with `run()`
//! - **`Channel`**: One output's level, target, bounds and drift-free integer stepping
//! - **`ChannelOutput`**: Trait to implement for your PWM hardware
//! - **`TimeSource`**: Trait to implement for your microsecond counter
//! - **`Effect`**: A synchronized fade of every channel to a shared target
//! - **`EffectSpec`**: Builder describing an effect (duration, delay, jitter, looping, identity)
//! - **`Hold`**: A timed pause at a completion point inside an effect
//! - **`LoopCount`**: How many extra passes an effect makes (`Finite(n)` or `Infinite`)
//! - **`FaderCommand`**: Plain-data commands for controlling a fader from another context
//!
//! Levels are raw PWM units, `0..2^resolution`. The `colors` module converts
//! `Srgb<f32>` values into levels for RGB and RGBx outputs.

#[macro_use]
mod fmt;

// Re-export Srgb from palette for user convenience
pub use palette::Srgb;

pub mod channel;
pub mod colors;
pub mod command;
pub mod effect;
pub mod fader;
pub mod hold;
mod patterns;
pub mod snapshot;
pub mod time;
pub mod types;

pub use channel::{Channel, ChannelOutput};
pub use command::FaderCommand;
pub use effect::{Effect, EffectSpec, MAX_HOLDS, StartTime};
pub use fader::{Fader, FaderConfig, FaderStatus};
pub use hold::Hold;
pub use snapshot::Snapshot;
pub use time::{Instant, TimeSource};
pub use types::{EffectState, FaderError, HoldState, LoopCount};
