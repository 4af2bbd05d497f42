//! Color helpers for RGB and RGBx faders.
//!
//! Converts between `palette::Srgb` (0.0-1.0 per component) and channel
//! levels. The first three channels are red, green and blue; any further
//! channels (white, amber) are left at their minimum. Conversions are
//! relative to each channel's soft maximum, so a dimmed fader maps white to
//! its dimmed ceiling.

use crate::channel::ChannelOutput;
use crate::effect::EffectSpec;
use crate::fader::Fader;
use crate::time::TimeSource;
use crate::types::FaderError;
use core::array;
use palette::{FromColor, Hsv, Srgb};

pub const BLACK: Srgb = Srgb::new(0.0, 0.0, 0.0);
pub const WHITE: Srgb = Srgb::new(1.0, 1.0, 1.0);
pub const RED: Srgb = Srgb::new(1.0, 0.0, 0.0);
pub const GREEN: Srgb = Srgb::new(0.0, 1.0, 0.0);
pub const BLUE: Srgb = Srgb::new(0.0, 0.0, 1.0);

/// Creates an RGB color from HSV (Hue, Saturation, Value) components.
#[inline]
pub fn hsv(hue: f32, saturation: f32, value: f32) -> Srgb {
    Srgb::from_color(Hsv::new(hue, saturation, value))
}

/// Creates an RGB color from hue only (full saturation and value).
#[inline]
pub fn hue(hue: f32) -> Srgb {
    hsv(hue, 1.0, 1.0)
}

fn component(color: Srgb, channel: usize) -> Option<f32> {
    match channel {
        0 => Some(color.red),
        1 => Some(color.green),
        2 => Some(color.blue),
        _ => None,
    }
}

impl<'t, O: ChannelOutput, T: TimeSource, const N: usize, const Q: usize> Fader<'t, O, T, N, Q> {
    /// Levels that show `color`, scaled to each channel's soft maximum.
    pub fn levels_from_srgb(&self, color: Srgb) -> [u16; N] {
        let channels = self.channels();
        array::from_fn(|i| {
            let channel = &channels[i];
            match component(color, i) {
                Some(c) => {
                    let level = (c.clamp(0.0, 1.0) * channel.maximum() as f32 + 0.5) as u16;
                    channel.conform(level)
                }
                None => channel.minimum(),
            }
        })
    }

    /// The current levels of the first three channels as a color.
    pub fn current_srgb(&self) -> Srgb {
        let channels = self.channels();
        let share = |i: usize| {
            channels.get(i).map_or(0.0, |channel| {
                if channel.maximum() == 0 {
                    0.0
                } else {
                    channel.value() as f32 / channel.maximum() as f32
                }
            })
        };
        Srgb::new(share(0), share(1), share(2))
    }

    /// Queues a fade to `color`.
    pub fn fade_to_srgb(&mut self, color: Srgb, seconds: f64) -> Result<u32, FaderError> {
        let levels = self.levels_from_srgb(color);
        self.enqueue(EffectSpec::new(levels).duration(seconds), true)
    }

    /// One primary color (0 red, 1 green, 2 blue) at full soft maximum.
    pub fn primary(&self, index: usize) -> [u16; N] {
        let maximums = self.maximums();
        let lit = index % 3;
        array::from_fn(|i| if i == lit { maximums[i] } else { 0 })
    }

    /// The secondary color following primary `index` (0 yellow, 1 cyan,
    /// 2 magenta).
    pub fn secondary(&self, index: usize) -> [u16; N] {
        let maximums = self.maximums();
        let first = index % 3;
        let second = (first + 1) % 3;
        array::from_fn(|i| {
            if i == first || i == second {
                maximums[i]
            } else {
                0
            }
        })
    }
}
