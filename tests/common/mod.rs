//! Shared test infrastructure for led-fader integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use core::cell::Cell;
use led_fader::{ChannelOutput, Fader, FaderConfig, Instant, TimeSource};

// ============================================================================
// Mock Output
// ============================================================================

/// Mock PWM output that records every written level
#[derive(Debug, Default)]
pub struct MockOutput {
    attached: Option<(u32, u8)>,
    writes: Vec<u16>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> &[u16] {
        &self.writes
    }

    pub fn last_write(&self) -> Option<u16> {
        self.writes.last().copied()
    }

    pub fn attached(&self) -> Option<(u32, u8)> {
        self.attached
    }
}

impl ChannelOutput for MockOutput {
    fn attach(&mut self, frequency: u32, resolution: u8) {
        self.attached = Some((frequency, resolution));
    }

    fn write_level(&mut self, level: u16) {
        self.writes.push(level);
    }
}

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock microsecond counter with controllable advancement
pub struct MockClock {
    micros: Cell<u32>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            micros: Cell::new(0),
        }
    }

    /// Advance by `micros`, wrapping like a hardware counter
    pub fn advance(&self, micros: u32) {
        self.micros.set(self.micros.get().wrapping_add(micros));
    }

    pub fn set(&self, micros: u32) {
        self.micros.set(micros);
    }
}

impl TimeSource for MockClock {
    fn now(&self) -> Instant {
        Instant(self.micros.get())
    }
}

// ============================================================================
// Test Helper Functions
// ============================================================================

pub type TestFader<'t, const Q: usize> = Fader<'t, MockOutput, MockClock, 3, Q>;

/// Three 8-bit channels starting dark
pub fn dark_fader<const Q: usize>(clock: &MockClock) -> TestFader<'_, Q> {
    Fader::new(
        [MockOutput::new(), MockOutput::new(), MockOutput::new()],
        clock,
        FaderConfig::default().on(false),
    )
}

/// Advance the clock by `step` and tick, `ticks` times
pub fn tick<const Q: usize>(fader: &mut TestFader<'_, Q>, clock: &MockClock, step: u32, ticks: u32) {
    for _ in 0..ticks {
        clock.advance(step);
        fader.run();
    }
}

/// Tick in `step` increments until the queue drains; returns the tick count
pub fn run_until_idle<const Q: usize>(
    fader: &mut TestFader<'_, Q>,
    clock: &MockClock,
    step: u32,
    limit: u32,
) -> u32 {
    for n in 1..=limit {
        clock.advance(step);
        fader.run();
        if fader.effects_queued() == 0 {
            return n;
        }
    }
    panic!("queue still busy after {} ticks", limit);
}

/// Total writes across all channels
pub fn write_count<const Q: usize>(fader: &TestFader<'_, Q>) -> usize {
    fader
        .channels()
        .iter()
        .map(|channel| channel.output().writes().len())
        .sum()
}
