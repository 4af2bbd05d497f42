//! Synchronized multi-channel fades.
//!
//! An [`Effect`] fades every channel to a shared target over a fixed
//! duration, optionally pausing on [`Hold`]s and looping. Effects are built
//! from an [`EffectSpec`] and owned by the [`Fader`](crate::Fader) queue.

use crate::channel::{Channel, ChannelOutput};
use crate::hold::Hold;
use crate::time::{Instant, MAX_DELAY_MICROS};
use crate::types::{EffectState, FaderError, LoopCount};
use heapless::Vec;
use rand::Rng;

/// Maximum number of holds a single effect can carry.
pub const MAX_HOLDS: usize = 4;

/// When an effect should start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartTime {
    /// Seconds after the fader's current clock. Non-positive values start
    /// immediately; longer delays are clamped to
    /// [`MAX_RELATIVE_SECS`](crate::time::MAX_RELATIVE_SECS).
    Relative(f64),

    /// An absolute point on the fader clock.
    Absolute(Instant),
}

/// Parameters for creating an effect.
///
/// ```
/// use led_fader::{EffectSpec, LoopCount};
///
/// let spec = EffectSpec::new([255, 0, 0])
///     .duration(1.5)
///     .delay(0.25)
///     .loop_count(LoopCount::Finite(2));
/// assert_eq!(spec.target, [255, 0, 0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSpec<const N: usize> {
    /// Raw target levels; scale, offset and bounds are applied on creation.
    pub target: [u16; N],
    /// Fade length in seconds. Zero uses the fader's default duration.
    pub duration: f64,
    /// Restore the levels from before the effect once it is destroyed.
    pub recall: bool,
    pub start: StartTime,
    /// Bound, in seconds, of the random start offset.
    pub start_jitter: f64,
    /// Bound, in seconds, of the random duration offset.
    pub duration_jitter: f64,
    /// Identity to assign; `None` lets the fader pick one.
    pub uid: Option<u32>,
    /// Retime a queued, not yet active effect with the same `uid` instead of
    /// creating a new one.
    pub update_existing: bool,
    pub loop_count: LoopCount,
    /// Push the start past a clock rollover rather than straddle it.
    pub defer_on_rollover: bool,
}

impl<const N: usize> EffectSpec<N> {
    /// An immediate fade to `target` using the default duration.
    pub fn new(target: [u16; N]) -> Self {
        Self {
            target,
            duration: 0.0,
            recall: false,
            start: StartTime::Relative(0.0),
            start_jitter: 0.0,
            duration_jitter: 0.0,
            uid: None,
            update_existing: false,
            loop_count: LoopCount::default(),
            defer_on_rollover: true,
        }
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn recall(mut self, recall: bool) -> Self {
        self.recall = recall;
        self
    }

    /// Starts `seconds` after the current clock.
    pub fn delay(mut self, seconds: f64) -> Self {
        self.start = StartTime::Relative(seconds);
        self
    }

    /// Starts at an absolute clock value.
    pub fn at(mut self, start: Instant) -> Self {
        self.start = StartTime::Absolute(start);
        self
    }

    pub fn start_jitter(mut self, seconds: f64) -> Self {
        self.start_jitter = seconds;
        self
    }

    pub fn duration_jitter(mut self, seconds: f64) -> Self {
        self.duration_jitter = seconds;
        self
    }

    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn update_existing(mut self, update: bool) -> Self {
        self.update_existing = update;
        self
    }

    pub fn loop_count(mut self, count: LoopCount) -> Self {
        self.loop_count = count;
        self
    }

    pub fn defer_on_rollover(mut self, defer: bool) -> Self {
        self.defer_on_rollover = defer;
        self
    }
}

/// One coordinated fade across all `N` channels.
///
/// Invariant: once activated with a non-zero delta, `step_length >= 1`.
#[derive(Debug, Clone)]
pub struct Effect<const N: usize> {
    target: [u16; N],
    start: Instant,
    end: Instant,
    last: Instant,
    duration: u32,
    uid: u32,
    loop_count: LoopCount,
    recall: bool,
    defer_on_rollover: bool,
    active: bool,
    aborted: bool,
    cancelled: bool,
    finished: bool,
    holds: Vec<Hold, MAX_HOLDS>,
    secondary_holds: Vec<Hold, MAX_HOLDS>,
    step_length: u32,
    steps_remaining: u32,
    total_steps: u32,
}

impl<const N: usize> Effect<N> {
    /// Creates a pending effect.
    ///
    /// `target` must already be resolved against the channels' transforms
    /// and bounds. A zero `duration` is raised to one microsecond.
    pub fn new(
        target: [u16; N],
        start: Instant,
        duration: u32,
        now: Instant,
        uid: u32,
        loop_count: LoopCount,
        recall: bool,
    ) -> Self {
        let duration = duration.max(1);
        Self {
            target,
            start,
            end: start.wrapping_add(duration),
            last: now,
            duration,
            uid,
            loop_count,
            recall,
            defer_on_rollover: true,
            active: false,
            aborted: false,
            cancelled: false,
            finished: false,
            holds: Vec::new(),
            secondary_holds: Vec::new(),
            step_length: 1,
            steps_remaining: 0,
            total_steps: 0,
        }
    }

    pub(crate) fn set_defer_on_rollover(&mut self, defer: bool) {
        self.defer_on_rollover = defer;
    }

    /// Moves the start past a clock rollover if `[start, end]` straddles it.
    pub fn defer(&mut self) {
        if self.defer_on_rollover && self.end < self.start {
            self.start = Instant(1);
            self.end = self.start.wrapping_add(self.duration);
            debug!("effect {} deferred past clock rollover", self.uid);
        }
    }

    /// Shifts a pending effect's schedule by `delta` microseconds.
    pub fn adjust(&mut self, delta: i64) {
        if self.active {
            return;
        }
        self.start = self.start.wrapping_offset(delta);
        self.end = self.end.wrapping_offset(delta);
        self.last = self.last.wrapping_offset(delta);
        self.defer();
    }

    /// Retimes a pending effect. Active effects are left alone.
    pub fn update_timers(&mut self, duration: u32, start: Instant) {
        if self.active {
            return;
        }
        self.duration = duration.max(1);
        self.start = start;
        self.end = start.wrapping_add(self.duration);
        self.defer();
    }

    /// Draws a uniform offset in `(-boundary, boundary)`.
    fn variance(boundary: u32, rng: &mut impl Rng) -> i64 {
        if boundary <= 1 {
            return 0;
        }
        let boundary = boundary as i64;
        rng.random_range(-boundary + 1..boundary)
    }

    /// Randomly shifts the start by less than `boundary` microseconds.
    ///
    /// The shift is discarded if it would move the start before `now`, or
    /// further ahead than [`MAX_DELAY_MICROS`].
    pub fn vary_start(&mut self, boundary: u32, now: Instant, rng: &mut impl Rng) {
        let variance = Self::variance(boundary, rng);
        if variance == 0 {
            return;
        }
        let now = now.as_micros() as i64;
        let shifted = self.start.as_micros() as i64 + variance;
        if shifted >= now
            && shifted - now <= MAX_DELAY_MICROS as i64
            && shifted <= u32::MAX as i64
        {
            self.start = Instant(shifted as u32);
            self.end = self.end.wrapping_offset(variance);
        }
    }

    /// Randomly lengthens or shortens the duration by less than `boundary`
    /// microseconds, never below one microsecond.
    pub fn vary_duration(&mut self, boundary: u32, rng: &mut impl Rng) {
        let variance = Self::variance(boundary, rng);
        let varied = self.duration as i64 + variance;
        if variance != 0 && varied >= 1 && varied <= u32::MAX as i64 {
            self.duration = varied as u32;
        }
        self.end = self.start.wrapping_add(self.duration);
    }

    /// Adds a hold. Holds added to an active effect are armed immediately.
    pub fn add_hold(&mut self, mut hold: Hold) -> Result<(), FaderError> {
        if self.active {
            hold.init(self.total_steps);
        }
        self.holds
            .push(hold)
            .map_err(|_| FaderError::HoldCapacityExceeded)
    }

    /// Drops the front hold, releasing a pause in progress.
    pub fn resume(&mut self) {
        if !self.holds.is_empty() {
            self.holds.remove(0);
        }
    }

    /// Drops every hold, including those kept for later loop iterations.
    pub fn clear_holds(&mut self) {
        self.holds.clear();
        self.secondary_holds.clear();
    }

    /// Whether the effect is finished: cancelled, or every channel is at the
    /// target with no holds left.
    pub fn is_complete<O: ChannelOutput>(&self, channels: &[Channel<O>; N]) -> bool {
        if self.aborted {
            return true;
        }
        self.holds.is_empty() && self.target_reached(channels)
    }

    pub fn target_reached<O: ChannelOutput>(&self, channels: &[Channel<O>; N]) -> bool {
        channels
            .iter()
            .zip(self.target.iter())
            .all(|(channel, &target)| channel.value() == target)
    }

    /// Aborts the effect and stops it from looping. The fader retires it on
    /// the next passes.
    pub fn cancel(&mut self) {
        self.aborted = true;
        self.active = true;
        self.cancelled = true;
    }

    /// Pushes the target into the channels and derives the step schedule.
    pub fn activate<O: ChannelOutput>(&mut self, now: Instant, channels: &mut [Channel<O>; N]) {
        self.active = true;
        self.finished = false;
        for (channel, target) in channels.iter_mut().zip(self.target.iter_mut()) {
            channel.retarget(*target);
            *target = channel.target();
        }

        let steps = channels
            .iter_mut()
            .map(|channel| channel.update_delta())
            .max()
            .unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.calculate(steps);
        }
        self.total_steps = steps;
        self.steps_remaining = steps;
        self.aborted = steps == 0;
        if steps == 0 {
            debug!("effect {} activated with nothing to fade", self.uid);
            return;
        }

        self.start = now;
        self.end = now.wrapping_add(self.duration);
        self.last = now;
        self.step_length = (self.duration / steps).max(1);

        for hold in self.holds.iter_mut() {
            hold.init(steps);
        }
        while !self.secondary_holds.is_empty() {
            let mut hold = self.secondary_holds.remove(0);
            hold.init(steps);
            if self.holds.push(hold).is_err() {
                break;
            }
        }
        self.secondary_holds.clear();

        debug!(
            "effect {} active at {}: {} steps of {} us",
            self.uid,
            now.as_micros(),
            steps,
            self.step_length
        );
    }

    /// Retires finished holds, then processes the new front hold; returns
    /// whether it is freezing the effect.
    fn holding(&mut self, now: Instant) -> bool {
        while self.holds.first().is_some_and(Hold::is_complete) {
            let done = self.holds.remove(0);
            if self.loop_count.repeats() {
                let _ = self.secondary_holds.push(done);
            }
        }
        let Some(front) = self.holds.first_mut() else {
            return false;
        };
        let holding = front.step(self.steps_remaining, now);
        // Time spent paused does not count toward the fade.
        if holding || front.is_complete() {
            self.last = now;
        }
        holding
    }

    /// Takes as many steps as the elapsed time allows.
    ///
    /// Steps never run past a pending hold's threshold, so the hold fires
    /// at exactly its completion point. On the final step any channel that
    /// is still short of the target is snapped onto it.
    pub fn step<O: ChannelOutput>(&mut self, now: Instant, channels: &mut [Channel<O>; N]) {
        if self.holding(now) || self.steps_remaining == 0 {
            return;
        }
        let elapsed = now.micros_since(self.last);
        if elapsed == 0 {
            return;
        }

        let mut iterations = (elapsed / self.step_length).min(self.steps_remaining);
        if let Some(hold) = self.holds.first() {
            if hold.is_pending() {
                let headroom = self.steps_remaining.saturating_sub(hold.threshold());
                iterations = iterations.min(headroom);
            }
        }
        if iterations == 0 {
            return;
        }

        for _ in 0..iterations {
            self.steps_remaining -= 1;
            for channel in channels.iter_mut() {
                channel.step();
            }
        }
        if self.steps_remaining == 0 {
            for channel in channels.iter_mut() {
                channel.finish();
            }
        }
        self.last = self.last.wrapping_add(iterations * self.step_length);
        trace!(
            "effect {} stepped {} ({} left)",
            self.uid,
            iterations,
            self.steps_remaining
        );
    }

    /// Per-tick entry point.
    ///
    /// Returns `true` on the tick the effect activates.
    pub fn run<O: ChannelOutput>(&mut self, now: Instant, channels: &mut [Channel<O>; N]) -> bool {
        if self.active {
            if self.is_complete(channels) {
                self.active = false;
                self.finished = true;
                self.last = now;
            } else {
                self.step(now, channels);
            }
            false
        } else if now.has_reached(self.start) || (now < self.last && now < self.start) {
            self.activate(now, channels);
            true
        } else {
            false
        }
    }

    /// Resets a completed effect for another pass under a new identity.
    pub(crate) fn requeue(&mut self, now: Instant, uid: u32) {
        self.aborted = false;
        self.finished = false;
        self.last = now;
        self.start = now;
        self.end = now.wrapping_add(self.duration);
        self.uid = uid;
        self.loop_count = self.loop_count.decrement();
    }

    pub(crate) fn retarget(&mut self, target: [u16; N]) {
        self.target = target;
    }

    pub fn state(&self) -> EffectState {
        if self.aborted {
            EffectState::Aborted
        } else if self.active {
            EffectState::Active
        } else if self.finished {
            EffectState::Complete
        } else {
            EffectState::Pending
        }
    }

    pub fn target(&self) -> [u16; N] {
        self.target
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    /// Fade length in microseconds.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    /// Whether prior levels are restored when the effect is destroyed.
    pub fn recalls(&self) -> bool {
        self.recall
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Holds not yet consumed this pass.
    pub fn holds(&self) -> &[Hold] {
        &self.holds
    }

    /// Microseconds budgeted per discrete step.
    pub fn step_length(&self) -> u32 {
        self.step_length
    }

    pub fn steps_remaining(&self) -> u32 {
        self.steps_remaining
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }
}
