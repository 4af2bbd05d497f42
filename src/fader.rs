//! Multi-channel fade engine with an effect queue and logical clock.
//!
//! Provides [`Fader`], which owns `N` output channels, a bounded FIFO of
//! [`Effect`]s and a wrapping microsecond clock, and advances everything from
//! a single per-tick [`Fader::run`] call.

use crate::channel::{Channel, ChannelOutput, DEFAULT_RESOLUTION};
use crate::command::FaderCommand;
use crate::effect::{Effect, EffectSpec, MAX_HOLDS, StartTime};
use crate::hold::Hold;
use crate::snapshot::Snapshot;
use crate::time::{Instant, MAX_DELAY_MICROS, TimeSource, secs_to_micros};
use crate::types::{FaderError, LoopCount};
use core::array;
use heapless::Vec;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Construction-time settings for a [`Fader`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaderConfig {
    /// PWM bit depth, 1-15. Anything else falls back to 8.
    pub resolution: u8,
    /// PWM frequency hint in Hz. Zero selects the hardware maximum.
    pub frequency: u32,
    /// Start at full scale (`true`) or at minimum.
    pub on: bool,
    /// Mirror every written level.
    pub inverted: bool,
    /// Fade length, in seconds, for effects created with zero duration.
    pub default_duration: f64,
}

impl Default for FaderConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            frequency: 0,
            on: true,
            inverted: false,
            default_duration: 1e-6,
        }
    }
}

impl FaderConfig {
    pub fn resolution(mut self, bits: u8) -> Self {
        self.resolution = bits;
        self
    }

    pub fn frequency(mut self, hz: u32) -> Self {
        self.frequency = hz;
        self
    }

    pub fn on(mut self, on: bool) -> Self {
        self.on = on;
        self
    }

    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub fn default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = seconds;
        self
    }
}

/// Point-in-time view of a fader, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaderStatus<const N: usize> {
    pub now: Instant,
    pub current: [u16; N],
    pub target: [u16; N],
    pub queued: usize,
    pub active: bool,
    /// Identity and completion time of the last retired effect.
    pub last_completed: Option<(u32, Instant)>,
    /// Scheduled start of the current effect.
    pub next_start: Option<Instant>,
}

/// Drives `N` channels through queued, timed fades.
///
/// The fader must be ticked with [`run`](Self::run) at least as often as the
/// shortest step length in use; each tick advances the logical clock once and
/// lets the current effect (the queue head) activate, step, hold or retire.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `O` - Output implementation type
/// * `T` - Time source implementation type
/// * `N` - Number of channels
/// * `Q` - Effect queue capacity
pub struct Fader<'t, O: ChannelOutput, T: TimeSource, const N: usize, const Q: usize> {
    channels: [Channel<O>; N],
    effects: Vec<Effect<N>, Q>,
    snapshot: Snapshot<N>,
    time_source: &'t T,
    now: Instant,
    time_index: Instant,
    default_duration: u32,
    next_uid: u32,
    last_completed: Option<(u32, Instant)>,
    jitter_draws: u32,
}

impl<'t, O: ChannelOutput, T: TimeSource, const N: usize, const Q: usize> Fader<'t, O, T, N, Q> {
    /// Attaches every output and drives it to full scale or to minimum.
    pub fn new(outputs: [O; N], time_source: &'t T, config: FaderConfig) -> Self {
        let channels = outputs.map(|output| Channel::new(output, config.resolution, config.frequency));
        let default_duration = secs_to_micros(config.default_duration).max(1);
        let mut fader = Self {
            channels,
            effects: Vec::new(),
            snapshot: Snapshot::new(),
            time_source,
            now: Instant::ZERO,
            time_index: Instant::ZERO,
            default_duration,
            next_uid: 1,
            last_completed: None,
            jitter_draws: 0,
        };
        for channel in fader.channels.iter_mut() {
            channel.set_inverted(config.inverted);
        }
        if config.on {
            fader.full(true);
        } else {
            fader.clear(true);
        }
        fader.time_index = time_source.now();
        debug!(
            "fader ready: {} channels at {} bits",
            N as u32,
            fader.resolution()
        );
        fader
    }

    /// Per-tick entry point: advances the clock, then the current effect.
    pub fn run(&mut self) {
        self.update_clock(None, false);
        self.cycle_effects();
    }

    /// Applies `commands` and then ticks once.
    pub fn run_with<I>(&mut self, commands: I) -> Result<(), FaderError>
    where
        I: IntoIterator<Item = FaderCommand<N>>,
    {
        let applied = self.apply_commands(commands);
        self.run();
        applied
    }

    /// Applies every command in order.
    ///
    /// A refused command does not stop the rest; the first error is returned.
    pub fn apply_commands<I>(&mut self, commands: I) -> Result<(), FaderError>
    where
        I: IntoIterator<Item = FaderCommand<N>>,
    {
        let mut result = Ok(());
        for command in commands {
            if let Err(err) = self.handle_command(command) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Handles a command by dispatching to the matching method.
    ///
    /// Returns the identity of the effect the command created, if any.
    pub fn handle_command(&mut self, command: FaderCommand<N>) -> Result<Option<u32>, FaderError> {
        match command {
            FaderCommand::Set { levels, immediate } => {
                self.set(levels, immediate).map(|_| None)
            }
            FaderCommand::CreateEffect(spec) => self.create_effect(spec).map(Some),
            FaderCommand::Hold {
                seconds,
                fraction,
                all,
            } => self.hold(seconds, fraction, all).map(|_| None),
            FaderCommand::HoldLast { seconds, fraction } => {
                self.hold_last(seconds, fraction).map(|_| None)
            }
            FaderCommand::Resume => {
                self.resume();
                Ok(None)
            }
            FaderCommand::CancelCurrent => self.cancel_current_effect().map(|_| None),
            FaderCommand::ClearEffects { cancel } => {
                self.clear_effects(cancel);
                Ok(None)
            }
            FaderCommand::Save { global } => {
                self.save(global);
                Ok(None)
            }
            FaderCommand::Recall { global, immediate } => {
                self.recall(global, true, immediate).map(|_| None)
            }
            FaderCommand::SetMaximum(level) => {
                self.set_maximum(level);
                Ok(None)
            }
            FaderCommand::SetMinimum(level) => {
                self.set_minimum(level);
                Ok(None)
            }
            FaderCommand::Invert => self.invert().map(Some),
            FaderCommand::EnableSnapshot {
                save_uid,
                recall_uid,
            } => {
                self.enable_snapshot(save_uid, recall_uid);
                Ok(None)
            }
            FaderCommand::SyncClock { at, adjust } => {
                self.update_clock(Some(at), adjust);
                Ok(None)
            }
        }
    }

    /// Advances the logical clock and returns whether it wrapped.
    ///
    /// With `explicit` the clock is synchronized to that value; with `adjust`
    /// every effect that has not started yet is shifted by the same amount, so
    /// its schedule relative to the clock is preserved. Without `explicit` the
    /// clock advances by the hardware time elapsed since the previous call.
    pub fn update_clock(&mut self, explicit: Option<Instant>, adjust: bool) -> bool {
        let before = self.now;
        let hardware = self.time_source.now();
        match explicit {
            Some(at) => {
                self.now = at;
                if adjust {
                    let delta = at.as_micros() as i64 - before.as_micros() as i64;
                    for effect in self.effects.iter_mut() {
                        effect.adjust(delta);
                    }
                    debug!("clock synchronized to {}, adjusted {} us", at.as_micros(), delta);
                } else {
                    debug!("clock synchronized to {}", at.as_micros());
                }
            }
            None => {
                self.now = self.now.wrapping_add(hardware.micros_since(self.time_index));
            }
        }
        self.time_index = hardware;

        let rolled_over = self.now < before && !adjust;
        if rolled_over {
            debug!("clock rollover at {}", self.now.as_micros());
        }
        rolled_over
    }

    /// Advances, retires or requeues the current effect.
    pub fn cycle_effects(&mut self) {
        let now = self.now;
        let Some(current) = self.effects.first_mut() else {
            return;
        };

        if current.is_active() || !current.is_complete(&self.channels) {
            let activated = current.run(now, &mut self.channels);
            let uid = current.uid();
            if activated && self.snapshot.should_save(uid) {
                debug!("snapshot saved on activation of effect {}", uid);
                self.save(true);
            }
            return;
        }

        let uid = current.uid();
        self.last_completed = Some((uid, now));
        if self.snapshot.should_recall(uid) {
            debug!("snapshot recalled on completion of effect {}", uid);
            let _ = self.recall(true, true, true);
            return;
        }

        let mut effect = self.effects.remove(0);
        if effect.loop_count().repeats() && !effect.is_cancelled() {
            let next = self.allocate_uid();
            effect.requeue(now, next);
            trace!("effect {} looping as {}", uid, next);
            // A slot was just freed.
            let _ = self.effects.push(effect);
        } else {
            if effect.recalls() {
                for channel in self.channels.iter_mut() {
                    channel.recall(true);
                }
            }
            debug!("effect {} retired at {}", uid, now.as_micros());
        }
    }

    /// Moves the channels to `levels`.
    ///
    /// Immediate sets cancel every queued effect and write at once; otherwise
    /// an effect with the default duration is queued.
    pub fn set(&mut self, levels: [u16; N], immediate: bool) -> Result<(), FaderError> {
        if immediate {
            self.clear_effects(true);
            for (channel, &level) in self.channels.iter_mut().zip(levels.iter()) {
                channel.set(level, true);
                channel.set_target(level);
            }
            Ok(())
        } else {
            self.create_effect(EffectSpec::new(levels)).map(|_| ())
        }
    }

    /// Queues an effect and returns its identity.
    ///
    /// With `update_existing` and a `uid` that is already queued, the
    /// existing effect is retimed in place instead (left alone if it is
    /// already running), keeping its position in the queue.
    pub fn create_effect(&mut self, spec: EffectSpec<N>) -> Result<u32, FaderError> {
        self.enqueue(spec, false)
    }

    /// Queues an effect starting at an absolute clock value.
    ///
    /// `start` should lie less than
    /// [`MAX_RELATIVE_SECS`](crate::time::MAX_RELATIVE_SECS) ahead of the
    /// clock; an instant further out reads as already passed.
    pub fn create_effect_at(&mut self, start: Instant, spec: EffectSpec<N>) -> Result<u32, FaderError> {
        self.enqueue(spec.at(start), false)
    }

    /// Queues an effect. `resolved` targets are only clamped to the bounds,
    /// skipping the scale and offset transform.
    pub(crate) fn enqueue(&mut self, spec: EffectSpec<N>, resolved: bool) -> Result<u32, FaderError> {
        let duration = match secs_to_micros(spec.duration) {
            0 => self.default_duration,
            micros => micros,
        };
        let start = match spec.start {
            StartTime::Absolute(at) => at,
            StartTime::Relative(seconds) => {
                self.now.wrapping_add(secs_to_micros(seconds).min(MAX_DELAY_MICROS))
            }
        };

        if spec.update_existing {
            if let Some(uid) = spec.uid {
                if let Some(existing) = self.effects.iter_mut().find(|e| e.uid() == uid) {
                    existing.update_timers(duration, start);
                    debug!("effect {} retimed", uid);
                    return Ok(uid);
                }
            }
        }

        if self.effects.is_full() {
            warn!("effect queue full ({}), effect refused", Q as u32);
            return Err(FaderError::QueueFull { capacity: Q });
        }

        if spec.recall {
            for channel in self.channels.iter_mut() {
                channel.save();
            }
        }

        let target = array::from_fn(|i| {
            if resolved {
                self.channels[i].conform(spec.target[i])
            } else {
                self.channels[i].resolve(spec.target[i])
            }
        });
        let uid = match spec.uid {
            Some(uid) => {
                self.next_uid = self.next_uid.max(uid.wrapping_add(1)).max(1);
                uid
            }
            None => self.allocate_uid(),
        };

        let mut effect = Effect::new(target, start, duration, self.now, uid, spec.loop_count, spec.recall);
        effect.set_defer_on_rollover(spec.defer_on_rollover);
        if spec.start_jitter > 0.0 || spec.duration_jitter > 0.0 {
            let mut rng = self.jitter_rng();
            effect.vary_start(secs_to_micros(spec.start_jitter), self.now, &mut rng);
            effect.vary_duration(secs_to_micros(spec.duration_jitter), &mut rng);
        }
        effect.defer();

        debug!(
            "effect {} queued: start {} for {} us",
            uid,
            effect.start().as_micros(),
            effect.duration()
        );
        self.effects
            .push(effect)
            .map_err(|_| FaderError::QueueFull { capacity: Q })?;
        Ok(uid)
    }

    fn allocate_uid(&mut self) -> u32 {
        let uid = self.next_uid;
        self.next_uid = self.next_uid.wrapping_add(1).max(1);
        uid
    }

    /// Fresh generator seeded from the clock and a draw counter.
    fn jitter_rng(&mut self) -> SmallRng {
        let seed = ((self.now.as_micros() as u64) << 32) | self.jitter_draws as u64;
        self.jitter_draws = self.jitter_draws.wrapping_add(1);
        SmallRng::seed_from_u64(seed)
    }

    /// Shifts queued effects forward so none starts before its predecessor
    /// ends.
    pub fn align_effects(&mut self) {
        let Some(first) = self.effects.first() else {
            return;
        };
        let mut last = first.end();
        for effect in self.effects.iter_mut().skip(1) {
            if effect.start() < last {
                let delta = last.as_micros() as i64 - effect.start().as_micros() as i64;
                effect.adjust(delta);
            }
            last = effect.end();
        }
    }

    /// Drops queued effects; with `cancel` false the current one is kept.
    pub fn clear_effects(&mut self, cancel: bool) {
        let keep = if cancel { 0 } else { 1 };
        while self.effects.len() > keep {
            if let Some(effect) = self.effects.pop() {
                trace!("effect {} cleared", effect.uid());
            }
        }
    }

    /// Adds a hold to the current effect, or to every queued effect with
    /// `all`.
    ///
    /// `fraction` is the share of the fade completed before the hold fires.
    /// If any targeted effect is out of hold slots, none of them gets the
    /// hold.
    pub fn hold(&mut self, seconds: f64, fraction: f64, all: bool) -> Result<(), FaderError> {
        let take = if all { self.effects.len() } else { 1 };
        if self.effects.is_empty() {
            return Err(FaderError::NoEffectQueued);
        }
        if self
            .effects
            .iter()
            .take(take)
            .any(|effect| effect.holds().len() >= MAX_HOLDS)
        {
            warn!("hold refused: effect out of hold slots");
            return Err(FaderError::HoldCapacityExceeded);
        }
        for effect in self.effects.iter_mut().take(take) {
            effect.add_hold(Hold::new(seconds, fraction))?;
        }
        Ok(())
    }

    /// Adds a hold to the most recently queued effect.
    pub fn hold_last(&mut self, seconds: f64, fraction: f64) -> Result<(), FaderError> {
        self.effects
            .last_mut()
            .ok_or(FaderError::NoEffectQueued)?
            .add_hold(Hold::new(seconds, fraction))
    }

    /// Releases the current effect's front hold.
    pub fn resume(&mut self) {
        if let Some(effect) = self.effects.first_mut() {
            effect.resume();
        }
    }

    /// Cancels the current effect. It is retired on the following ticks and
    /// does not loop.
    pub fn cancel_current_effect(&mut self) -> Result<(), FaderError> {
        let effect = self.effects.first_mut().ok_or(FaderError::NoEffectQueued)?;
        effect.cancel();
        debug!("effect {} cancelled", effect.uid());
        Ok(())
    }

    /// Saves the current levels, per channel or into the fader snapshot.
    pub fn save(&mut self, global: bool) {
        if global {
            let current = self.current();
            self.snapshot.store(current);
        } else {
            for channel in self.channels.iter_mut() {
                channel.save();
            }
        }
    }

    /// Returns the saved levels, optionally applying them.
    ///
    /// A global recall consumes the snapshot and its triggers. Applying
    /// immediately cancels every queued effect; otherwise a fade to the saved
    /// levels is queued.
    pub fn recall(&mut self, global: bool, apply: bool, immediate: bool) -> Result<[u16; N], FaderError> {
        let levels = if global {
            self.snapshot.take()
        } else {
            array::from_fn(|i| self.channels[i].saved())
        };
        if apply {
            if immediate {
                self.clear_effects(true);
                for (channel, &level) in self.channels.iter_mut().zip(levels.iter()) {
                    channel.restore(level, true);
                }
            } else {
                self.enqueue(EffectSpec::new(levels), true)?;
            }
        }
        Ok(levels)
    }

    /// Arms the snapshot: activation of `save_uid` saves the levels and
    /// completion of `recall_uid` restores them.
    pub fn enable_snapshot(&mut self, save_uid: u32, recall_uid: u32) {
        self.snapshot.arm(save_uid, recall_uid);
    }

    /// Drives every channel to its soft maximum.
    pub fn full(&mut self, immediate: bool) -> [u16; N] {
        for channel in self.channels.iter_mut() {
            channel.restore(channel.maximum(), immediate);
        }
        self.current()
    }

    /// Drives every channel to its soft minimum.
    pub fn clear(&mut self, immediate: bool) -> [u16; N] {
        for channel in self.channels.iter_mut() {
            channel.restore(channel.minimum(), immediate);
        }
        self.current()
    }

    /// Moves each channel by a signed amount, clamped to its bounds.
    pub fn increment(&mut self, by: [i32; N], immediate: bool) {
        for (channel, &amount) in self.channels.iter_mut().zip(by.iter()) {
            channel.increment(amount, immediate);
        }
    }

    /// Queues a fade to the mirror of the current levels.
    pub fn invert(&mut self) -> Result<u32, FaderError> {
        let inversion = self.color_inversion();
        self.enqueue(EffectSpec::new(inversion), true)
    }

    pub fn set_maximum(&mut self, level: u16) {
        for channel in self.channels.iter_mut() {
            channel.set_max(level);
        }
    }

    pub fn set_maximums(&mut self, levels: [u16; N]) {
        for (channel, &level) in self.channels.iter_mut().zip(levels.iter()) {
            channel.set_max(level);
        }
    }

    pub fn set_minimum(&mut self, level: u16) {
        for channel in self.channels.iter_mut() {
            channel.set_min(level);
        }
    }

    pub fn set_minimums(&mut self, levels: [u16; N]) {
        for (channel, &level) in self.channels.iter_mut().zip(levels.iter()) {
            channel.set_min(level);
        }
    }

    /// Sets the input scale applied to every channel.
    pub fn set_scale(&mut self, scale: f32) {
        for channel in self.channels.iter_mut() {
            channel.set_scale(scale);
        }
    }

    /// Sets the input offset applied to every channel.
    pub fn set_offset(&mut self, offset: i16) {
        for channel in self.channels.iter_mut() {
            channel.set_offset(offset);
        }
    }

    /// Flips output polarity and rewrites every channel.
    pub fn set_polarity_inversion(&mut self, inverted: bool) {
        for channel in self.channels.iter_mut() {
            channel.set_inverted(inverted);
            channel.write();
        }
    }

    /// Sets the fade length used by effects created with zero duration.
    pub fn set_default_duration(&mut self, seconds: f64) {
        self.default_duration = secs_to_micros(seconds).max(1);
    }

    /// Fade length, in microseconds, of effects created with zero duration.
    pub fn default_duration(&self) -> u32 {
        self.default_duration
    }

    pub fn current(&self) -> [u16; N] {
        array::from_fn(|i| self.channels[i].value())
    }

    pub fn target(&self) -> [u16; N] {
        array::from_fn(|i| self.channels[i].target())
    }

    /// Current level of one channel.
    pub fn current_value(&self, index: usize) -> Option<u16> {
        self.channels.get(index).map(Channel::value)
    }

    pub fn maximums(&self) -> [u16; N] {
        array::from_fn(|i| self.channels[i].maximum())
    }

    pub fn minimums(&self) -> [u16; N] {
        array::from_fn(|i| self.channels[i].minimum())
    }

    /// Mirror of the current levels within the hardware range.
    pub fn color_inversion(&self) -> [u16; N] {
        array::from_fn(|i| self.channels[i].inversion())
    }

    /// Whether any channel is above zero.
    pub fn illuminated(&self) -> bool {
        self.channels.iter().any(|channel| channel.value() != 0)
    }

    /// Whether every channel sits at its soft maximum, or at the hardware
    /// maximum with `absolute`.
    pub fn is_max(&self, absolute: bool) -> bool {
        self.channels.iter().all(|channel| {
            let ceiling = if absolute {
                channel.absolute_maximum()
            } else {
                channel.maximum()
            };
            channel.value() == ceiling
        })
    }

    pub fn is_min(&self) -> bool {
        self.channels
            .iter()
            .all(|channel| channel.value() == channel.minimum())
    }

    pub fn is_color(&self, levels: [u16; N]) -> bool {
        self.current() == levels
    }

    pub fn effects_queued(&self) -> usize {
        self.effects.len()
    }

    /// Whether the current effect has activated.
    pub fn effects_active(&self) -> bool {
        self.effects.first().is_some_and(Effect::is_active)
    }

    /// Greatest remaining loop count across the queue.
    pub fn looping(&self) -> LoopCount {
        let mut greatest = 0;
        for effect in self.effects.iter() {
            match effect.loop_count() {
                LoopCount::Infinite => return LoopCount::Infinite,
                LoopCount::Finite(n) => greatest = greatest.max(n),
            }
        }
        LoopCount::Finite(greatest)
    }

    /// The current effect.
    pub fn next_effect(&self) -> Option<&Effect<N>> {
        self.effects.first()
    }

    /// The most recently queued effect.
    pub fn last_effect(&self) -> Option<&Effect<N>> {
        self.effects.last()
    }

    pub fn effect(&self, uid: u32) -> Option<&Effect<N>> {
        self.effects.iter().find(|effect| effect.uid() == uid)
    }

    /// Identity and completion time of the last retired effect.
    pub fn last_completed(&self) -> Option<(u32, Instant)> {
        self.last_completed
    }

    /// The logical clock.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn snapshot(&self) -> &Snapshot<N> {
        &self.snapshot
    }

    pub fn channels(&self) -> &[Channel<O>; N] {
        &self.channels
    }

    pub fn resolution(&self) -> u8 {
        self.channels.first().map_or(DEFAULT_RESOLUTION, Channel::resolution)
    }

    pub fn status(&self) -> FaderStatus<N> {
        let status = FaderStatus {
            now: self.now,
            current: self.current(),
            target: self.target(),
            queued: self.effects.len(),
            active: self.effects_active(),
            last_completed: self.last_completed,
            next_start: self.effects.first().map(Effect::start),
        };
        debug!(
            "status: now {} queued {} active {}",
            status.now.as_micros(),
            status.queued as u32,
            status.active
        );
        status
    }
}
