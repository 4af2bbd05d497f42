//! Integration tests for the ready-made patterns

mod common;
use common::*;

use led_fader::FaderError;

#[test]
fn blink_alternates_between_minimum_and_saved_levels() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    fader.set([100, 50, 0], true).unwrap();

    assert!(fader.blink(0.01, 0.0).unwrap());
    assert!(!fader.blink(0.01, 0.0).unwrap());
    assert_eq!(fader.next_effect().unwrap().duration(), 5_000);
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), [0, 0, 0]);

    assert!(fader.blink(0.01, 0.0).unwrap());
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), [100, 50, 0]);
}

#[test]
fn blink_hold_pauses_at_the_end_of_the_fade() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    fader.set([100, 50, 0], true).unwrap();
    fader.blink(0.002, 0.02).unwrap();
    assert_eq!(fader.next_effect().unwrap().holds().len(), 1);

    tick(&mut fader, &clock, 1_000, 5);
    assert_eq!(fader.current(), [0, 0, 0]);
    assert_eq!(fader.effects_queued(), 1);

    let ticks = run_until_idle(&mut fader, &clock, 1_000, 100);
    assert!(ticks >= 15);
}

#[test]
fn tiny_durations_fall_back_to_one_microsecond() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    fader.bounce(1e-9, 0.0).unwrap();
    assert_eq!(fader.next_effect().unwrap().duration(), 1);
}

#[test]
fn bounce_fades_to_the_mirror() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    fader.set([0, 100, 255], true).unwrap();

    assert!(fader.bounce(0.02, 0.0).unwrap());
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), [255, 155, 0]);

    assert!(fader.bounce(0.02, 0.0).unwrap());
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), [0, 100, 255]);
}

#[test]
fn flash_switches_between_two_colors() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    let red = [255, 0, 0];
    let blue = [0, 0, 255];

    fader.flash(red, blue, 0.01, 0.0).unwrap();
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), red);

    fader.flash(red, blue, 0.01, 0.0).unwrap();
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), blue);
}

#[test]
fn rotate_queues_six_colors_in_order() {
    let clock = MockClock::new();
    let mut fader: TestFader<8> = dark_fader(&clock);
    let (first, last) = fader.rotate(0.6).unwrap();
    assert_eq!(last - first, 5);
    assert_eq!(fader.effects_queued(), 6);

    let expected = [
        [255, 0, 0],
        [255, 255, 0],
        [0, 255, 0],
        [0, 255, 255],
        [0, 0, 255],
        [255, 0, 255],
    ];
    for (offset, target) in expected.iter().enumerate() {
        let effect = fader.effect(first + offset as u32).unwrap();
        assert_eq!(effect.target(), *target);
        assert_eq!(effect.duration(), 100_000);
    }
}

#[test]
fn rotate_reports_a_full_queue() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    assert_eq!(
        fader.rotate(0.6),
        Err(FaderError::QueueFull { capacity: 4 })
    );
    assert_eq!(fader.effects_queued(), 4);
}

#[test]
fn cycle_only_starts_when_idle() {
    let clock = MockClock::new();
    let mut fader: TestFader<8> = dark_fader(&clock);
    assert!(fader.cycle(0.06).unwrap());
    assert!(!fader.cycle(0.06).unwrap());
    run_until_idle(&mut fader, &clock, 1_000, 500);
    assert_eq!(fader.current(), [255, 0, 255]);
    assert!(fader.cycle(0.06).unwrap());
}

#[test]
fn self_test_restores_levels_when_done() {
    let clock = MockClock::new();
    let mut fader: TestFader<8> = dark_fader(&clock);
    fader.set([10, 20, 30], true).unwrap();
    fader.create_effect(led_fader::EffectSpec::new([99, 99, 99])).unwrap();

    fader.self_test(0.06).unwrap();
    assert_eq!(fader.effects_queued(), 6);
    assert!(fader.snapshot().is_enabled());

    tick(&mut fader, &clock, 1_000, 12);
    assert_ne!(fader.current(), [10, 20, 30]);

    run_until_idle(&mut fader, &clock, 1_000, 500);
    assert_eq!(fader.current(), [10, 20, 30]);
    assert!(!fader.snapshot().is_enabled());
}
