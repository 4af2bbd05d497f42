//! Integration tests for colors module

mod common;
use common::*;

use led_fader::colors::{self, BLACK, BLUE, RED, WHITE};
use led_fader::{Fader, FaderConfig, Srgb};

fn colors_equal(a: Srgb, b: Srgb) -> bool {
    const EPSILON: f32 = 0.01;
    (a.red - b.red).abs() < EPSILON
        && (a.green - b.green).abs() < EPSILON
        && (a.blue - b.blue).abs() < EPSILON
}

#[test]
fn hsv_creates_primary_colors() {
    assert!(colors_equal(colors::hsv(0.0, 1.0, 1.0), RED));
    assert!(colors_equal(colors::hsv(240.0, 1.0, 1.0), BLUE));
    assert!(colors_equal(
        colors::hsv(0.0, 0.0, 0.5),
        Srgb::new(0.5, 0.5, 0.5)
    ));
}

#[test]
fn hue_wraps_around_360() {
    assert!(colors_equal(colors::hue(0.0), colors::hue(360.0)));
    assert!(colors_equal(colors::hue(180.0), Srgb::new(0.0, 1.0, 1.0)));
}

#[test]
fn srgb_maps_onto_soft_maximum() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    assert_eq!(fader.levels_from_srgb(RED), [255, 0, 0]);
    assert_eq!(fader.levels_from_srgb(Srgb::new(0.5, 0.5, 0.5)), [128, 128, 128]);
    assert_eq!(fader.levels_from_srgb(Srgb::new(2.0, -1.0, 0.0)), [255, 0, 0]);

    fader.set_maximum(100);
    assert_eq!(fader.levels_from_srgb(WHITE), [100, 100, 100]);
    fader.set_minimum(10);
    assert_eq!(fader.levels_from_srgb(BLACK), [10, 10, 10]);
}

#[test]
fn current_levels_read_back_as_srgb() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    fader.set([255, 0, 51], true).unwrap();
    assert!(colors_equal(fader.current_srgb(), Srgb::new(1.0, 0.0, 0.2)));

    fader.set_maximum(0);
    assert!(colors_equal(fader.current_srgb(), BLACK));
}

#[test]
fn fade_to_srgb_reaches_the_color() {
    let clock = MockClock::new();
    let mut fader: TestFader<4> = dark_fader(&clock);
    fader.fade_to_srgb(BLUE, 0.01).unwrap();
    run_until_idle(&mut fader, &clock, 1_000, 100);
    assert_eq!(fader.current(), [0, 0, 255]);
}

#[test]
fn extra_channels_stay_at_minimum() {
    let clock = MockClock::new();
    let fader: Fader<MockOutput, MockClock, 4, 2> = Fader::new(
        [
            MockOutput::new(),
            MockOutput::new(),
            MockOutput::new(),
            MockOutput::new(),
        ],
        &clock,
        FaderConfig::default(),
    );
    assert_eq!(fader.levels_from_srgb(WHITE), [255, 255, 255, 0]);
    assert_eq!(fader.primary(1), [0, 255, 0, 0]);
    assert_eq!(fader.secondary(2), [255, 0, 255, 0]);
}
