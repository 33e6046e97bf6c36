use std::f32::consts::{FRAC_PI_2, TAU};

use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::{
    palette::{ColorPreset, Fill, GradientAxis},
    FrequencySnapshot,
};

use super::{
    paint::{self, Overlay},
    shape, Frame, StyleConstants,
};

const RING_OPACITY: f32 = 0.4;

pub(super) fn circle(
    frame: &mut Frame,
    snapshot: &FrequencySnapshot,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let (width, height) = frame.dimensions();
    let center = (width as f32 * 0.5, height as f32 * 0.5);
    let inner = height as f32 * constants.circle_inner;
    let reach = height as f32 * constants.circle_reach;
    let count = constants.circle_samples;
    let fill = Fill::resolve(preset, GradientAxis::Angular { center });

    for i in 0..count {
        let length = shape(snapshot.resampled(i, count), reach);
        if length < 0.5 {
            continue;
        }
        let angle = i as f32 / count as f32 * TAU - FRAC_PI_2;
        let (sin, cos) = angle.sin_cos();
        let start = (center.0 + cos * inner, center.1 + sin * inner);
        let end = (
            center.0 + cos * (inner + length),
            center.1 + sin * (inner + length),
        );
        draw_line_segment_mut(frame, start, end, fill.color_at(end.0, end.1));
    }
}

pub(super) fn pulse(
    frame: &mut Frame,
    snapshot: &FrequencySnapshot,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let (width, height) = frame.dimensions();
    let center = (width as f32 * 0.5, height as f32 * 0.5);
    let radius = pulse_radius(snapshot, height as f32, constants);

    let fill = Fill::resolve(
        preset,
        GradientAxis::Radial {
            center,
            inner: 0.0,
            outer: radius,
        },
    );
    paint::fill_disc(frame, center, radius, &fill);

    let ring_color = preset.last();
    let mut overlay = Overlay::new(frame, RING_OPACITY);
    for ring in constants.pulse_rings {
        let ring_radius = (height as f32 * ring).round() as i32;
        draw_hollow_circle_mut(
            &mut overlay,
            (center.0 as i32, center.1 as i32),
            ring_radius,
            ring_color,
        );
    }
}

/// `min + bass/255 · range`, both as fractions of `height`.
pub(super) fn pulse_radius(
    snapshot: &FrequencySnapshot,
    height: f32,
    constants: &StyleConstants,
) -> f32 {
    let bass = snapshot.low_band_average(constants.bass_fraction) / 255.0;
    height * (constants.pulse_min + bass * constants.pulse_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn preset() -> ColorPreset {
        ColorPreset::new("green", vec![Rgba([0, 255, 0, 255])]).unwrap()
    }

    #[test]
    fn silent_pulse_has_minimum_radius() {
        let snapshot = FrequencySnapshot::silent(1024);
        let radius = pulse_radius(&snapshot, 720.0, &StyleConstants::default());
        assert!((radius - 72.0).abs() < 1e-3);
    }

    #[test]
    fn pulse_reads_only_the_bass_band() {
        let mut bins = vec![0u8; 1000];
        bins[..100].fill(255);
        let loud_bass = FrequencySnapshot::new(bins);
        let mut bins = vec![255u8; 1000];
        bins[..100].fill(0);
        let loud_treble = FrequencySnapshot::new(bins);

        let constants = StyleConstants::default();
        assert!((pulse_radius(&loud_bass, 100.0, &constants) - 60.0).abs() < 1e-3);
        assert!((pulse_radius(&loud_treble, 100.0, &constants) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn circle_ticks_start_at_inner_radius() {
        let mut frame = Frame::new(400, 400);
        let snapshot = FrequencySnapshot::new(vec![255; 1024]);
        circle(&mut frame, &snapshot, &preset(), &StyleConstants::default());

        // straight up: inner radius 100, tick length 100
        let lit = |y: u32| (198..=202).any(|x| *frame.get_pixel(x, y) == Rgba([0, 255, 0, 255]));
        assert!(!lit(150));
        assert!(lit(95));
        assert!(lit(50));
        assert_eq!(frame.get_pixel(200, 200).0[3], 0);
    }

    #[test]
    fn rings_are_drawn_translucent() {
        let mut frame = Frame::new(400, 400);
        paint::clear(&mut frame, Rgba([0, 0, 0, 255]));
        pulse(&mut frame, &FrequencySnapshot::silent(1024), &preset(), &StyleConstants::default());

        // outer ring at 0.4 · 400 = 160px, outside the 40px disc
        let ring = frame.get_pixel(200 + 160, 200);
        assert_eq!(*ring, Rgba([0, 102, 0, 255]));
        assert_eq!(*frame.get_pixel(200, 200), Rgba([0, 255, 0, 255]));
    }
}
