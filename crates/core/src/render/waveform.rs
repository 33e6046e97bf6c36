use crate::{
    palette::{ColorPreset, Fill, GradientAxis},
    DecodedSignal,
};

use super::{
    paint::{self, Overlay},
    Frame, StyleConstants,
};

const REFLECTION_OPACITY: f32 = 0.5;

pub(super) fn line(
    frame: &mut Frame,
    signal: &DecodedSignal,
    position: f64,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let points = trace(frame, signal, position, constants);
    paint::stroke_polyline(frame, &points, &Fill::Solid(preset.first()));
}

pub(super) fn gradient_line(
    frame: &mut Frame,
    signal: &DecodedSignal,
    position: f64,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let points = trace(frame, signal, position, constants);
    let fill = Fill::resolve(
        preset,
        GradientAxis::Horizontal {
            from: 0.0,
            to: frame.width() as f32,
        },
    );
    paint::stroke_polyline(frame, &points, &fill);
}

pub(super) fn reflected_line(
    frame: &mut Frame,
    signal: &DecodedSignal,
    position: f64,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let height = frame.height() as f32;
    let points = trace(frame, signal, position, constants);
    let fill = Fill::Solid(preset.first());
    paint::stroke_polyline(frame, &points, &fill);

    let mirrored: Vec<(f32, f32)> = points.iter().map(|(x, y)| (*x, height - *y)).collect();
    let mut overlay = Overlay::new(frame, REFLECTION_OPACITY);
    paint::stroke_polyline(&mut overlay, &mirrored, &fill);
}

/// One point per pixel column: a frame-width window of channel 0 centered on
/// the sample playing at `position`. Samples outside the signal are silence.
fn trace(
    frame: &Frame,
    signal: &DecodedSignal,
    position: f64,
    constants: &StyleConstants,
) -> Vec<(f32, f32)> {
    let (width, height) = frame.dimensions();
    let middle = height as f32 * 0.5;
    let amplitude = height as f32 * constants.line_amplitude;
    let start = signal
        .sample_index(position)
        .saturating_sub(i64::from(width / 2));

    (0..width)
        .map(|x| {
            let index = start.saturating_add(i64::from(x));
            let sample = signal.sample_or_silence(0, index).clamp(-1.0, 1.0);
            (x as f32, middle - sample * amplitude)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn preset() -> ColorPreset {
        ColorPreset::new("cyan", vec![Rgba([0, 255, 255, 255])]).unwrap()
    }

    fn drawn_rows(frame: &Frame) -> Vec<u32> {
        let mut rows: Vec<u32> = frame
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel.0[3] != 0)
            .map(|(_, y, _)| y)
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    #[test]
    fn window_past_the_end_is_a_flat_line() {
        let signal = DecodedSignal::mono(vec![0.9; 1_000], 1_000).unwrap();
        let constants = StyleConstants::default();

        for draw in [line, gradient_line, reflected_line] {
            let mut frame = Frame::new(200, 100);
            draw(&mut frame, &signal, 50.0, &preset(), &constants);
            assert_eq!(drawn_rows(&frame), vec![50, 51]);
        }
    }

    #[test]
    fn full_scale_reaches_a_quarter_height() {
        let signal = DecodedSignal::mono(vec![1.0; 1_000], 1_000).unwrap();
        let mut frame = Frame::new(200, 100);
        line(&mut frame, &signal, 0.5, &preset(), &StyleConstants::default());
        assert_eq!(drawn_rows(&frame), vec![25, 26]);
    }

    #[test]
    fn reflection_is_half_opacity() {
        let signal = DecodedSignal::mono(vec![1.0; 1_000], 1_000).unwrap();
        let mut frame = Frame::new(200, 100);
        reflected_line(&mut frame, &signal, 0.5, &preset(), &StyleConstants::default());

        assert_eq!(*frame.get_pixel(100, 25), Rgba([0, 255, 255, 255]));
        assert_eq!(*frame.get_pixel(100, 75), Rgba([0, 255, 255, 128]));
    }

    #[test]
    fn line_straddles_the_start_of_the_signal() {
        let signal = DecodedSignal::mono(vec![1.0; 1_000], 1_000).unwrap();
        let mut frame = Frame::new(200, 100);
        line(&mut frame, &signal, 0.0, &preset(), &StyleConstants::default());

        // left half is before the first sample, right half is full scale
        assert_ne!(frame.get_pixel(20, 50).0[3], 0);
        assert_eq!(frame.get_pixel(20, 25).0[3], 0);
        assert_ne!(frame.get_pixel(180, 25).0[3], 0);
    }

    #[test]
    fn far_out_of_range_positions_are_flat() {
        let signal = DecodedSignal::mono(vec![0.9; 1_000], 1_000).unwrap();
        let constants = StyleConstants::default();

        for position in [1e30, -1e30, f64::MAX, f64::MIN] {
            let mut frame = Frame::new(200, 100);
            line(&mut frame, &signal, position, &preset(), &constants);
            assert_eq!(drawn_rows(&frame), vec![50, 51]);
        }
    }
}
