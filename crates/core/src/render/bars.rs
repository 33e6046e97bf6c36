use crate::{
    palette::{ColorPreset, Fill, GradientAxis},
    FrequencySnapshot,
};

use super::{paint, shape, Frame, StyleConstants};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Center,
    Bottom,
}

pub(super) fn equalizer(
    frame: &mut Frame,
    snapshot: &FrequencySnapshot,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let count = snapshot.len() / constants.equalizer_divisor.max(1);
    draw_bars(
        frame,
        count,
        constants.equalizer_gap,
        Anchor::Center,
        preset,
        |i| snapshot.normalized(i),
    );
}

pub(super) fn symmetric(
    frame: &mut Frame,
    snapshot: &FrequencySnapshot,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let count = constants.bar_count;
    draw_bars(frame, count, constants.bar_gap, Anchor::Center, preset, |i| {
        snapshot.resampled(i, count)
    });
}

pub(super) fn bottom(
    frame: &mut Frame,
    snapshot: &FrequencySnapshot,
    preset: &ColorPreset,
    constants: &StyleConstants,
) {
    let count = constants.bar_count;
    draw_bars(frame, count, constants.bar_gap, Anchor::Bottom, preset, |i| {
        snapshot.resampled(i, count)
    });
}

fn draw_bars(
    frame: &mut Frame,
    count: usize,
    gap: f32,
    anchor: Anchor,
    preset: &ColorPreset,
    value: impl Fn(usize) -> f32,
) {
    if count == 0 {
        return;
    }
    let (width, height) = frame.dimensions();
    let height_f = height as f32;
    let slot = width as f32 / count as f32;
    let bar_width = (slot - gap).max(1.0).round() as u32;

    // Centered bars share one gradient running from the middle row outwards,
    // so both halves of a bar mirror each other.
    let axis = match anchor {
        Anchor::Center => GradientAxis::Vertical {
            from: height_f * 0.5,
            to: 0.0,
        },
        Anchor::Bottom => GradientAxis::Vertical {
            from: height_f,
            to: 0.0,
        },
    };
    let fill = Fill::resolve(preset, axis);

    for i in 0..count {
        let bar_height = shape(value(i), height_f);
        let (top, bottom) = match anchor {
            Anchor::Center => {
                let top = (height_f - bar_height) * 0.5;
                (top, top + bar_height)
            }
            Anchor::Bottom => (height_f - bar_height, height_f),
        };
        let top = top.round() as i32;
        let bottom = bottom.round() as i32;
        if bottom <= top {
            continue;
        }

        let left = (i as f32 * slot).floor() as i32;
        match (&fill, anchor) {
            (Fill::Gradient(_), Anchor::Center) => {
                let middle = height as i32 / 2;
                mirrored_column(frame, left, bar_width, top, bottom, middle, &fill);
            }
            _ => paint::fill_column(frame, left, bar_width, top, bottom, &fill),
        }
    }
}

/// Fills a centered bar so the row `middle + k` takes the colour of row
/// `middle - k`.
fn mirrored_column(
    frame: &mut Frame,
    left: i32,
    width: u32,
    top: i32,
    bottom: i32,
    middle: i32,
    fill: &Fill,
) {
    let upper_end = bottom.min(middle);
    paint::fill_column(frame, left, width, top, upper_end, fill);

    for row in middle.max(top)..bottom {
        let source = 2 * middle - row - 1;
        let color = fill.color_at(left as f32, source as f32 + 0.5);
        paint::fill_column(frame, left, width, row, row + 1, &Fill::Solid(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid() -> ColorPreset {
        ColorPreset::new("red", vec![Rgba([255, 0, 0, 255])]).unwrap()
    }

    fn column_extent(frame: &Frame, x: u32) -> Option<(u32, u32)> {
        let rows: Vec<u32> = (0..frame.height())
            .filter(|y| frame.get_pixel(x, *y).0[3] != 0)
            .collect();
        Some((*rows.first()?, *rows.last()?))
    }

    #[test]
    fn bottom_bars_touch_the_bottom_edge() {
        let mut frame = Frame::new(128 * 10, 100);
        let snapshot = FrequencySnapshot::new(vec![255; 1024]);
        bottom(&mut frame, &snapshot, &solid(), &StyleConstants::default());

        assert_eq!(column_extent(&frame, 0), Some((0, 99)));
        // slot of 10px with a 4px gap leaves pixels 6..10 empty
        assert_eq!(column_extent(&frame, 7), None);
    }

    #[test]
    fn half_level_bars_are_quarter_height_and_centered() {
        let mut frame = Frame::new(256, 400);
        // (128 / 255)² of 400px is 100.8px
        let snapshot = FrequencySnapshot::new(vec![128; 1024]);
        symmetric(&mut frame, &snapshot, &solid(), &StyleConstants::default());

        let (top, bottom) = column_extent(&frame, 0).unwrap();
        assert_eq!(bottom - top + 1, 100);
        assert_eq!(top + bottom, 399);
    }

    #[test]
    fn equalizer_reads_first_quarter_only() {
        let mut bins = vec![0u8; 1024];
        bins[..256].fill(255);
        let snapshot = FrequencySnapshot::new(bins);
        let mut frame = Frame::new(512, 64);
        equalizer(&mut frame, &snapshot, &solid(), &StyleConstants::default());

        // 256 bars of 2px slots: every bar is full height
        assert_eq!(column_extent(&frame, 510), Some((0, 63)));
    }

    #[test]
    fn centered_gradient_is_symmetric() {
        let preset = ColorPreset::new(
            "duo",
            vec![Rgba([0, 0, 255, 255]), Rgba([255, 255, 0, 255])],
        )
        .unwrap();
        let mut frame = Frame::new(128 * 8, 80);
        let snapshot = FrequencySnapshot::new(vec![255; 1024]);
        symmetric(&mut frame, &snapshot, &preset, &StyleConstants::default());

        for k in 0..40 {
            assert_eq!(frame.get_pixel(1, 39 - k), frame.get_pixel(1, 40 + k));
        }
        assert_ne!(frame.get_pixel(1, 0), frame.get_pixel(1, 39));
    }
}
