//! Raster helpers shared by the styles. Everything here clips to the frame, so
//! geometry that spills past an edge is simply cut off.

use image::Rgba;
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_line_segment_mut, Canvas},
    rect::Rect,
};

use crate::{palette::Fill, Frame};

/// Canvas adapter that composites over the frame at a fixed opacity instead of
/// overwriting pixels. Each pixel is blended at most once per overlay, so
/// strokes that touch the same pixel twice do not darken it.
pub(crate) struct Overlay<'a> {
    frame: &'a mut Frame,
    opacity: f32,
    touched: Vec<bool>,
}

impl<'a> Overlay<'a> {
    pub(crate) fn new(frame: &'a mut Frame, opacity: f32) -> Self {
        let (width, height) = frame.dimensions();
        Self {
            frame,
            opacity: opacity.clamp(0.0, 1.0),
            touched: vec![false; width as usize * height as usize],
        }
    }
}

impl Canvas for Overlay<'_> {
    type Pixel = Rgba<u8>;

    fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn get_pixel(&self, x: u32, y: u32) -> Self::Pixel {
        *self.frame.get_pixel(x, y)
    }

    fn draw_pixel(&mut self, x: u32, y: u32, color: Self::Pixel) {
        let index = y as usize * self.frame.width() as usize + x as usize;
        if std::mem::replace(&mut self.touched[index], true) {
            return;
        }
        let below = *self.frame.get_pixel(x, y);
        self.frame.put_pixel(x, y, composite(below, color, self.opacity));
    }
}

/// Straight-alpha "source over" of `src` (scaled by `opacity`) onto `dst`.
pub(crate) fn composite(dst: Rgba<u8>, src: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0 * opacity;
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = dst;
    for channel in 0..3 {
        let s = src.0[channel] as f32;
        let d = dst.0[channel] as f32;
        let value = (s * sa + d * da * (1.0 - sa)) / out_a;
        out.0[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    out.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

/// Paints every pixel of the frame with `color`.
pub(crate) fn clear(frame: &mut Frame, color: Rgba<u8>) {
    for pixel in frame.pixels_mut() {
        *pixel = color;
    }
}

/// Fills the pixel rows `[top, bottom)` of the column `[left, left + width)`.
/// Solid fills go out as one rectangle, gradients row by row.
pub(crate) fn fill_column(
    frame: &mut Frame,
    left: i32,
    width: u32,
    top: i32,
    bottom: i32,
    fill: &Fill,
) {
    if width == 0 || bottom <= top {
        return;
    }

    match fill {
        Fill::Solid(color) => {
            let rect = Rect::at(left, top).of_size(width, (bottom - top) as u32);
            draw_filled_rect_mut(frame, rect, *color);
        }
        Fill::Gradient(_) => {
            let center_x = left as f32 + width as f32 * 0.5;
            for row in top..bottom {
                let color = fill.color_at(center_x, row as f32 + 0.5);
                draw_filled_rect_mut(frame, Rect::at(left, row).of_size(width, 1), color);
            }
        }
    }
}

/// Fills every pixel whose center lies within `radius` of `center`.
pub(crate) fn fill_disc(frame: &mut Frame, center: (f32, f32), radius: f32, fill: &Fill) {
    if radius <= 0.0 {
        return;
    }
    let (width, height) = frame.dimensions();
    let left = (center.0 - radius).floor().max(0.0) as u32;
    let top = (center.1 - radius).floor().max(0.0) as u32;
    let right = ((center.0 + radius).ceil() as i64).clamp(0, width as i64) as u32;
    let bottom = ((center.1 + radius).ceil() as i64).clamp(0, height as i64) as u32;
    let limit = radius * radius;

    for y in top..bottom {
        for x in left..right {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let dx = px - center.0;
            let dy = py - center.1;
            if dx * dx + dy * dy <= limit {
                frame.put_pixel(x, y, fill.color_at(px, py));
            }
        }
    }
}

/// Strokes a polyline with a two pixel pen, colouring each segment from `fill`
/// at its midpoint.
pub(crate) fn stroke_polyline<C>(canvas: &mut C, points: &[(f32, f32)], fill: &Fill)
where
    C: Canvas<Pixel = Rgba<u8>>,
{
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let color = fill.color_at((start.0 + end.0) * 0.5, (start.1 + end.1) * 0.5);
        draw_line_segment_mut(canvas, start, end, color);
        draw_line_segment_mut(canvas, (start.0, start.1 + 1.0), (end.0, end.1 + 1.0), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_opacity_over_black() {
        let out = composite(Rgba([0, 0, 0, 255]), Rgba([200, 100, 50, 255]), 0.5);
        assert_eq!(out, Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn over_transparent_keeps_colour() {
        let out = composite(Rgba([0, 0, 0, 0]), Rgba([200, 100, 50, 255]), 0.5);
        assert_eq!(out, Rgba([200, 100, 50, 128]));
    }

    #[test]
    fn overlay_blends_each_pixel_once() {
        let mut frame = Frame::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let mut overlay = Overlay::new(&mut frame, 0.5);
        overlay.draw_pixel(1, 1, Rgba([200, 0, 0, 255]));
        overlay.draw_pixel(1, 1, Rgba([200, 0, 0, 255]));
        assert_eq!(*frame.get_pixel(1, 1), Rgba([100, 0, 0, 255]));
    }

    #[test]
    fn disc_covers_expected_pixels() {
        let mut frame = Frame::new(20, 20);
        let fill = Fill::Solid(Rgba([9, 9, 9, 255]));
        fill_disc(&mut frame, (10.0, 10.0), 4.0, &fill);
        assert_eq!(frame.get_pixel(10, 10).0[3], 255);
        assert_eq!(frame.get_pixel(13, 10).0[3], 255);
        assert_eq!(frame.get_pixel(15, 10).0[3], 0);
    }

    #[test]
    fn column_outside_frame_is_clipped() {
        let mut frame = Frame::new(8, 8);
        let fill = Fill::Solid(Rgba([1, 2, 3, 255]));
        fill_column(&mut frame, 6, 4, -3, 20, &fill);
        assert_eq!(*frame.get_pixel(7, 0), Rgba([1, 2, 3, 255]));
        assert_eq!(frame.get_pixel(5, 0).0[3], 0);
    }
}
