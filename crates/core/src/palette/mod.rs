//! Colour presets and the fill resolver shared by every render style.

use std::f32::consts::{FRAC_PI_2, TAU};

use image::Rgba;

use crate::{Result, WavecastError};

/// Named, ordered list of colours. One stop paints solid, more stops paint a
/// gradient in stop order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPreset {
    name: String,
    stops: Vec<Rgba<u8>>,
}

impl ColorPreset {
    /// Returns `None` when `stops` is empty.
    pub fn new(name: impl Into<String>, stops: Vec<Rgba<u8>>) -> Option<Self> {
        if stops.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            stops,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stops(&self) -> &[Rgba<u8>] {
        &self.stops
    }

    pub fn first(&self) -> Rgba<u8> {
        self.stops[0]
    }

    pub fn last(&self) -> Rgba<u8> {
        self.stops[self.stops.len() - 1]
    }

    pub fn is_solid(&self) -> bool {
        self.stops.len() == 1
    }
}

const CATALOG: &[(&str, &[u32])] = &[
    ("white", &[0xffffff]),
    ("mint", &[0x3ddc97]),
    ("amber", &[0xffb000]),
    ("neon", &[0x00f5d4, 0xf15bb5]),
    ("sunset", &[0xff5e62, 0xff9966, 0xffd56b]),
    ("ocean", &[0x2193b0, 0x6dd5ed]),
    ("aurora", &[0x00c9ff, 0x92fe9d, 0xf9f871, 0xff6fd8]),
    ("fire", &[0x8e0e00, 0xe52d27, 0xff8c00, 0xffe259]),
];

/// The fixed preset catalog, in display order.
pub fn catalog() -> Vec<ColorPreset> {
    CATALOG
        .iter()
        .map(|(name, stops)| ColorPreset {
            name: (*name).to_string(),
            stops: stops.iter().map(|hex| rgb(*hex)).collect(),
        })
        .collect()
}

/// Looks a preset up by name (case-insensitive).
pub fn preset(name: &str) -> Result<ColorPreset> {
    catalog()
        .into_iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| WavecastError::UnknownPreset(name.to_string()))
}

/// Name of the preset used when nothing else is configured.
pub const DEFAULT_PRESET: &str = "white";

fn rgb(hex: u32) -> Rgba<u8> {
    Rgba([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255])
}

/// Geometric extent a gradient is laid along, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientAxis {
    /// Colour varies with x from `from` to `to`.
    Horizontal { from: f32, to: f32 },
    /// Colour varies with y from `from` to `to`.
    Vertical { from: f32, to: f32 },
    /// Colour varies with distance from `center`, `inner` to `outer`.
    Radial {
        center: (f32, f32),
        inner: f32,
        outer: f32,
    },
    /// Colour sweeps clockwise around `center`, starting straight up.
    Angular { center: (f32, f32) },
}

impl GradientAxis {
    fn offset(&self, x: f32, y: f32) -> f32 {
        let (value, from, to) = match *self {
            GradientAxis::Horizontal { from, to } => (x, from, to),
            GradientAxis::Vertical { from, to } => (y, from, to),
            GradientAxis::Radial {
                center,
                inner,
                outer,
            } => {
                let dx = x - center.0;
                let dy = y - center.1;
                ((dx * dx + dy * dy).sqrt(), inner, outer)
            }
            GradientAxis::Angular { center } => {
                let angle = (y - center.1).atan2(x - center.0) + FRAC_PI_2;
                return angle.rem_euclid(TAU) / TAU;
            }
        };
        ((value - from) / (to - from)).clamp(0.0, 1.0)
    }

    fn is_degenerate(&self) -> bool {
        let (from, to) = match *self {
            GradientAxis::Horizontal { from, to } | GradientAxis::Vertical { from, to } => {
                (from, to)
            }
            GradientAxis::Radial { inner, outer, .. } => (inner, outer),
            GradientAxis::Angular { .. } => return false,
        };
        (to - from).abs() <= f32::EPSILON
    }
}

/// Stops spread evenly over `[0, 1]`, stop `k` sitting at `k / (len - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<Rgba<u8>>,
    axis: GradientAxis,
}

impl Gradient {
    /// Colour at normalised offset `t`.
    pub fn color_at_offset(&self, t: f32) -> Rgba<u8> {
        let last = self.stops.len() - 1;
        let scaled = t.clamp(0.0, 1.0) * last as f32;
        let nearest = scaled.round();
        if (scaled - nearest).abs() < 1e-4 {
            return self.stops[nearest as usize];
        }

        let index = (scaled.floor() as usize).min(last - 1);
        let frac = scaled - index as f32;
        lerp(self.stops[index], self.stops[index + 1], frac)
    }

    pub fn axis(&self) -> GradientAxis {
        self.axis
    }
}

/// Paint resolved for a particular piece of geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Rgba<u8>),
    Gradient(Gradient),
}

impl Fill {
    /// Resolves `preset` against `axis`. Single-stop presets and zero-length
    /// axes both collapse to a solid fill of the first stop.
    pub fn resolve(preset: &ColorPreset, axis: GradientAxis) -> Self {
        if preset.is_solid() || axis.is_degenerate() {
            return Fill::Solid(preset.first());
        }
        Fill::Gradient(Gradient {
            stops: preset.stops.clone(),
            axis,
        })
    }

    /// Colour of the fill at frame position `(x, y)`.
    pub fn color_at(&self, x: f32, y: f32) -> Rgba<u8> {
        match self {
            Fill::Solid(color) => *color,
            Fill::Gradient(gradient) => gradient.color_at_offset(gradient.axis.offset(x, y)),
        }
    }

    pub fn is_solid(&self) -> bool {
        matches!(self, Fill::Solid(_))
    }
}

fn lerp(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let mut out = [0u8; 4];
    for (channel, value) in out.iter_mut().enumerate() {
        let from = a.0[channel] as f32;
        let to = b.0[channel] as f32;
        *value = (from + (to - from) * t).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAN: GradientAxis = GradientAxis::Horizontal {
        from: 0.0,
        to: 100.0,
    };

    #[test]
    fn single_stop_resolves_to_solid() {
        let white = preset("white").unwrap();
        let fill = Fill::resolve(&white, SPAN);
        assert_eq!(fill, Fill::Solid(Rgba([255, 255, 255, 255])));
        assert_eq!(fill.color_at(73.0, 10.0), white.first());
    }

    #[test]
    fn gradient_hits_stops_exactly() {
        for preset in catalog().iter().filter(|p| !p.is_solid()) {
            let fill = Fill::resolve(preset, SPAN);
            let Fill::Gradient(gradient) = &fill else {
                panic!("{} should resolve to a gradient", preset.name());
            };
            let last = preset.stops().len() - 1;
            for (k, stop) in preset.stops().iter().enumerate() {
                let t = k as f32 / last as f32;
                assert_eq!(gradient.color_at_offset(t), *stop, "{} stop {k}", preset.name());
            }
        }
    }

    #[test]
    fn gradient_interpolates_between_stops() {
        let preset = ColorPreset::new(
            "bw",
            vec![Rgba([0, 0, 0, 255]), Rgba([200, 100, 50, 255])],
        )
        .unwrap();
        let fill = Fill::resolve(&preset, SPAN);
        assert_eq!(fill.color_at(50.0, 0.0), Rgba([100, 50, 25, 255]));
        assert_eq!(fill.color_at(-20.0, 0.0), preset.first());
        assert_eq!(fill.color_at(500.0, 0.0), preset.last());
    }

    #[test]
    fn degenerate_axis_is_solid() {
        let sunset = preset("sunset").unwrap();
        let fill = Fill::resolve(&sunset, GradientAxis::Vertical { from: 5.0, to: 5.0 });
        assert_eq!(fill, Fill::Solid(sunset.first()));
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert!(matches!(
            preset("plaid"),
            Err(WavecastError::UnknownPreset(name)) if name == "plaid"
        ));
        assert!(ColorPreset::new("empty", Vec::new()).is_none());
    }
}
