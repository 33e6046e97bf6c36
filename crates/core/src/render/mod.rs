//! Frame compositing. [`Compositor::render`] is a pure function of its inputs:
//! the same signal, position, snapshot and config always give the same pixels.

use std::{fmt, str::FromStr};

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::{palette::ColorPreset, DecodedSignal, FrequencySnapshot, WavecastError};

mod bars;
pub(crate) mod paint;
mod radial;
mod waveform;

/// Raster target for one rendered frame.
pub type Frame = RgbaImage;

/// The closed set of visual styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderStyle {
    Line,
    GradientLine,
    ReflectedLine,
    Equalizer,
    SymmetricBars,
    BottomBars,
    Circle,
    Pulse,
}

impl RenderStyle {
    pub const ALL: [RenderStyle; 8] = [
        RenderStyle::Line,
        RenderStyle::GradientLine,
        RenderStyle::ReflectedLine,
        RenderStyle::Equalizer,
        RenderStyle::SymmetricBars,
        RenderStyle::BottomBars,
        RenderStyle::Circle,
        RenderStyle::Pulse,
    ];

    /// Whether the style draws from the frequency snapshot rather than raw
    /// samples.
    pub fn uses_spectrum(self) -> bool {
        !matches!(
            self,
            RenderStyle::Line | RenderStyle::GradientLine | RenderStyle::ReflectedLine
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderStyle::Line => "line",
            RenderStyle::GradientLine => "gradient-line",
            RenderStyle::ReflectedLine => "reflected-line",
            RenderStyle::Equalizer => "equalizer",
            RenderStyle::SymmetricBars => "symmetric-bars",
            RenderStyle::BottomBars => "bottom-bars",
            RenderStyle::Circle => "circle",
            RenderStyle::Pulse => "pulse",
        }
    }
}

impl fmt::Display for RenderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderStyle {
    type Err = WavecastError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RenderStyle::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| WavecastError::UnknownStyle(value.to_string()))
    }
}

/// Everything a single frame render needs to know about the user's choices.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub style: RenderStyle,
    pub preset: ColorPreset,
    pub transparent_background: bool,
}

/// Counts and ratios the styles are built from.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConstants {
    /// The equalizer shows the first `bins / equalizer_divisor` bins.
    pub equalizer_divisor: usize,
    pub equalizer_gap: f32,
    /// Resampled bar count of the symmetric and bottom bar styles.
    pub bar_count: usize,
    pub bar_gap: f32,
    /// Angular samples around the circle.
    pub circle_samples: usize,
    /// Circle inner radius and maximum tick length, as fractions of height.
    pub circle_inner: f32,
    pub circle_reach: f32,
    /// Share of the lowest bins averaged into the pulse's bass level.
    pub bass_fraction: f32,
    pub pulse_min: f32,
    pub pulse_range: f32,
    pub pulse_rings: [f32; 2],
    /// Peak waveform excursion from the centre line, as a fraction of height.
    pub line_amplitude: f32,
}

impl Default for StyleConstants {
    fn default() -> Self {
        Self {
            equalizer_divisor: 4,
            equalizer_gap: 1.0,
            bar_count: 128,
            bar_gap: 4.0,
            circle_samples: 360,
            circle_inner: 0.25,
            circle_reach: 0.25,
            bass_fraction: 0.1,
            pulse_min: 0.1,
            pulse_range: 0.5,
            pulse_rings: [0.25, 0.4],
            line_amplitude: 0.25,
        }
    }
}

/// Perceptual amplitude shaping: `v²` scaled to `extent`.
pub fn shape(value: f32, extent: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    value * value * extent
}

/// Draws frames for every style.
#[derive(Debug, Clone)]
pub struct Compositor {
    constants: StyleConstants,
    background: Rgba<u8>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(StyleConstants::default())
    }
}

impl Compositor {
    pub fn new(constants: StyleConstants) -> Self {
        Self {
            constants,
            background: Rgba([0, 0, 0, 255]),
        }
    }

    /// Uses `color` for opaque backgrounds instead of black.
    pub fn with_background(mut self, color: Rgba<u8>) -> Self {
        self.background = Rgba([color.0[0], color.0[1], color.0[2], 255]);
        self
    }

    pub fn constants(&self) -> &StyleConstants {
        &self.constants
    }

    /// Allocates a blank frame of the given size.
    pub fn frame(width: u32, height: u32) -> Frame {
        Frame::new(width, height)
    }

    /// Clears `target` and draws one style into it.
    ///
    /// Spectrum styles draw nothing past the background when `snapshot` is
    /// `None`.
    pub fn render(
        &self,
        target: &mut Frame,
        signal: &DecodedSignal,
        position: f64,
        snapshot: Option<&FrequencySnapshot>,
        config: &RenderConfig,
    ) {
        let background = if config.transparent_background {
            Rgba([0, 0, 0, 0])
        } else {
            self.background
        };
        paint::clear(target, background);

        let preset = &config.preset;
        let c = &self.constants;
        match (config.style, snapshot) {
            (RenderStyle::Line, _) => waveform::line(target, signal, position, preset, c),
            (RenderStyle::GradientLine, _) => {
                waveform::gradient_line(target, signal, position, preset, c)
            }
            (RenderStyle::ReflectedLine, _) => {
                waveform::reflected_line(target, signal, position, preset, c)
            }
            (RenderStyle::Equalizer, Some(snapshot)) => {
                bars::equalizer(target, snapshot, preset, c)
            }
            (RenderStyle::SymmetricBars, Some(snapshot)) => {
                bars::symmetric(target, snapshot, preset, c)
            }
            (RenderStyle::BottomBars, Some(snapshot)) => bars::bottom(target, snapshot, preset, c),
            (RenderStyle::Circle, Some(snapshot)) => radial::circle(target, snapshot, preset, c),
            (RenderStyle::Pulse, Some(snapshot)) => radial::pulse(target, snapshot, preset, c),
            (style, None) => {
                tracing::trace!(%style, "no spectrum available, drawing background only");
            }
        }
    }

    /// Pulse disc radius in pixels for a frame of `height`.
    pub fn pulse_radius(&self, snapshot: &FrequencySnapshot, height: u32) -> f32 {
        radial::pulse_radius(snapshot, height as f32, &self.constants)
    }
}
