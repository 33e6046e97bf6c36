use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{palette, RenderConfig, RenderStyle, Result};

/// Output frame width in pixels.
pub const FRAME_WIDTH: u32 = 1280;
/// Output frame height in pixels.
pub const FRAME_HEIGHT: u32 = 720;
/// Frames per second for both the live preview and exports.
pub const FRAME_RATE: u32 = 30;
/// Analysis window length in samples. The snapshot holds half as many bins.
pub const FFT_SIZE: usize = 2048;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub render: RenderSettings,
    pub analyzer: AnalyzerConfig,
    pub export: ExportSettings,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// User-facing render selection, by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub style: RenderStyle,
    pub preset: String,
    pub transparent_background: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            style: RenderStyle::Line,
            preset: palette::DEFAULT_PRESET.to_string(),
            transparent_background: false,
        }
    }
}

impl RenderSettings {
    /// Looks the preset up in the catalog and builds the per-frame config.
    pub fn resolve(&self) -> Result<RenderConfig> {
        Ok(RenderConfig {
            style: self.style,
            preset: palette::preset(&self.preset)?,
            transparent_background: self.transparent_background,
        })
    }
}

/// Parameters of the spectrum analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub fft_size: usize,
    /// Weight of the previous magnitude in the running average, `[0, 1)`.
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

impl AnalyzerConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// How the export clock moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pacing {
    /// Exactly one frame interval per rendered frame. Reproducible.
    #[default]
    Stepped,
    /// Follows elapsed wall time, for encoders that consume audio in real time.
    Realtime,
}

/// Frame geometry and timing of exported video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pacing: Pacing,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            fps: FRAME_RATE,
            pacing: Pacing::Stepped,
        }
    }
}

impl ExportSettings {
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}
