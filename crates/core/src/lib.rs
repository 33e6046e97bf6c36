//! Core library for the Wavecast audio visualiser.
//!
//! Each module owns one subsystem: the decoded signal store, spectral
//! analysis, style compositing, playback clocks, the render loop and the
//! offline export pipeline. A [`Session`] wires them together for one loaded
//! file.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod palette;
pub mod playback;
pub mod record;
pub mod render;
pub mod session;
pub mod timeline;

pub use analysis::{FrequencySnapshot, SpectrumAnalyzer};
pub use audio::{DecodedSignal, Decoder, SignalRef, SignalStore, WavDecoder};
pub use config::{
    AnalyzerConfig, AppConfig, ExportSettings, Pacing, RenderSettings, FFT_SIZE, FRAME_HEIGHT,
    FRAME_RATE, FRAME_WIDTH,
};
pub use error::{EncodeError, Result, WavecastError};
pub use palette::{ColorPreset, Fill, Gradient, GradientAxis};
pub use playback::{CancelToken, FrameSink, LoopOutcome, RenderLoop};
pub use record::{
    Artifact, CodecPair, Container, EncoderSettings, EncoderSink, ExportEvent, ExportHandle,
    ExportMonitor, ExportPipeline, ExportStatus, FfmpegEncoder, Manifest, ManifestEncoder,
};
pub use render::{shape, Compositor, Frame, RenderConfig, RenderStyle, StyleConstants};
pub use session::Session;
pub use timeline::{
    FreeRunTicker, LiveClock, ManualTime, PlaybackClock, RefreshTicker, Ticker, TimeSource,
    VirtualClock, WallTime,
};
