use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{EncodeError, Frame};

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Container of a finished export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    WebM,
    /// JSON description of what would have been encoded.
    Manifest,
}

impl Container {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::WebM => "video/webm",
            Self::Manifest => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::WebM => "webm",
            Self::Manifest => "json",
        }
    }
}

/// Video and audio codec used together for one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodecPair {
    /// H.264 video with AAC audio in MP4.
    H264Aac,
    /// VP9 video carrying an alpha plane, with Opus audio in WebM.
    Vp9AlphaOpus,
}

impl CodecPair {
    /// Transparent frames need the alpha-capable pair.
    pub fn for_background(transparent: bool) -> Self {
        if transparent {
            Self::Vp9AlphaOpus
        } else {
            Self::H264Aac
        }
    }

    pub fn needs_alpha(self) -> bool {
        matches!(self, Self::Vp9AlphaOpus)
    }

    pub fn container(self) -> Container {
        match self {
            Self::H264Aac => Container::Mp4,
            Self::Vp9AlphaOpus => Container::WebM,
        }
    }
}

/// Everything an encoder needs to know before the first frame arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: CodecPair,
}

/// Encoded bytes plus the container they are in. Clones share the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Arc<[u8]>,
    container: Container,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, container: Container) -> Self {
        Self {
            bytes: bytes.into(),
            container,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn mime_type(&self) -> &'static str {
        self.container.mime_type()
    }
}

/// Destination of an export: consumes frames and interleaved audio, produces
/// one artifact per session.
pub trait EncoderSink: Send {
    /// Whether the alpha-capable codec pair can be used.
    fn supports_alpha(&self) -> bool;

    fn start(&mut self, settings: &EncoderSettings) -> EncodeResult<()>;

    fn push_frame(&mut self, frame: &Frame) -> EncodeResult<()>;

    /// Interleaved samples, in order, continuing where the last call stopped.
    fn push_audio(&mut self, samples: &[f32]) -> EncodeResult<()>;

    fn finish(&mut self) -> EncodeResult<Artifact>;

    /// Drops the running session without producing anything. Safe to call
    /// when no session is running.
    fn abort(&mut self);
}
