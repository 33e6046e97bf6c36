use serde::{Deserialize, Serialize};

use crate::{EncodeError, Frame};

use super::encoder::{Artifact, Container, EncodeResult, EncoderSettings, EncoderSink};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// What a [`ManifestEncoder`] writes instead of video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub settings: EncoderSettings,
    pub container: Container,
    pub frame_count: u64,
    /// FNV-1a of each frame's raw RGBA bytes, in push order.
    pub frame_checksums: Vec<u64>,
    /// Interleaved samples, so `frames × channels`.
    pub audio_samples: u64,
}

impl Manifest {
    pub fn from_artifact(artifact: &Artifact) -> crate::Result<Self> {
        Ok(serde_json::from_slice(artifact.bytes())?)
    }

    /// Length of the audio track in seconds.
    pub fn audio_duration(&self) -> f64 {
        let channels = self.settings.channels.max(1) as u64;
        (self.audio_samples / channels) as f64 / self.settings.sample_rate.max(1) as f64
    }

    /// Length of the video track in seconds.
    pub fn video_duration(&self) -> f64 {
        self.frame_count as f64 / self.settings.fps.max(1) as f64
    }
}

/// In-memory sink that records a JSON [`Manifest`] of everything it was fed.
#[derive(Debug)]
pub struct ManifestEncoder {
    alpha: bool,
    session: Option<Manifest>,
}

impl ManifestEncoder {
    pub fn new() -> Self {
        Self {
            alpha: true,
            session: None,
        }
    }

    /// A sink that behaves like an encoder build without an alpha codec.
    pub fn without_alpha() -> Self {
        Self {
            alpha: false,
            session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    fn session(&mut self) -> EncodeResult<&mut Manifest> {
        self.session
            .as_mut()
            .ok_or_else(|| EncodeError::Rejected("no encoding session is running".into()))
    }
}

impl Default for ManifestEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderSink for ManifestEncoder {
    fn supports_alpha(&self) -> bool {
        self.alpha
    }

    fn start(&mut self, settings: &EncoderSettings) -> EncodeResult<()> {
        if self.session.is_some() {
            return Err(EncodeError::Rejected("encoder is already running".into()));
        }
        if settings.codec.needs_alpha() && !self.alpha {
            return Err(EncodeError::AlphaUnsupported);
        }
        self.session = Some(Manifest {
            settings: settings.clone(),
            container: settings.codec.container(),
            frame_count: 0,
            frame_checksums: Vec::new(),
            audio_samples: 0,
        });
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> EncodeResult<()> {
        let session = self.session()?;
        let expected = (session.settings.width, session.settings.height);
        if frame.dimensions() != expected {
            return Err(EncodeError::Rejected(format!(
                "frame is {:?}, encoder expects {:?}",
                frame.dimensions(),
                expected
            )));
        }
        session.frame_checksums.push(checksum(frame.as_raw()));
        session.frame_count += 1;
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> EncodeResult<()> {
        self.session()?.audio_samples += samples.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> EncodeResult<Artifact> {
        let manifest = self
            .session
            .take()
            .ok_or_else(|| EncodeError::Rejected("no encoding session is running".into()))?;
        if manifest.frame_count == 0 {
            return Err(EncodeError::EmptyOutput);
        }
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|err| EncodeError::Process(err.to_string()))?;
        Ok(Artifact::new(bytes, Container::Manifest))
    }

    fn abort(&mut self) {
        self.session = None;
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
