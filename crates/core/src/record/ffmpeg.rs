use std::{
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;

use crate::{EncodeError, Frame};

use super::encoder::{Artifact, CodecPair, EncodeResult, EncoderSettings, EncoderSink};

/// Encodes through an external `ffmpeg` binary.
///
/// Video is piped as raw RGBA into a first process. On finish the buffered
/// audio is written to a WAV file and muxed with the video in a second pass.
/// Intermediate files live in a temporary directory removed with the session.
pub struct FfmpegEncoder {
    program: OsString,
    alpha: bool,
    session: Option<FfmpegSession>,
}

struct FfmpegSession {
    settings: EncoderSettings,
    workdir: TempDir,
    video: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    audio: Vec<f32>,
}

impl FfmpegEncoder {
    /// Uses `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Uses the given binary and probes it for a VP9 encoder.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        let program = program.into();
        let alpha = probe_alpha(&program);
        tracing::debug!(program = ?program, alpha, "probed ffmpeg encoders");
        Self {
            program,
            alpha,
            session: None,
        }
    }

    /// Whether the binary can be started at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn spawn_video(&self, settings: &EncoderSettings, output: &Path) -> EncodeResult<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-s")
            .arg(format!("{}x{}", settings.width, settings.height))
            .arg("-r")
            .arg(settings.fps.to_string())
            .args(["-i", "-"]);

        match settings.codec {
            CodecPair::H264Aac => {
                cmd.args(["-c:v", "libx264", "-preset", "medium", "-crf", "18"])
                    .args(["-pix_fmt", "yuv420p"]);
            }
            CodecPair::Vp9AlphaOpus => {
                cmd.args(["-c:v", "libvpx-vp9", "-crf", "20", "-b:v", "0"])
                    .args(["-pix_fmt", "yuva420p", "-auto-alt-ref", "0"]);
            }
        }

        cmd.arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| EncodeError::Process(format!("failed to start ffmpeg: {err}")))
    }

    fn mux(&self, session: &FfmpegSession) -> EncodeResult<PathBuf> {
        let settings = &session.settings;
        let audio = session.workdir.path().join("audio.wav");
        write_wav(&audio, settings, &session.audio)?;

        let container = settings.codec.container();
        let output = session
            .workdir
            .path()
            .join(format!("export.{}", container.extension()));
        let audio_codec: &[&str] = match settings.codec {
            CodecPair::H264Aac => &["-c:a", "aac", "-b:a", "192k"],
            CodecPair::Vp9AlphaOpus => &["-c:a", "libopus", "-b:a", "160k"],
        };

        let status = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(&session.video)
            .arg("-i")
            .arg(&audio)
            .args(["-map", "0:v", "-map", "1:a", "-c:v", "copy"])
            .args(audio_codec)
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| EncodeError::Process(format!("failed to start ffmpeg: {err}")))?;
        if !status.success() {
            return Err(EncodeError::Process(format!(
                "muxing exited with {:?}",
                status.code()
            )));
        }
        Ok(output)
    }

    fn session(&mut self) -> EncodeResult<&mut FfmpegSession> {
        self.session
            .as_mut()
            .ok_or_else(|| EncodeError::Rejected("no encoding session is running".into()))
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderSink for FfmpegEncoder {
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

        let workdir = tempfile::Builder::new()
            .prefix("wavecast-")
            .tempdir()
            .map_err(|err| EncodeError::Process(err.to_string()))?;
        let video = workdir
            .path()
            .join(format!("video.{}", settings.codec.container().extension()));
        let mut child = self.spawn_video(settings, &video)?;
        let stdin = child.stdin.take();

        tracing::debug!(
            codec = ?settings.codec,
            dir = %workdir.path().display(),
            "ffmpeg session started"
        );
        self.session = Some(FfmpegSession {
            settings: settings.clone(),
            workdir,
            video,
            child,
            stdin,
            audio: Vec::new(),
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
        let stdin = session
            .stdin
            .as_mut()
            .ok_or_else(|| EncodeError::Process("ffmpeg stdin is closed".into()))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|err| EncodeError::Process(format!("writing frame: {err}")))
    }

    fn push_audio(&mut self, samples: &[f32]) -> EncodeResult<()> {
        self.session()?.audio.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> EncodeResult<Artifact> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| EncodeError::Rejected("no encoding session is running".into()))?;

        drop(session.stdin.take());
        let status = session
            .child
            .wait()
            .map_err(|err| EncodeError::Process(format!("waiting for ffmpeg: {err}")))?;
        if !status.success() {
            return Err(EncodeError::Process(format!(
                "ffmpeg exited with {:?}",
                status.code()
            )));
        }

        let output = self.mux(&session)?;
        let bytes = fs::read(&output).map_err(|err| EncodeError::Process(err.to_string()))?;
        if bytes.is_empty() {
            return Err(EncodeError::EmptyOutput);
        }
        Ok(Artifact::new(bytes, session.settings.codec.container()))
    }

    fn abort(&mut self) {
        if let Some(mut session) = self.session.take() {
            drop(session.stdin.take());
            if let Err(err) = session.child.kill() {
                tracing::warn!(%err, "failed to stop ffmpeg");
            }
            if let Err(err) = session.child.wait() {
                tracing::warn!(%err, "failed to reap ffmpeg");
            }
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for FfmpegEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEncoder")
            .field("program", &self.program)
            .field("alpha", &self.alpha)
            .field("running", &self.session.is_some())
            .finish()
    }
}

fn probe_alpha(program: &OsString) -> bool {
    Command::new(program)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map(|output| {
            output.status.success()
                && String::from_utf8_lossy(&output.stdout).contains("libvpx-vp9")
        })
        .unwrap_or(false)
}

fn write_wav(path: &Path, settings: &EncoderSettings, samples: &[f32]) -> EncodeResult<()> {
    let spec = WavSpec {
        channels: settings.channels,
        sample_rate: settings.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let to_process = |err: hound::Error| EncodeError::Process(format!("writing audio: {err}"));
    let mut writer = WavWriter::create(path, spec).map_err(to_process)?;
    for sample in samples {
        writer.write_sample(*sample).map_err(to_process)?;
    }
    writer.finalize().map_err(to_process)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn missing_binary_has_no_alpha_and_fails_to_start() {
        let mut encoder = FfmpegEncoder::with_program("wavecast-no-such-ffmpeg");
        assert!(!encoder.supports_alpha());
        assert!(!encoder.is_available());

        let settings = EncoderSettings {
            width: 8,
            height: 8,
            fps: 30,
            sample_rate: 8_000,
            channels: 1,
            codec: CodecPair::H264Aac,
        };
        assert!(matches!(encoder.start(&settings), Err(EncodeError::Process(_))));
        assert!(matches!(encoder.finish(), Err(EncodeError::Rejected(_))));
        encoder.abort();
    }

    #[test]
    fn audio_is_written_as_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        let settings = EncoderSettings {
            width: 8,
            height: 8,
            fps: 30,
            sample_rate: 8_000,
            channels: 2,
            codec: CodecPair::H264Aac,
        };
        write_wav(&path, &settings, &[0.5, -0.5, 0.25, -0.25]).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.5, -0.5, 0.25, -0.25]);
    }
}
