//! Offline export: drives the render loop from a virtual clock and feeds
//! frames and audio to an [`EncoderSink`].
//!
//! One [`ExportPipeline`] runs at most one job at a time. The job moves
//! through `Idle → Recording → Finalizing → Complete | Failed`; cancelling
//! sends it back to `Idle`. Readers observe it through an [`ExportMonitor`]
//! or by subscribing to [`ExportEvent`]s.

mod encoder;
mod ffmpeg;
mod manifest;

pub use encoder::{
    Artifact, CodecPair, Container, EncodeResult, EncoderSettings, EncoderSink,
};
pub use ffmpeg::FfmpegEncoder;
pub use manifest::{Manifest, ManifestEncoder};

use std::{
    sync::{mpsc, Arc, Mutex, MutexGuard},
    thread::{self, JoinHandle},
};

use serde::Serialize;

use crate::{
    AnalyzerConfig, CancelToken, Compositor, DecodedSignal, EncodeError, ExportSettings,
    FreeRunTicker, Pacing, PlaybackClock, RefreshTicker, RenderConfig, RenderLoop, Result,
    SignalRef, SpectrumAnalyzer, Ticker, VirtualClock, WavecastError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    #[default]
    Idle,
    Recording,
    Finalizing,
    Complete,
    Failed,
}

impl ExportStatus {
    /// Recording or finalizing: another export may not begin.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Recording | Self::Finalizing)
    }
}

/// Shared state of the current export job.
#[derive(Debug, Clone, Default)]
struct ExportJob {
    status: ExportStatus,
    progress: f32,
    artifact: Option<Artifact>,
    error: Option<String>,
}

/// Emitted in order to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportEvent {
    Status(ExportStatus),
    Progress(f32),
}

/// Read-only view of the job, cheap to clone and share with other threads.
#[derive(Debug, Clone, Default)]
pub struct ExportMonitor {
    job: Arc<Mutex<ExportJob>>,
}

impl ExportMonitor {
    pub fn status(&self) -> Result<ExportStatus> {
        Ok(self.lock()?.status)
    }

    /// Fraction of the signal exported so far, in `[0, 1]`.
    pub fn progress(&self) -> Result<f32> {
        Ok(self.lock()?.progress)
    }

    /// Why the last job failed, if it did.
    pub fn error(&self) -> Result<Option<String>> {
        Ok(self.lock()?.error.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ExportJob>> {
        self.job
            .lock()
            .map_err(|_| WavecastError::msg("export job state has been poisoned"))
    }
}

struct ActiveExport {
    render: RenderLoop,
    clock: VirtualClock,
    /// First sample frame not yet handed to the encoder.
    audio_cursor: usize,
    audio: Vec<f32>,
    frames: u64,
}

/// Export state machine around one encoder.
pub struct ExportPipeline {
    encoder: Box<dyn EncoderSink>,
    settings: ExportSettings,
    analyzer: AnalyzerConfig,
    compositor: Compositor,
    monitor: ExportMonitor,
    subscribers: Vec<mpsc::Sender<ExportEvent>>,
    cancel: CancelToken,
    active: Option<ActiveExport>,
}

impl ExportPipeline {
    pub fn new(
        encoder: Box<dyn EncoderSink>,
        settings: ExportSettings,
        analyzer: AnalyzerConfig,
    ) -> Self {
        Self {
            encoder,
            settings,
            analyzer,
            compositor: Compositor::default(),
            monitor: ExportMonitor::default(),
            subscribers: Vec::new(),
            cancel: CancelToken::new(),
            active: None,
        }
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn monitor(&self) -> ExportMonitor {
        self.monitor.clone()
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<ExportEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn status(&self) -> Result<ExportStatus> {
        self.monitor.status()
    }

    /// Artifact of the last completed job.
    pub fn artifact(&self) -> Result<Option<Artifact>> {
        Ok(self.monitor.lock()?.artifact.clone())
    }

    /// Token that cancels the current job on its next step. Replaced on
    /// every [`begin`](Self::begin).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Starts a job for `signal`. Fails without touching the running job if
    /// one is already recording or finalizing.
    pub fn begin(&mut self, signal: SignalRef, config: RenderConfig) -> Result<()> {
        let status = self.status()?;
        if status.is_busy() {
            return Err(WavecastError::InvalidExportState(format!(
                "an export is already {status:?}"
            )));
        }

        self.active = None;
        self.cancel = CancelToken::new();
        *self.monitor.lock()? = ExportJob::default();

        let codec = CodecPair::for_background(config.transparent_background);
        if codec.needs_alpha() && !self.encoder.supports_alpha() {
            return Err(self.fail(EncodeError::AlphaUnsupported.into()));
        }

        let analyzer = match SpectrumAnalyzer::new(self.analyzer.clone()) {
            Ok(analyzer) => analyzer,
            Err(err) => return Err(self.fail(err)),
        };
        let encoder_settings = EncoderSettings {
            width: self.settings.width,
            height: self.settings.height,
            fps: self.settings.fps,
            sample_rate: signal.sample_rate(),
            channels: signal.channel_count() as u16,
            codec,
        };
        if let Err(err) = self.encoder.start(&encoder_settings) {
            return Err(self.fail(err.into()));
        }

        let clock =
            VirtualClock::for_pacing(self.settings.pacing, signal.duration(), self.settings.fps);
        tracing::info!(
            duration = signal.duration(),
            style = %config.style,
            ?codec,
            "export started"
        );
        let render = RenderLoop::new(
            signal,
            Some(analyzer),
            self.compositor.clone(),
            config,
            (self.settings.width, self.settings.height),
        );
        self.active = Some(ActiveExport {
            render,
            clock,
            audio_cursor: 0,
            audio: Vec::new(),
            frames: 0,
        });
        self.set_status(ExportStatus::Recording)
    }

    /// Records one frame. Returns `false` once the job has left `Recording`,
    /// either because the whole signal was recorded or because it was
    /// cancelled.
    pub fn step(&mut self) -> Result<bool> {
        let status = self.status()?;
        if status != ExportStatus::Recording {
            return Err(WavecastError::InvalidExportState(format!(
                "cannot record while {status:?}"
            )));
        }
        if self.cancel.is_cancelled() {
            self.cancel();
            return Ok(false);
        }

        match self.record_frame() {
            Ok(Some(progress)) => {
                self.report_progress(progress)?;
                Ok(true)
            }
            Ok(None) => {
                self.set_status(ExportStatus::Finalizing)?;
                Ok(false)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Closes the encoder and publishes the artifact.
    pub fn finalize(&mut self) -> Result<Artifact> {
        let status = self.status()?;
        if status != ExportStatus::Finalizing {
            return Err(WavecastError::InvalidExportState(format!(
                "cannot finalize while {status:?}"
            )));
        }
        let frames = self.active.take().map_or(0, |active| active.frames);

        match self.encoder.finish() {
            Ok(artifact) if !artifact.is_empty() => {
                {
                    let mut job = self.monitor.lock()?;
                    job.status = ExportStatus::Complete;
                    job.progress = 1.0;
                    job.artifact = Some(artifact.clone());
                }
                self.emit(ExportEvent::Progress(1.0));
                self.emit(ExportEvent::Status(ExportStatus::Complete));
                tracing::info!(frames, bytes = artifact.len(), "export complete");
                Ok(artifact)
            }
            Ok(_) => Err(self.fail(EncodeError::EmptyOutput.into())),
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Begins, records and finalizes a job, waiting on `ticker` between
    /// frames.
    pub fn run(
        &mut self,
        signal: SignalRef,
        config: RenderConfig,
        ticker: &mut dyn Ticker,
    ) -> Result<Artifact> {
        self.begin(signal, config)?;
        self.drive(ticker)
    }

    /// Stops the running job and returns to `Idle`. Does nothing when no job
    /// is running.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        // a poisoned job is treated as running so the encoder still gets aborted
        let busy = self.status().map_or(true, ExportStatus::is_busy);
        if !busy {
            return;
        }

        self.encoder.abort();
        self.active = None;
        if let Ok(mut job) = self.monitor.lock() {
            *job = ExportJob::default();
        }
        self.emit(ExportEvent::Status(ExportStatus::Idle));
        tracing::info!("export cancelled");
    }

    /// Cancels any running job and forgets the outcome of the last one.
    pub fn reset(&mut self) {
        self.cancel();
        let changed = match self.monitor.lock() {
            Ok(mut job) => {
                let changed = job.status != ExportStatus::Idle;
                *job = ExportJob::default();
                changed
            }
            Err(_) => false,
        };
        if changed {
            self.emit(ExportEvent::Status(ExportStatus::Idle));
        }
    }

    /// Begins a job here, then records and finalizes it on a background
    /// thread.
    pub fn spawn(mut self, signal: SignalRef, config: RenderConfig) -> Result<ExportHandle> {
        self.begin(signal, config)?;
        let monitor = self.monitor();
        let cancel = self.cancel_token();
        let mut ticker = ticker_for(self.settings.pacing, self.settings.fps);

        let thread = thread::Builder::new()
            .name("wavecast-export".into())
            .spawn(move || self.drive(ticker.as_mut()))?;

        Ok(ExportHandle {
            monitor,
            cancel,
            thread,
        })
    }

    fn drive(&mut self, ticker: &mut dyn Ticker) -> Result<Artifact> {
        while self.step()? {
            ticker.wait_next();
        }
        if self.status()? != ExportStatus::Finalizing {
            return Err(WavecastError::Cancelled);
        }
        self.finalize()
    }

    /// Feeds audio up to the clock and pushes one frame. `None` once the
    /// clock has reached the end of the signal.
    fn record_frame(&mut self) -> Result<Option<f32>> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| WavecastError::InvalidExportState("no export is recording".into()))?;
        let signal = active.render.signal().clone();
        let elapsed = active.clock.current_position();

        if !active.clock.is_active() {
            feed_audio(self.encoder.as_mut(), &signal, active, signal.frame_count())?;
            tracing::debug!(frames = active.frames, "export recording finished");
            return Ok(None);
        }

        let until = signal.sample_index(elapsed).max(0) as usize;
        feed_audio(self.encoder.as_mut(), &signal, active, until)?;
        let frame = active.render.render_at(elapsed)?;
        self.encoder.push_frame(frame)?;
        active.frames += 1;
        active.clock.advance();
        tracing::trace!(elapsed, frame = active.frames, "exported frame");

        Ok(Some(recording_progress(elapsed, active.clock.duration())))
    }

    fn report_progress(&mut self, progress: f32) -> Result<()> {
        let progress = progress.clamp(0.0, 1.0);
        {
            let mut job = self.monitor.lock()?;
            if progress <= job.progress {
                return Ok(());
            }
            job.progress = progress;
        }
        self.emit(ExportEvent::Progress(progress));
        Ok(())
    }

    fn set_status(&mut self, status: ExportStatus) -> Result<()> {
        self.monitor.lock()?.status = status;
        self.emit(ExportEvent::Status(status));
        Ok(())
    }

    /// Aborts the encoder, marks the job failed and hands `err` back.
    fn fail(&mut self, err: WavecastError) -> WavecastError {
        self.encoder.abort();
        self.active = None;
        if let Ok(mut job) = self.monitor.lock() {
            job.status = ExportStatus::Failed;
            job.artifact = None;
            job.error = Some(err.to_string());
        }
        self.emit(ExportEvent::Status(ExportStatus::Failed));
        tracing::warn!(%err, "export failed");
        err
    }

    fn emit(&mut self, event: ExportEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl Drop for ExportPipeline {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("settings", &self.settings)
            .field("status", &self.status().ok())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Non-blocking view of an export started with [`ExportPipeline::spawn`].
pub struct ExportHandle {
    monitor: ExportMonitor,
    cancel: CancelToken,
    thread: JoinHandle<Result<Artifact>>,
}

impl ExportHandle {
    pub fn monitor(&self) -> &ExportMonitor {
        &self.monitor
    }

    /// Requests cancellation. The job returns to `Idle` before its next frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the export finishes.
    pub fn wait(self) -> Result<Artifact> {
        self.thread
            .join()
            .map_err(|_| WavecastError::msg("export thread panicked"))?
    }
}

impl std::fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

/// Fraction of the signal recorded so far. Stays below 1 so only
/// `finalize` reports completion.
fn recording_progress(elapsed: f64, duration: f64) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    ((elapsed / duration) as f32).clamp(0.0, 1.0 - f32::EPSILON)
}

fn feed_audio(
    encoder: &mut dyn EncoderSink,
    signal: &DecodedSignal,
    active: &mut ActiveExport,
    until: usize,
) -> Result<()> {
    let until = until.min(signal.frame_count());
    if until <= active.audio_cursor {
        return Ok(());
    }
    active.audio.clear();
    signal.interleave_into(active.audio_cursor, until, &mut active.audio);
    encoder.push_audio(&active.audio)?;
    active.audio_cursor = until;
    Ok(())
}

fn ticker_for(pacing: Pacing, fps: u32) -> Box<dyn Ticker + Send> {
    match pacing {
        Pacing::Stepped => Box::new(FreeRunTicker),
        Pacing::Realtime => Box::new(RefreshTicker::new(fps)),
    }
}
