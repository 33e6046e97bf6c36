//! The render loop: clock → spectrum → compositor → sink, one frame at a time.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    Compositor, Frame, FrequencySnapshot, PlaybackClock, RenderConfig, Result, SignalRef,
    SpectrumAnalyzer, Ticker, WavecastError,
};

/// Shared stop flag. Cancelling is idempotent and visible to every clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Receives every frame a loop produces, in position order.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame, position: f64) -> Result<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame, f64) -> Result<()>,
{
    fn present(&mut self, frame: &Frame, position: f64) -> Result<()> {
        self(frame, position)
    }
}

/// How a [`RenderLoop::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopOutcome {
    /// The clock went inactive; the final frame shows `last_position`.
    Finished { frames: u64, last_position: f64 },
    /// The cancel token fired. No final frame was drawn.
    Cancelled { frames: u64 },
}

/// Owns everything needed to turn a playback position into a frame for one
/// signal. A loop never outlives its signal: loading a new one cancels it.
pub struct RenderLoop {
    signal: SignalRef,
    analyzer: Option<SpectrumAnalyzer>,
    compositor: Compositor,
    config: RenderConfig,
    frame: Frame,
    cancel: CancelToken,
}

impl RenderLoop {
    pub fn new(
        signal: SignalRef,
        analyzer: Option<SpectrumAnalyzer>,
        compositor: Compositor,
        config: RenderConfig,
        size: (u32, u32),
    ) -> Self {
        Self {
            signal,
            analyzer,
            compositor,
            config,
            frame: Compositor::frame(size.0, size.1),
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn signal(&self) -> &SignalRef {
        &self.signal
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Takes effect from the next rendered frame.
    pub fn set_config(&mut self, config: RenderConfig) {
        self.config = config;
    }

    /// The most recently rendered frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Feeds the analyzer the positions leading up to `position` so the
    /// smoothed spectrum matches what continuous playback would show.
    pub fn warm_up(&mut self, position: f64, interval: f64, frames: usize) -> Result<()> {
        if let Some(analyzer) = self.analyzer.as_mut() {
            for step in (1..=frames).rev() {
                analyzer.analyze(&self.signal, position - step as f64 * interval)?;
            }
        }
        Ok(())
    }

    /// One loop body: analyse if the style needs it, then composite.
    pub fn render_at(&mut self, position: f64) -> Result<&Frame> {
        let snapshot = if self.config.style.uses_spectrum() {
            match spectrum(self.analyzer.as_mut(), &self.signal, position) {
                Ok(snapshot) => Some(snapshot),
                Err(WavecastError::AnalyzerUnavailable) => {
                    tracing::trace!(position, "skipping spectrum drawing, no analyzer");
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        self.compositor
            .render(&mut self.frame, &self.signal, position, snapshot, &self.config);
        Ok(&self.frame)
    }

    /// Renders until `clock` goes inactive, then draws one last frame at the
    /// final position. Stops early, without that frame, when cancelled.
    pub fn run(
        &mut self,
        clock: &mut dyn PlaybackClock,
        ticker: &mut dyn Ticker,
        sink: &mut dyn FrameSink,
    ) -> Result<LoopOutcome> {
        let mut frames = 0;

        while clock.is_active() {
            if self.cancel.is_cancelled() {
                return Ok(LoopOutcome::Cancelled { frames });
            }
            let position = clock.current_position();
            let frame = self.render_at(position)?;
            sink.present(frame, position)?;
            frames += 1;

            clock.advance();
            ticker.wait_next();
        }

        if self.cancel.is_cancelled() {
            return Ok(LoopOutcome::Cancelled { frames });
        }
        let last_position = clock.current_position();
        let frame = self.render_at(last_position)?;
        sink.present(frame, last_position)?;
        frames += 1;

        tracing::debug!(frames, last_position, "render loop finished");
        Ok(LoopOutcome::Finished {
            frames,
            last_position,
        })
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("style", &self.config.style)
            .field("analyzer", &self.analyzer.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn spectrum<'a>(
    analyzer: Option<&'a mut SpectrumAnalyzer>,
    signal: &SignalRef,
    position: f64,
) -> Result<&'a FrequencySnapshot> {
    analyzer
        .ok_or(WavecastError::AnalyzerUnavailable)?
        .analyze(signal, position)
}
