use crate::{
    AppConfig, Artifact, CancelToken, Compositor, DecodedSignal, Decoder, EncoderSink,
    ExportMonitor, ExportPipeline, Frame, FreeRunTicker, RenderConfig, RenderLoop, Result,
    SignalRef, SignalStore, SpectrumAnalyzer, WavecastError,
};

/// Frames of analysis run before a one-off render so smoothing has settled.
const WARM_UP_FRAMES: usize = 12;

/// Engine handle for one user session: the loaded signal, the live render
/// loops bound to it and the export pipeline.
///
/// Loading a new signal, or dropping the session, cancels everything that
/// was bound to the previous one.
#[derive(Debug)]
pub struct Session {
    config: AppConfig,
    store: SignalStore,
    compositor: Compositor,
    export: ExportPipeline,
    live: Vec<CancelToken>,
}

impl Session {
    pub fn new(config: AppConfig, encoder: Box<dyn EncoderSink>) -> Self {
        let compositor = Compositor::default();
        let export = ExportPipeline::new(encoder, config.export.clone(), config.analyzer.clone())
            .with_compositor(compositor.clone());
        Self {
            config,
            store: SignalStore::new(),
            compositor,
            export,
            live: Vec::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Style, preset and transparency from the session config.
    pub fn render_config(&self) -> Result<RenderConfig> {
        self.config.render.resolve()
    }

    pub fn signal(&self) -> Option<&SignalRef> {
        self.store.current()
    }

    /// Decodes and installs a new signal. The old signal is released first,
    /// so a failed decode leaves the session without one.
    pub fn load(&mut self, decoder: &dyn Decoder, bytes: &[u8]) -> Result<SignalRef> {
        self.release();
        self.store.load(decoder, bytes)
    }

    /// Installs an already decoded signal.
    pub fn load_signal(&mut self, signal: DecodedSignal) -> SignalRef {
        self.release();
        self.store.replace(signal)
    }

    /// A live render loop with its own analyzer, bound to the current signal.
    pub fn live_loop(&mut self, config: RenderConfig) -> Result<RenderLoop> {
        let signal = self.require_signal()?;
        let analyzer = SpectrumAnalyzer::new(self.config.analyzer.clone())?;
        let render = RenderLoop::new(
            signal,
            Some(analyzer),
            self.compositor.clone(),
            config,
            (self.config.export.width, self.config.export.height),
        );
        self.live.retain(|token| !token.is_cancelled());
        self.live.push(render.cancel_token());
        Ok(render)
    }

    /// Renders the frame live playback would show at `position`.
    pub fn render_frame(&mut self, position: f64, config: RenderConfig) -> Result<Frame> {
        let interval = self.config.export.frame_interval();
        let mut render = self.live_loop(config)?;
        render.warm_up(position, interval, WARM_UP_FRAMES)?;
        let frame = render.render_at(position)?.clone();
        render.cancel_token().cancel();
        Ok(frame)
    }

    /// Exports the current signal, blocking until the artifact is ready.
    pub fn export(&mut self, config: RenderConfig) -> Result<Artifact> {
        let signal = self.require_signal()?;
        self.export.run(signal, config, &mut FreeRunTicker)
    }

    pub fn export_monitor(&self) -> ExportMonitor {
        self.export.monitor()
    }

    /// Direct access for step-wise or background exports.
    pub fn export_pipeline(&mut self) -> &mut ExportPipeline {
        &mut self.export
    }

    /// Cancels live loops and any running export, and forgets the signal.
    pub fn teardown(&mut self) {
        self.release();
        tracing::debug!("session torn down");
    }

    fn release(&mut self) {
        for token in self.live.drain(..) {
            token.cancel();
        }
        self.export.reset();
        self.store.clear();
    }

    fn require_signal(&self) -> Result<SignalRef> {
        self.store
            .current()
            .cloned()
            .ok_or_else(|| WavecastError::msg("no audio signal is loaded"))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ExportSettings, ExportStatus, FreeRunTicker, LoopOutcome, ManifestEncoder, Pacing,
        RenderStyle, VirtualClock, WavDecoder,
    };

    fn session() -> Session {
        let mut config = AppConfig::default();
        config.export = ExportSettings {
            width: 64,
            height: 36,
            fps: 10,
            pacing: Pacing::Stepped,
        };
        Session::new(config, Box::new(ManifestEncoder::new()))
    }

    fn tone(seconds: f64) -> DecodedSignal {
        let len = (seconds * 4_000.0) as usize;
        DecodedSignal::mono((0..len).map(|i| (i as f32 * 0.1).sin()).collect(), 4_000).unwrap()
    }

    #[test]
    fn loading_cancels_loops_bound_to_the_old_signal() {
        let mut session = session();
        session.load_signal(tone(2.0));
        let config = session.render_config().unwrap();
        let mut stale = session.live_loop(config).unwrap();

        session.load_signal(tone(1.0));
        let mut clock = VirtualClock::stepped(2.0, 0.1);
        let mut sink = |_: &Frame, _: f64| -> Result<()> { Ok(()) };
        let outcome = stale.run(&mut clock, &mut FreeRunTicker, &mut sink).unwrap();
        assert_eq!(outcome, LoopOutcome::Cancelled { frames: 0 });
    }

    #[test]
    fn loading_cancels_a_running_export() {
        let mut session = session();
        let signal = session.load_signal(tone(2.0));
        let config = session.render_config().unwrap();
        let pipeline = session.export_pipeline();
        pipeline.begin(signal, config).unwrap();
        pipeline.step().unwrap();
        assert_eq!(session.export_monitor().status().unwrap(), ExportStatus::Recording);

        session.load_signal(tone(1.0));
        assert_eq!(session.export_monitor().status().unwrap(), ExportStatus::Idle);
        assert_eq!(session.export_monitor().progress().unwrap(), 0.0);
    }

    #[test]
    fn failed_decode_leaves_no_signal() {
        let mut session = session();
        session.load_signal(tone(1.0));
        assert!(session.load(&WavDecoder, b"not a wav").is_err());
        assert!(session.signal().is_none());
        let config = session.render_config().unwrap();
        assert!(session.export(config).is_err());
    }

    #[test]
    fn renders_and_exports_the_current_signal() {
        let mut session = session();
        session.load_signal(tone(1.0));
        let mut config = session.render_config().unwrap();
        config.style = RenderStyle::Pulse;

        let frame = session.render_frame(0.5, config.clone()).unwrap();
        assert_eq!(frame.dimensions(), (64, 36));

        let artifact = session.export(config).unwrap();
        assert!(!artifact.is_empty());
    }
}
