use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::config::Pacing;

/// Source of playback position for a render loop.
pub trait PlaybackClock {
    /// Current position in seconds.
    fn current_position(&self) -> f64;

    /// Whether the loop driven by this clock should keep rendering.
    fn is_active(&self) -> bool;

    /// Called once after each rendered frame. Clocks that follow real time
    /// ignore it.
    fn advance(&mut self) {}
}

/// Monotonic time since some fixed origin.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone)]
pub struct WallTime {
    origin: Instant,
}

impl WallTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Time that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    nanos: Arc<AtomicU64>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, time: Duration) {
        self.nanos.store(time.as_nanos() as u64, Ordering::Release);
    }

    pub fn advance(&self, delta: Duration) {
        self.nanos.fetch_add(delta.as_nanos() as u64, Ordering::AcqRel);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

/// Playback position of the live preview. Follows its time source while
/// playing; pausing and seeking are under user control.
pub struct LiveClock {
    source: Arc<dyn TimeSource>,
    duration: f64,
    /// Position at the moment playback last (re)started or was seeked.
    base: f64,
    /// Time source reading at that moment, `None` while paused.
    started_at: Option<Duration>,
}

impl LiveClock {
    /// A paused clock at position zero for media of `duration` seconds.
    pub fn new(source: Arc<dyn TimeSource>, duration: f64) -> Self {
        Self {
            source,
            duration: duration.max(0.0),
            base: 0.0,
            started_at: None,
        }
    }

    pub fn play(&mut self) {
        if self.started_at.is_none() {
            if self.base >= self.duration {
                self.base = 0.0;
            }
            self.started_at = Some(self.source.now());
        }
    }

    pub fn pause(&mut self) {
        self.base = self.current_position();
        self.started_at = None;
    }

    /// Jumps to `seconds`, clamped to the media. Playing clocks keep playing.
    pub fn seek(&mut self, seconds: f64) {
        self.base = seconds.clamp(0.0, self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(self.source.now());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some() && self.current_position() < self.duration
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl PlaybackClock for LiveClock {
    fn current_position(&self) -> f64 {
        let running = self
            .started_at
            .map(|start| self.source.now().saturating_sub(start).as_secs_f64())
            .unwrap_or(0.0);
        (self.base + running).min(self.duration)
    }

    fn is_active(&self) -> bool {
        self.is_playing()
    }
}

impl std::fmt::Debug for LiveClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveClock")
            .field("duration", &self.duration)
            .field("base", &self.base)
            .field("playing", &self.started_at.is_some())
            .finish()
    }
}

/// Export-only clock measuring time since the export started, capped at the
/// signal duration.
pub struct VirtualClock {
    duration: f64,
    mode: VirtualMode,
}

enum VirtualMode {
    Stepped { frame: u64, interval: f64 },
    Realtime { source: Arc<dyn TimeSource>, origin: Duration },
}

impl VirtualClock {
    /// Advances exactly `interval` seconds per rendered frame.
    pub fn stepped(duration: f64, interval: f64) -> Self {
        Self {
            duration,
            mode: VirtualMode::Stepped { frame: 0, interval },
        }
    }

    /// Reports the real time elapsed on `source` since this call.
    pub fn realtime(duration: f64, source: Arc<dyn TimeSource>) -> Self {
        let origin = source.now();
        Self {
            duration,
            mode: VirtualMode::Realtime { source, origin },
        }
    }

    /// Builds the clock an export with `pacing` at `fps` should use.
    pub fn for_pacing(pacing: Pacing, duration: f64, fps: u32) -> Self {
        match pacing {
            Pacing::Stepped => Self::stepped(duration, 1.0 / fps.max(1) as f64),
            Pacing::Realtime => Self::realtime(duration, Arc::new(WallTime::new())),
        }
    }

    /// Elapsed time, not capped.
    pub fn elapsed(&self) -> f64 {
        match &self.mode {
            VirtualMode::Stepped { frame, interval } => *frame as f64 * interval,
            VirtualMode::Realtime { source, origin } => {
                source.now().saturating_sub(*origin).as_secs_f64()
            }
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl PlaybackClock for VirtualClock {
    fn current_position(&self) -> f64 {
        self.elapsed().min(self.duration)
    }

    fn is_active(&self) -> bool {
        self.elapsed() < self.duration
    }

    fn advance(&mut self) {
        if let VirtualMode::Stepped { frame, .. } = &mut self.mode {
            *frame += 1;
        }
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field("duration", &self.duration)
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

/// "Yield until the next tick" for a render loop.
pub trait Ticker {
    fn wait_next(&mut self);
}

/// Paces iterations to a display refresh rate by sleeping off whatever is
/// left of each interval.
#[derive(Debug)]
pub struct RefreshTicker {
    interval: Duration,
    deadline: Option<Instant>,
}

impl RefreshTicker {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            deadline: None,
        }
    }
}

impl Ticker for RefreshTicker {
    fn wait_next(&mut self) {
        let now = Instant::now();
        let deadline = self.deadline.unwrap_or(now) + self.interval;
        if deadline > now {
            std::thread::sleep(deadline - now);
            self.deadline = Some(deadline);
        } else {
            // fell behind: restart the cadence instead of bursting to catch up
            self.deadline = Some(now);
        }
    }
}

/// Runs as fast as the work allows, only yielding the thread between frames.
#[derive(Debug, Default)]
pub struct FreeRunTicker;

impl Ticker for FreeRunTicker {
    fn wait_next(&mut self) {
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(duration: f64) -> (ManualTime, LiveClock) {
        let time = ManualTime::new();
        let clock = LiveClock::new(Arc::new(time.clone()), duration);
        (time, clock)
    }

    #[test]
    fn live_clock_follows_time_while_playing() {
        let (time, mut clock) = live(10.0);
        assert!(!clock.is_active());

        clock.play();
        time.advance(Duration::from_millis(1_500));
        assert!((clock.current_position() - 1.5).abs() < 1e-9);
        assert!(clock.is_active());

        clock.pause();
        time.advance(Duration::from_secs(3));
        assert!((clock.current_position() - 1.5).abs() < 1e-9);
        assert!(!clock.is_active());
    }

    #[test]
    fn live_clock_seeks_and_ends() {
        let (time, mut clock) = live(2.0);
        clock.play();
        clock.seek(1.75);
        time.advance(Duration::from_millis(100));
        assert!((clock.current_position() - 1.85).abs() < 1e-9);

        time.advance(Duration::from_secs(1));
        assert_eq!(clock.current_position(), 2.0);
        assert!(!clock.is_active());

        clock.seek(-4.0);
        assert_eq!(clock.current_position(), 0.0);
    }

    #[test]
    fn stepped_clock_counts_frames() {
        let mut clock = VirtualClock::stepped(1.0, 0.25);
        let mut positions = Vec::new();
        while clock.is_active() {
            positions.push(clock.current_position());
            clock.advance();
        }
        assert_eq!(positions, vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(clock.current_position(), 1.0);
    }

    #[test]
    fn realtime_clock_ignores_advance() {
        let time = ManualTime::new();
        time.set(Duration::from_secs(7));
        let mut clock = VirtualClock::realtime(1.0, Arc::new(time.clone()));
        clock.advance();
        assert_eq!(clock.current_position(), 0.0);

        time.advance(Duration::from_millis(400));
        assert!((clock.current_position() - 0.4).abs() < 1e-9);
        time.advance(Duration::from_secs(1));
        assert!(!clock.is_active());
        assert_eq!(clock.current_position(), 1.0);
    }
}
