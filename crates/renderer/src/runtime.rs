use std::time::{Duration, Instant};

/// Snapshot of the clock state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Shader time in seconds; frozen while paused.
    pub seconds: f32,
    /// Seconds since the previous tick, zero while paused.
    pub delta: f32,
    /// Index of the frame being rendered.
    pub frame_index: u64,
    /// Frames per second measured over the last full window.
    pub fps: f32,
}

/// Abstraction over where monotonic time values originate from.
pub trait TimeSource: Send {
    /// Seconds elapsed since the source was created.
    fn now(&mut self) -> f64;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Length of the window FPS is averaged over.
const FPS_WINDOW: f64 = 1.0;

/// Shader clock: accumulates time while running, counts frames and samples
/// the frame rate roughly once per second.
#[derive(Debug)]
pub struct FrameClock<S: TimeSource = SystemTimeSource> {
    source: S,
    elapsed: f64,
    last: Option<f64>,
    frame: u64,
    paused: bool,
    fps: f32,
    window_start: Option<f64>,
    window_frames: u32,
}

impl FrameClock<SystemTimeSource> {
    pub fn new() -> Self {
        Self::with_source(SystemTimeSource::new())
    }
}

impl Default for FrameClock<SystemTimeSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TimeSource> FrameClock<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            elapsed: 0.0,
            last: None,
            frame: 0,
            paused: false,
            fps: 0.0,
            window_start: None,
            window_frames: 0,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Flips the paused flag and returns the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Rewinds shader time and the frame counter. The paused flag is kept.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.frame = 0;
    }

    /// Advances the clock for one rendered frame.
    pub fn tick(&mut self) -> FrameTick {
        let now = self.source.now();
        let raw_delta = self.last.map_or(0.0, |last| (now - last).max(0.0));
        self.last = Some(now);
        self.sample_fps(now);

        let frame_index = self.frame;
        let delta = if self.paused {
            0.0
        } else {
            self.elapsed += raw_delta;
            self.frame = self.frame.saturating_add(1);
            raw_delta
        };

        FrameTick {
            seconds: self.elapsed as f32,
            delta: delta as f32,
            frame_index,
            fps: self.fps,
        }
    }

    fn sample_fps(&mut self, now: f64) {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        self.window_frames += 1;
        let span = now - start;
        if span >= FPS_WINDOW {
            self.fps = (f64::from(self.window_frames) / span) as f32;
            self.window_frames = 0;
            self.window_start = Some(now);
        }
    }
}

/// Paces redraw requests when an FPS cap is configured.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FrameScheduler {
    /// A cap of `None`, zero, or a non-finite value disables pacing.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            last_frame: None,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// When the next frame is due, if pacing is active.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }
}
