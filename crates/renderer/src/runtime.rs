use std::time::{Duration, Instant};

use crate::projection::{Projection, Viewport};
use crate::types::MIN_SCALE;

/// Value handed to `u_time` for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    pub seconds: f32,
}

/// Where the preview clock reads from.
///
/// The window uses the monotonic clock; offscreen renders pin the time so a
/// `u_time`-dependent frame is reproducible.
pub trait TimeSource {
    fn sample(&self) -> TimeSample;
}

/// Seconds since the preview started. Shader reloads do not restart it.
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
    fn sample(&self) -> TimeSample {
        TimeSample {
            seconds: self.origin.elapsed().as_secs_f32(),
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimeSource {
    seconds: f32,
}

impl FixedTimeSource {
    pub fn new(seconds: f32) -> Self {
        Self { seconds }
    }

    pub fn set(&mut self, seconds: f32) {
        self.seconds = seconds;
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&self) -> TimeSample {
        TimeSample {
            seconds: self.seconds,
        }
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource>;

/// Per-frame inputs: zoom, clock and framebuffer size.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    scale: f32,
    elapsed: f32,
    size: (u32, u32),
    projection: Projection,
}

impl FrameState {
    pub fn new(size: (u32, u32), scale: f32) -> Self {
        let viewport = Viewport::from_size(size.0, size.1);
        Self {
            scale: scale.max(MIN_SCALE),
            elapsed: 0.0,
            size,
            projection: Projection::ortho(viewport),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::from_size(self.size.0, self.size.1)
    }

    pub fn set_elapsed(&mut self, sample: TimeSample) {
        self.elapsed = sample.seconds;
    }

    /// Records a new framebuffer size and recomputes the projection.
    ///
    /// Returns `false` when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.size == (width, height) {
            return false;
        }
        self.size = (width, height);
        self.projection = Projection::ortho(self.viewport());
        true
    }

    pub fn zoom_in(&mut self, step: f32) {
        self.scale += step;
    }

    /// Shrinks the scale by `step`, never below [`MIN_SCALE`].
    pub fn zoom_out(&mut self, step: f32) {
        self.scale = (self.scale - step).max(MIN_SCALE);
    }
}

/// Frames-per-second counter reported once per interval.
#[derive(Debug)]
pub struct FrameStats {
    window_start: Instant,
    frames: u32,
    interval: Duration,
}

impl FrameStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            interval,
        }
    }

    /// Counts one presented frame; yields the rate when an interval closes.
    pub fn record(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let span = now.saturating_duration_since(self.window_start);
        if span < self.interval {
            return None;
        }
        let fps = self.frames as f32 / span.as_secs_f32();
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}
