use std::time::{Duration, Instant};

/// Time source for the behaviour timers.
///
/// Timestamps are durations since the clock's own epoch. The flock calls
/// [`Clock::advance_frame`] once at the start of every update, which lets a
/// clock tie time to frames instead of the wall.
pub trait Clock {
    fn now(&self) -> Duration;

    fn advance_frame(&mut self) {}
}

/// Wall clock, state durations follow real elapsed time regardless of the
/// frame rate.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Advances by a fixed step per frame, so a replay with the same seed sees
/// identical timers no matter how fast frames are produced.
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: Duration,
    now: Duration,
}

impl FrameClock {
    pub fn new(step: Duration) -> Self {
        FrameClock {
            step,
            now: Duration::ZERO,
        }
    }

    /// 60 frames per second
    pub fn sixty_fps() -> Self {
        FrameClock::new(Duration::from_micros(16_667))
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

impl Clock for FrameClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn advance_frame(&mut self) {
        self.now = self.now.saturating_add(self.step);
    }
}

/// Only moves when told to
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn advance(&mut self, by: Duration) {
        self.now = self.now.saturating_add(by);
    }

    pub fn set(&mut self, now: Duration) {
        self.now = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }
}
