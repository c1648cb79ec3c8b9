use std::time::Duration;

/// Logical time snapshot handed to every callback of one scheduler wake.
///
/// All updates triggered by the same wake observe the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSnapshot {
    /// Total logical time since the scheduler started.
    pub elapsed: Duration,
    /// Time advanced by this wake.
    pub delta: Duration,
    /// Total number of wakes so far.
    pub tick: u64,
}

impl TimeSnapshot {
    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

/// Monotonic logical clock advanced once per scheduler wake.
#[derive(Debug, Default)]
pub struct SchedulerClock {
    elapsed: Duration,
    delta: Duration,
    tick: u64,
}

impl SchedulerClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `dt` and returns the snapshot for this wake.
    pub fn advance(&mut self, dt: Duration) -> TimeSnapshot {
        self.delta = dt;
        self.elapsed += dt;
        self.tick += 1;
        TimeSnapshot {
            elapsed: self.elapsed,
            delta: self.delta,
            tick: self.tick,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }
}
