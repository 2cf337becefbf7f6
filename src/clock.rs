//! Time measurement.

use std::time::{Duration, Instant, SystemTime};

/// A monotonic clock started when a race begins.
///
/// Every elapsed time reported during a race (finishes, late arrivals, the closure) is measured
/// from the same start instant, which never changes after creation.
#[derive(Debug, Clone, Copy)]
pub struct RaceClock {
    start: Instant,
}

impl RaceClock {
    /// Starts a clock at the current instant.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the instant this clock was started at.
    #[inline]
    pub fn started_at(&self) -> Instant {
        self.start
    }

    /// Returns the time elapsed since the clock was started.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    /// Returns the time between the clock's start and `now`.
    ///
    /// Instants before the start are clamped to a duration of zero.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }
}

/// Formats the time of day of `now` as `HH:MM:SS` (UTC).
pub fn time_of_day(now: SystemTime) -> String {
    let secs = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
