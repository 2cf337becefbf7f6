//! Racers: simulated units of work with a variable duration.

use std::{fmt, time::Duration};

use rand::Rng;

use crate::{
    cancel::CancelToken,
    coordinator::{CoordinatorHandle, FinishOutcome},
    error::{Cancelled, CoordinatorGone},
};

/// How long a racer takes to reach the finish line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Sampled from the race's [`DelayRange`] when the race starts.
    Random,
    /// Always exactly this long.
    Fixed(Duration),
}

/// A racer entered into a race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrant {
    pub name: String,
    pub pace: Pace,
}

impl Entrant {
    pub fn new(name: impl Into<String>, pace: Pace) -> Self {
        Self {
            name: name.into(),
            pace,
        }
    }

    /// Determines how long this entrant will take, sampling from `range` if its pace is random.
    pub fn delay<R: Rng + ?Sized>(&self, range: &DelayRange, rng: &mut R) -> Duration {
        match self.pace {
            Pace::Random => range.sample(rng),
            Pace::Fixed(delay) => delay,
        }
    }
}

/// Inclusive bounds for randomly chosen racer delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    /// Creates a range from `min` to `max` (inclusive).
    ///
    /// Returns [`None`] if `min` is larger than `max`.
    pub fn new(min: Duration, max: Duration) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Picks a delay uniformly from the range, with nanosecond resolution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = nanos(self.min);
        let max = nanos(self.max);
        Duration::from_nanos(rng.gen_range(min..=max))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(8),
        }
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// How a racer's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacerOutcome {
    /// Crossed the finish line while the race was open.
    Finished { position: usize, elapsed: Duration },
    /// Crossed the finish line, but the race had already been closed.
    DidNotFinish { elapsed: Duration },
    /// Was cancelled while running and never reported a finish.
    Withdrew { elapsed: Duration },
}

impl RacerOutcome {
    pub fn position(&self) -> Option<usize> {
        match self {
            RacerOutcome::Finished { position, .. } => Some(*position),
            _ => None,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.position() == Some(1)
    }

    pub fn elapsed(&self) -> Duration {
        match *self {
            RacerOutcome::Finished { elapsed, .. }
            | RacerOutcome::DidNotFinish { elapsed }
            | RacerOutcome::Withdrew { elapsed } => elapsed,
        }
    }
}

impl From<FinishOutcome> for RacerOutcome {
    fn from(outcome: FinishOutcome) -> Self {
        match outcome {
            FinishOutcome::Finished { position, elapsed } => {
                RacerOutcome::Finished { position, elapsed }
            }
            FinishOutcome::DidNotFinish { elapsed } => RacerOutcome::DidNotFinish { elapsed },
        }
    }
}

/// A racer's status line, as printed at the end of its run.
pub struct Status<'a> {
    pub racer: &'a str,
    pub outcome: &'a RacerOutcome,
}

impl fmt::Display for Status<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let racer = self.racer;
        match *self.outcome {
            RacerOutcome::Finished {
                position: 1,
                elapsed,
            } => write!(
                f,
                "{racer} 🏆 finished in position 1 with a time of {elapsed:.2?}. They are the winner!"
            ),
            RacerOutcome::Finished { position, elapsed } => write!(
                f,
                "{racer} finished in position {position} with a time of {elapsed:.2?}."
            ),
            RacerOutcome::DidNotFinish { elapsed } => write!(
                f,
                "{racer} reached the line after the race was called off. They ran for {elapsed:.2?}."
            ),
            RacerOutcome::Withdrew { elapsed } => write!(
                f,
                "{racer} made a good attempt, but did not finish the race. They ran for {elapsed:.2?}."
            ),
        }
    }
}

/// Runs one racer: waits out `delay`, then reports to the coordinator.
///
/// The wait is cancellable through `cancel`. A cancelled racer withdraws without ever calling
/// [`CoordinatorHandle::record_finish`]. Otherwise the finish is reported exactly once, and the
/// coordinator's answer decides the outcome.
pub fn run_racer(
    name: &str,
    delay: Duration,
    coordinator: &CoordinatorHandle,
    cancel: &CancelToken,
) -> Result<RacerOutcome, CoordinatorGone> {
    let outcome = match cancel.sleep(delay) {
        Err(Cancelled) => RacerOutcome::Withdrew {
            elapsed: coordinator.clock().elapsed(),
        },
        Ok(()) => coordinator.record_finish(name)?.into(),
    };

    log::info!(
        "{}",
        Status {
            racer: name,
            outcome: &outcome
        }
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::{cancel::CancelSource, coordinator::Coordinator};

    use super::*;

    #[test]
    fn samples_stay_in_range() {
        let range = DelayRange::new(Duration::from_millis(10), Duration::from_millis(20)).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let d = range.sample(&mut rng);
            assert!(d >= range.min() && d <= range.max(), "{d:?} out of range");
        }
    }

    #[test]
    fn degenerate_range() {
        let d = Duration::from_millis(5);
        let range = DelayRange::new(d, d).unwrap();
        assert_eq!(range.sample(&mut rand::thread_rng()), d);
        assert_eq!(DelayRange::new(d, Duration::ZERO), None);
    }

    #[test]
    fn fixed_pace_ignores_range() {
        let entrant = Entrant::new("Bolt", Pace::Fixed(Duration::from_millis(3)));
        let delay = entrant.delay(&DelayRange::default(), &mut rand::thread_rng());
        assert_eq!(delay, Duration::from_millis(3));
    }

    #[test]
    fn racer_finishes() {
        let coordinator = Coordinator::builder(1).spawn().unwrap();
        let handle = coordinator.handle();
        let outcome = run_racer(
            "Zoom",
            Duration::from_millis(5),
            &handle,
            &CancelSource::new().token(),
        )
        .unwrap();
        assert!(outcome.is_winner());
        assert!(outcome.elapsed() >= Duration::from_millis(5));
        assert_eq!(handle.standings().unwrap().finish_order[0].racer, "Zoom");
    }

    #[test]
    fn cancelled_racer_withdraws_without_reporting() {
        let coordinator = Coordinator::builder(1).spawn().unwrap();
        let handle = coordinator.handle();
        let source = CancelSource::new();
        source.cancel();
        let outcome = run_racer("Zoom", Duration::from_secs(30), &handle, &source.token()).unwrap();
        assert!(matches!(outcome, RacerOutcome::Withdrew { .. }));
        let standings = handle.standings().unwrap();
        assert!(standings.finish_order.is_empty());
        assert!(standings.did_not_finish.is_empty());
    }

    #[test]
    fn racer_arriving_after_close_did_not_finish() {
        let coordinator = Coordinator::builder(1).spawn().unwrap();
        let handle = coordinator.handle();
        // Closing cancels the coordinator's own source, not the token given to the racer.
        handle.close_race("stopped").unwrap();
        let outcome = run_racer("Zoom", Duration::ZERO, &handle, &CancelSource::new().token()).unwrap();
        assert!(matches!(outcome, RacerOutcome::DidNotFinish { .. }));
        assert_eq!(handle.standings().unwrap().did_not_finish.len(), 1);
    }

    #[test]
    fn status_lines() {
        let winner = RacerOutcome::Finished {
            position: 1,
            elapsed: Duration::from_millis(1500),
        };
        let status = Status {
            racer: "Zoom",
            outcome: &winner,
        }
        .to_string();
        assert!(status.starts_with("Zoom 🏆 finished in position 1"), "{status}");

        let withdrew = RacerOutcome::Withdrew {
            elapsed: Duration::from_secs(5),
        };
        let status = Status {
            racer: "Blaze",
            outcome: &withdrew,
        }
        .to_string();
        assert!(status.contains("did not finish"), "{status}");
    }
}
