//! Running a whole race: racers, a timeout, and the coordinator between them.

use std::{collections::HashSet, fmt, time::Duration};

use crate::{
    cancel::{CancelSource, CancelToken},
    clock::RaceClock,
    coordinator::{Closure, Coordinator, CoordinatorHandle, FinishRecord, LateArrival},
    error::{Cancelled, CoordinatorGone, RaceError},
    racer::{run_racer, DelayRange, Entrant, Pace, RacerOutcome, Status},
    task::{self, TaskGroup},
};

/// The field entered when no racers are configured explicitly.
pub const DEFAULT_RACERS: [&str; 5] = ["Zoom", "Bolt", "Flash", "Speedster", "Blaze"];

/// Reason recorded when the timeout stops a race.
pub const DEFAULT_STOP_REASON: &str =
    "⚡️ Lightning was spotted! The race is stopped due to severe weather.";

/// Default time after which a race is stopped.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the timeout controller ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// The timeout expired and the controller asked the coordinator to close the race.
    /// `closed` tells whether that request was the one that closed it.
    Fired { closed: bool },
    /// The race was closed before the timeout expired, so the controller stood down.
    Preempted,
}

/// Waits for `timeout`, then closes the race.
///
/// The wait is cut short if `cancel` is cancelled, which happens when the race has already been
/// closed some other way.
pub fn run_timeout(
    timeout: Duration,
    reason: &str,
    coordinator: &CoordinatorHandle,
    cancel: &CancelToken,
) -> Result<TimeoutOutcome, CoordinatorGone> {
    match cancel.sleep(timeout) {
        Ok(()) => {
            let closed = coordinator.close_race(reason)?;
            Ok(TimeoutOutcome::Fired { closed })
        }
        Err(Cancelled) => Ok(TimeoutOutcome::Preempted),
    }
}

/// Entry point for configuring and running a race.
pub struct Race;

impl Race {
    /// Returns a builder with no racers, random delays between 1 and 8 seconds, and a 5 second
    /// timeout.
    #[inline]
    pub fn builder() -> RaceBuilder {
        RaceBuilder {
            entrants: Vec::new(),
            delays: DelayRange::default(),
            invalid_delays: None,
            timeout: DEFAULT_TIMEOUT,
            reason: DEFAULT_STOP_REASON.into(),
            close_when_settled: false,
        }
    }
}

/// A builder object that configures a race and runs it.
#[derive(Debug, Clone)]
pub struct RaceBuilder {
    entrants: Vec<Entrant>,
    delays: DelayRange,
    invalid_delays: Option<(Duration, Duration)>,
    timeout: Duration,
    reason: String,
    close_when_settled: bool,
}

impl RaceBuilder {
    /// Enters a racer whose delay is sampled from the delay range.
    pub fn racer<N: Into<String>>(mut self, name: N) -> Self {
        self.entrants.push(Entrant::new(name, Pace::Random));
        self
    }

    /// Enters several racers with random delays.
    pub fn racers<I, N>(self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        names.into_iter().fold(self, |b, name| b.racer(name))
    }

    /// Enters a racer that always takes exactly `delay`.
    pub fn racer_with_delay<N: Into<String>>(mut self, name: N, delay: Duration) -> Self {
        self.entrants.push(Entrant::new(name, Pace::Fixed(delay)));
        self
    }

    /// Sets the inclusive range random delays are sampled from.
    pub fn delay_range(self, min: Duration, max: Duration) -> Self {
        match DelayRange::new(min, max) {
            Some(delays) => Self {
                delays,
                invalid_delays: None,
                ..self
            },
            None => Self {
                invalid_delays: Some((min, max)),
                ..self
            },
        }
    }

    /// Sets the time after which the race is stopped.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Sets the reason recorded when the timeout stops the race.
    pub fn stop_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            reason: reason.into(),
            ..self
        }
    }

    /// Ends the race as soon as every racer has finished, instead of waiting for the timeout.
    pub fn close_when_settled(self, close_when_settled: bool) -> Self {
        Self {
            close_when_settled,
            ..self
        }
    }

    fn validate(&self) -> Result<(), RaceError> {
        if self.entrants.is_empty() {
            return Err(RaceError::NoRacers);
        }
        if let Some((min, max)) = self.invalid_delays {
            return Err(RaceError::InvalidDelayRange { min, max });
        }
        let mut seen = HashSet::new();
        for entrant in &self.entrants {
            if entrant.name.contains('\0') {
                return Err(RaceError::InvalidRacerName(entrant.name.clone()));
            }
            if !seen.insert(entrant.name.as_str()) {
                return Err(RaceError::DuplicateRacer(entrant.name.clone()));
            }
        }
        Ok(())
    }

    /// Runs the race and blocks until every racer and the timeout controller are done.
    pub fn run(self) -> Result<RaceReport, RaceError> {
        self.validate()?;

        let mut rng = rand::thread_rng();
        let delays: Vec<Duration> = self
            .entrants
            .iter()
            .map(|entrant| entrant.delay(&self.delays, &mut rng))
            .collect();

        let clock = RaceClock::start();
        let cancel = CancelSource::new();
        let coordinator = Coordinator::builder(self.entrants.len())
            .close_when_settled(self.close_when_settled)
            .cancel(cancel.clone())
            .clock(clock)
            .spawn()
            .map_err(|source| RaceError::Spawn {
                name: "race-coordinator".into(),
                source,
            })?;

        log::info!(
            "We have {} contestants running in the event. Let's see who is the fastest runner.",
            self.entrants.len()
        );
        log::info!("... and they're off and running!");

        let mut group = TaskGroup::with_cancel(cancel.clone());
        for (entrant, delay) in self.entrants.iter().zip(delays) {
            let name = entrant.name.clone();
            let handle = coordinator.handle();
            group
                .spawn(entrant.name.clone(), move |token| {
                    run_racer(&name, delay, &handle, &token)
                })
                .map_err(|source| RaceError::Spawn {
                    name: entrant.name.clone(),
                    source,
                })?;
        }

        let handle = coordinator.handle();
        let token = cancel.token();
        let timeout = self.timeout;
        let reason = self.reason;
        let timer = task::spawn("race-timeout", move || {
            run_timeout(timeout, &reason, &handle, &token)
        })
        .map_err(|source| RaceError::Spawn {
            name: "race-timeout".into(),
            source,
        })?;

        let results = group.join_all();
        let timeout = timer.join()?;
        let standings = coordinator.handle().standings()?;
        drop(coordinator);

        let outcomes = results
            .into_iter()
            .map(|(racer, outcome)| outcome.map(|outcome| (racer, outcome)))
            .collect::<Result<Vec<_>, CoordinatorGone>>()?;

        Ok(RaceReport {
            outcomes,
            finish_order: standings.finish_order,
            did_not_finish: standings.did_not_finish,
            closure: standings.closure,
            timeout,
        })
    }
}

/// The results of a completed race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceReport {
    /// Every entrant's outcome, in entry order.
    pub outcomes: Vec<(String, RacerOutcome)>,
    /// Admitted finishers, in position order.
    pub finish_order: Vec<FinishRecord>,
    /// Racers that reported a finish after the race was closed.
    pub did_not_finish: Vec<LateArrival>,
    pub closure: Option<Closure>,
    pub timeout: TimeoutOutcome,
}

impl RaceReport {
    pub fn winner(&self) -> Option<&FinishRecord> {
        self.finish_order.first()
    }

    /// Returns the outcome of the racer called `racer`.
    pub fn outcome(&self, racer: &str) -> Option<&RacerOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == racer)
            .map(|(_, outcome)| outcome)
    }

    /// Returns the names of the racers that were cancelled before finishing.
    pub fn withdrawn(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            RacerOutcome::Withdrew { .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for RaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results:")?;
        for record in &self.finish_order {
            writeln!(
                f,
                "  {:>2}. {:<12} {:.2?}",
                record.position, record.racer, record.elapsed
            )?;
        }
        for (racer, outcome) in &self.outcomes {
            if outcome.position().is_none() {
                writeln!(f, "  {}", Status { racer, outcome })?;
            }
        }
        match &self.closure {
            Some(closure) => write!(
                f,
                "Race closed after {:.2?}: {}",
                closure.elapsed, closure.reason
            ),
            None => write!(f, "Race was never closed."),
        }
    }
}
