//! The race coordinator: the single owner of "who finished, in what order".
//!
//! All race state lives on one [`Actor`] thread. [`CoordinatorHandle::record_finish`] and
//! [`CoordinatorHandle::close_race`] are messages to that thread, so they are totally ordered by
//! the order in which the thread receives them, no matter how many racers call in at once. A
//! racer never reads the finish order itself and then acts on it; it asks the coordinator and
//! gets told its position.

use std::{fmt, io, time::Duration};

use crate::{
    actor::{Actor, Mailbox},
    cancel::CancelSource,
    clock::RaceClock,
    error::CoordinatorGone,
    reply::{reply, Reply},
};

/// Reason used when the coordinator closes the race because everyone has finished.
pub const SETTLED_REASON: &str = "All racers have crossed the finish line.";

/// One admitted finisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishRecord {
    pub racer: String,
    /// 1-based finishing position, assigned in admission order.
    pub position: usize,
    pub elapsed: Duration,
}

/// A racer that reported a finish after the race had been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateArrival {
    pub racer: String,
    pub elapsed: Duration,
}

/// Why and when a race was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub reason: String,
    pub elapsed: Duration,
}

/// The coordinator's answer to [`CoordinatorHandle::record_finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The racer was admitted at `position`.
    Finished { position: usize, elapsed: Duration },
    /// The race had already been closed when the racer arrived.
    DidNotFinish { elapsed: Duration },
}

impl FinishOutcome {
    pub fn position(&self) -> Option<usize> {
        match self {
            FinishOutcome::Finished { position, .. } => Some(*position),
            FinishOutcome::DidNotFinish { .. } => None,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.position() == Some(1)
    }
}

/// A snapshot of the race state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Standings {
    /// Admitted finishers, in position order.
    pub finish_order: Vec<FinishRecord>,
    /// Finish reports that arrived after the race was closed, in arrival order.
    pub did_not_finish: Vec<LateArrival>,
    /// Set once the race has been closed.
    pub closure: Option<Closure>,
}

impl Standings {
    pub fn winner(&self) -> Option<&FinishRecord> {
        self.finish_order.first()
    }

    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }
}

enum Command {
    Finish {
        racer: String,
        reply: Reply<FinishOutcome>,
    },
    Close {
        reason: String,
        reply: Reply<bool>,
    },
    Standings {
        reply: Reply<Standings>,
    },
}

/// The state owned by the coordinator thread.
struct RaceState {
    standings: Standings,
    clock: RaceClock,
    field_size: usize,
    close_when_settled: bool,
    cancel: CancelSource,
}

impl RaceState {
    fn handle(&mut self, command: Command) {
        match command {
            Command::Finish { racer, reply } => {
                let outcome = self.admit(racer);
                reply.send(outcome);
            }
            Command::Close { reason, reply } => {
                let closed = self.close(reason);
                reply.send(closed);
            }
            Command::Standings { reply } => reply.send(self.standings.clone()),
        }
    }

    fn admit(&mut self, racer: String) -> FinishOutcome {
        let elapsed = self.clock.elapsed();
        if self.standings.is_closed() {
            self.standings
                .did_not_finish
                .push(LateArrival { racer, elapsed });
            return FinishOutcome::DidNotFinish { elapsed };
        }

        let finish_order = &mut self.standings.finish_order;
        assert!(
            finish_order.len() < self.field_size,
            "'{racer}' finished, but all {} racers have already finished",
            self.field_size,
        );
        assert!(
            finish_order.iter().all(|record| record.racer != racer),
            "'{racer}' crossed the finish line twice",
        );

        let position = finish_order.len() + 1;
        finish_order.push(FinishRecord {
            racer,
            position,
            elapsed,
        });

        if self.close_when_settled && position == self.field_size {
            self.close(SETTLED_REASON.into());
        }

        FinishOutcome::Finished { position, elapsed }
    }

    fn close(&mut self, reason: String) -> bool {
        if let Some(closure) = &self.standings.closure {
            log::debug!(
                "race already closed ({}), ignoring close request: {reason}",
                closure.reason
            );
            return false;
        }

        let elapsed = self.clock.elapsed();
        log::info!("{reason}");
        log::info!("The race went on for {elapsed:.2?}.");
        self.standings.closure = Some(Closure { reason, elapsed });
        self.cancel.cancel();
        true
    }
}

/// A builder object that can be used to configure and spawn a [`Coordinator`].
pub struct CoordinatorBuilder {
    field_size: usize,
    close_when_settled: bool,
    cancel: Option<CancelSource>,
    clock: Option<RaceClock>,
}

impl CoordinatorBuilder {
    /// Makes the coordinator close the race by itself once every racer has finished.
    ///
    /// Closing cancels the racers' group, which lets a timeout controller stop waiting early.
    pub fn close_when_settled(self, close_when_settled: bool) -> Self {
        Self {
            close_when_settled,
            ..self
        }
    }

    /// Sets the cancellation signal that closing the race will trigger.
    ///
    /// By default a fresh [`CancelSource`] is used, available via [`CoordinatorHandle::cancel_source`].
    pub fn cancel(self, cancel: CancelSource) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    /// Sets the clock elapsed times are measured with. By default, it is started on spawn.
    pub fn clock(self, clock: RaceClock) -> Self {
        Self {
            clock: Some(clock),
            ..self
        }
    }

    /// Spawns the coordinator thread.
    pub fn spawn(self) -> io::Result<Coordinator> {
        let clock = self.clock.unwrap_or_else(RaceClock::start);
        let cancel = self.cancel.unwrap_or_default();
        let mut state = RaceState {
            standings: Standings::default(),
            clock,
            field_size: self.field_size,
            close_when_settled: self.close_when_settled,
            cancel: cancel.clone(),
        };
        let actor = Actor::builder()
            .name("race-coordinator")
            .spawn(move |command| state.handle(command))?;
        let handle = CoordinatorHandle {
            mailbox: actor.mailbox(),
            clock,
            cancel,
        };
        Ok(Coordinator { actor, handle })
    }
}

/// Owner of the coordinator thread.
///
/// Dropping the [`Coordinator`] stops its thread. Outstanding [`CoordinatorHandle`]s then get
/// [`CoordinatorGone`]. If the thread panicked because an invariant was violated (a racer
/// finishing twice, or more finishers than entrants), the panic is propagated to the thread
/// dropping the [`Coordinator`].
pub struct Coordinator {
    actor: Actor<Command>,
    handle: CoordinatorHandle,
}

impl Coordinator {
    /// Returns a builder for a coordinator recording a race between `field_size` racers.
    pub fn builder(field_size: usize) -> CoordinatorBuilder {
        CoordinatorBuilder {
            field_size,
            close_when_settled: false,
            cancel: None,
            clock: None,
        }
    }

    /// Returns a handle that racers and the timeout controller can call into.
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

/// A cloneable handle to a [`Coordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    mailbox: Mailbox<Command>,
    clock: RaceClock,
    cancel: CancelSource,
}

impl CoordinatorHandle {
    /// Reports that `racer` crossed the finish line.
    ///
    /// If the race is still open, the racer is admitted at the next position. If it was already
    /// closed when this call is processed, the racer did not finish, and the finish order is not
    /// changed.
    pub fn record_finish(&self, racer: impl Into<String>) -> Result<FinishOutcome, CoordinatorGone> {
        let (reply, pending) = reply();
        let racer = racer.into();
        self.mailbox
            .send(Command::Finish { racer, reply })
            .map_err(|_| CoordinatorGone)?;
        pending.wait().map_err(|_| CoordinatorGone)
    }

    /// Closes the race, recording `reason`, and cancels the racers that are still running.
    ///
    /// Returns `true` if this call closed the race, and `false` if it was already closed (in which
    /// case nothing changes). When this returns, the closure is in effect: every later
    /// [`CoordinatorHandle::record_finish`] call will see the race as closed.
    pub fn close_race(&self, reason: impl Into<String>) -> Result<bool, CoordinatorGone> {
        let (reply, pending) = reply();
        let reason = reason.into();
        self.mailbox
            .send(Command::Close { reason, reply })
            .map_err(|_| CoordinatorGone)?;
        pending.wait().map_err(|_| CoordinatorGone)
    }

    /// Returns a snapshot of the current standings.
    pub fn standings(&self) -> Result<Standings, CoordinatorGone> {
        let (reply, pending) = reply();
        self.mailbox
            .send(Command::Standings { reply })
            .map_err(|_| CoordinatorGone)?;
        pending.wait().map_err(|_| CoordinatorGone)
    }

    /// The clock the race is timed with.
    #[inline]
    pub fn clock(&self) -> RaceClock {
        self.clock
    }

    /// The cancellation signal triggered when the race is closed.
    pub fn cancel_source(&self) -> CancelSource {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        panic::{catch_unwind, AssertUnwindSafe},
        sync::{Arc, Barrier},
        thread,
    };

    use super::*;

    /// Calls `record_finish` from `n` threads released at the same instant.
    fn stampede(handle: &CoordinatorHandle, n: usize) -> Vec<FinishOutcome> {
        let barrier = Arc::new(Barrier::new(n));
        let threads: Vec<_> = (0..n)
            .map(|i| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    handle.record_finish(format!("racer-{i}")).unwrap()
                })
            })
            .collect();
        threads.into_iter().map(|t| t.join().unwrap()).collect()
    }

    #[test]
    fn concurrent_finishes_get_distinct_positions() {
        for n in [1, 2, 7, 64] {
            let coordinator = Coordinator::builder(n).spawn().unwrap();
            let outcomes = stampede(&coordinator.handle(), n);
            let positions: BTreeSet<_> = outcomes.iter().filter_map(|o| o.position()).collect();
            assert_eq!(positions, (1..=n).collect::<BTreeSet<_>>());
            assert_eq!(outcomes.iter().filter(|o| o.is_winner()).count(), 1);

            let standings = coordinator.handle().standings().unwrap();
            assert_eq!(standings.finish_order.len(), n);
            for (i, record) in standings.finish_order.iter().enumerate() {
                assert_eq!(record.position, i + 1);
            }
        }
    }

    #[test]
    fn simultaneous_pair_has_one_winner() {
        for _ in 0..1000 {
            let coordinator = Coordinator::builder(2).spawn().unwrap();
            let outcomes = stampede(&coordinator.handle(), 2);
            let mut positions: Vec<_> = outcomes.iter().filter_map(|o| o.position()).collect();
            positions.sort_unstable();
            assert_eq!(positions, [1, 2]);
        }
    }

    #[test]
    fn finishes_after_close_do_not_count() {
        let coordinator = Coordinator::builder(3).spawn().unwrap();
        let handle = coordinator.handle();
        assert!(handle.record_finish("Zoom").unwrap().is_winner());
        assert!(handle.close_race("stopped").unwrap());
        assert!(handle.cancel_source().is_cancelled());

        for racer in ["Bolt", "Flash"] {
            assert!(matches!(
                handle.record_finish(racer).unwrap(),
                FinishOutcome::DidNotFinish { .. }
            ));
        }

        let standings = handle.standings().unwrap();
        assert_eq!(standings.finish_order.len(), 1);
        assert_eq!(standings.winner().unwrap().racer, "Zoom");
        let late: Vec<_> = standings
            .did_not_finish
            .iter()
            .map(|l| l.racer.as_str())
            .collect();
        assert_eq!(late, ["Bolt", "Flash"]);
        assert_eq!(standings.closure.unwrap().reason, "stopped");
    }

    #[test]
    fn concurrent_closes_take_effect_once() {
        let coordinator = Coordinator::builder(4).spawn().unwrap();
        let handle = coordinator.handle();
        handle.record_finish("Zoom").unwrap();
        handle.record_finish("Bolt").unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let closers: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    handle.close_race(format!("closer {i}")).unwrap()
                })
            })
            .collect();
        let effective = closers
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|closed| *closed)
            .count();
        assert_eq!(effective, 1);

        let standings = handle.standings().unwrap();
        assert_eq!(standings.finish_order.len(), 2);
        assert!(standings.closure.unwrap().reason.starts_with("closer "));
    }

    #[test]
    fn settled_race_closes_itself() {
        let cancel = CancelSource::new();
        let coordinator = Coordinator::builder(2)
            .close_when_settled(true)
            .cancel(cancel.clone())
            .spawn()
            .unwrap();
        let handle = coordinator.handle();
        handle.record_finish("Zoom").unwrap();
        assert!(!cancel.is_cancelled());
        handle.record_finish("Bolt").unwrap();
        assert!(cancel.is_cancelled());
        assert_eq!(
            handle.standings().unwrap().closure.unwrap().reason,
            SETTLED_REASON
        );
        assert!(!handle.close_race("too late").unwrap());
    }

    #[test]
    fn elapsed_times_do_not_decrease() {
        let coordinator = Coordinator::builder(5).spawn().unwrap();
        stampede(&coordinator.handle(), 5);
        let standings = coordinator.handle().standings().unwrap();
        for pair in standings.finish_order.windows(2) {
            assert!(pair[0].elapsed <= pair[1].elapsed);
        }
    }

    #[test]
    fn double_finish_is_fatal() {
        let coordinator = Coordinator::builder(3).spawn().unwrap();
        let handle = coordinator.handle();
        handle.record_finish("Zoom").unwrap();
        assert_eq!(handle.record_finish("Zoom"), Err(CoordinatorGone));
        assert_eq!(handle.close_race("stopped"), Err(CoordinatorGone));
        catch_unwind(AssertUnwindSafe(|| drop(coordinator))).unwrap_err();
    }

    #[test]
    fn overfull_field_is_fatal() {
        let coordinator = Coordinator::builder(1).spawn().unwrap();
        let handle = coordinator.handle();
        handle.record_finish("Zoom").unwrap();
        assert_eq!(handle.record_finish("Bolt"), Err(CoordinatorGone));
        catch_unwind(AssertUnwindSafe(|| drop(coordinator))).unwrap_err();
    }

    #[test]
    fn handles_fail_after_shutdown() {
        let coordinator = Coordinator::builder(1).spawn().unwrap();
        let handle = coordinator.handle();
        drop(coordinator);
        assert_eq!(handle.record_finish("Zoom"), Err(CoordinatorGone));
        assert_eq!(handle.standings(), Err(CoordinatorGone));
    }
}
