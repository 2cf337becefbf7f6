//! A race between threads, with exactly one winner.
//!
//! This library simulates a race: every racer is a thread that takes a random amount of time to
//! reach the finish line, and a single coordinator decides who finished in which position. A
//! timeout closes the race and cancels everyone still running.
//!
//! The interesting part is getting "who finished first" right. If two racers reach the line at
//! the same instant and each of them *looks at* the finish order to figure out its own position,
//! both can see an empty list and both can declare themselves the winner. Here, racers never look.
//! They send a message to the coordinator, an actor thread that owns the finish order, and the
//! coordinator tells them their position.
//!
//! # Overview
//!
//! ## Structured concurrency
//!
//! Every thread in this crate is *owned*. [`Task`]s and [`TaskGroup`]s join their threads when
//! they are dropped, and an [`Actor`] stops and joins its thread when it is dropped. If the
//! thread has panicked, the panic is forwarded to the owner, as if it had performed the work
//! directly.
//!
//! ## Cancellation
//!
//! A [`TaskGroup`] hands each child a [`CancelToken`]. Children block in
//! [`CancelToken::sleep`], which returns early with [`Cancelled`] once the group is cancelled.
//! Cancelling never kills a thread; it asks, and the group still waits for every child.
//!
//! ## The race
//!
//! [`Race::builder`] configures the field. [`RaceBuilder::run`] spawns the [`Coordinator`], one
//! task per racer and one timeout controller, waits for all of them, and returns a
//! [`RaceReport`].
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use photofinish::{Race, RacerOutcome};
//!
//! let report = Race::builder()
//!     .racer_with_delay("Zoom", Duration::from_millis(10))
//!     .racer_with_delay("Bolt", Duration::from_secs(30))
//!     .timeout(Duration::from_millis(300))
//!     .run()?;
//!
//! assert_eq!(report.winner().unwrap().racer, "Zoom");
//! assert!(matches!(report.outcome("Bolt"), Some(RacerOutcome::Withdrew { .. })));
//! # Ok::<(), photofinish::RaceError>(())
//! ```
//!
//! The coordinator can also be used directly:
//!
//! ```
//! use photofinish::{Coordinator, FinishOutcome};
//!
//! let coordinator = Coordinator::builder(2).spawn().unwrap();
//! let handle = coordinator.handle();
//!
//! assert!(handle.record_finish("Zoom").unwrap().is_winner());
//! handle.close_race("stopped early").unwrap();
//! assert!(matches!(
//!     handle.record_finish("Bolt").unwrap(),
//!     FinishOutcome::DidNotFinish { .. }
//! ));
//! ```

pub mod actor;
pub mod cancel;
pub mod clock;
pub mod coordinator;
mod error;
pub mod files;
pub mod log_file;
pub mod process;
pub mod race;
pub mod racer;
mod reply;
pub mod sync;
pub mod task;

pub use crate::{
    actor::{Actor, ActorBuilder, Mailbox},
    cancel::{CancelSource, CancelToken},
    clock::RaceClock,
    coordinator::{
        Closure, Coordinator, CoordinatorBuilder, CoordinatorHandle, FinishOutcome, FinishRecord,
        LateArrival, Standings,
    },
    error::{Cancelled, CoordinatorGone, LogError, RaceError, UtilError},
    log_file::FileLog,
    race::{Race, RaceBuilder, RaceReport, TimeoutOutcome},
    racer::{DelayRange, Entrant, Pace, RacerOutcome},
    task::{Task, TaskGroup},
};
