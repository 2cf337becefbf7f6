//! Error types.
//!
//! Most things that can "go wrong" during a race are not errors at all: a racer that arrives after
//! the race was closed gets a [`FinishOutcome::DidNotFinish`], and a racer that gets cancelled
//! [`Withdrew`]. The types here cover the remaining cases.
//!
//! [`FinishOutcome::DidNotFinish`]: crate::FinishOutcome::DidNotFinish
//! [`Withdrew`]: crate::RacerOutcome::Withdrew

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Returned by [`CancelToken::sleep`] when the sleep was interrupted by cancellation.
///
/// [`CancelToken::sleep`]: crate::CancelToken::sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// The coordinator thread has exited, so no outcome can be obtained from it.
///
/// This only happens after the coordinator has panicked (an internal invariant was violated) or
/// after its owner has shut it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the race coordinator is no longer running")]
pub struct CoordinatorGone;

/// An error preventing a race from being run to completion.
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("a race needs at least one racer")]
    NoRacers,
    #[error("racer '{0}' was entered more than once")]
    DuplicateRacer(String),
    #[error("racer name {0:?} contains a NUL byte")]
    InvalidRacerName(String),
    #[error("minimum delay {min:?} is larger than maximum delay {max:?}")]
    InvalidDelayRange { min: Duration, max: Duration },
    #[error("failed to spawn thread '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    CoordinatorGone(#[from] CoordinatorGone),
}

/// A line could not be appended to the log file.
#[derive(Debug, Error)]
#[error("failed to append to log file '{}'", .path.display())]
pub struct LogError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Errors reported by the file and subprocess utilities.
#[derive(Debug, Error)]
pub enum UtilError {
    #[error("'{}' does not exist", .0.display())]
    ResourceMissing(PathBuf),
    #[error("failed to read '{}'", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch '{}'", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn thread for '{label}'")]
    Spawn {
        label: String,
        #[source]
        source: io::Error,
    },
}
