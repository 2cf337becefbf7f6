//! Running external programs to completion.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
    time::Duration,
};

use crate::{
    clock::RaceClock,
    error::UtilError,
    task::{self, Task},
};

/// Turns an executable location into a path. `file://` URLs are accepted as well as plain paths.
pub fn resolve_executable(location: &str) -> PathBuf {
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

/// Runs `executable` with `args` and blocks until it exits.
///
/// The child inherits stdin, stdout and stderr. A missing executable is reported as
/// [`UtilError::ResourceMissing`] without attempting to launch it.
pub fn run_to_completion<S: AsRef<OsStr>>(
    executable: &Path,
    args: &[S],
) -> Result<ExitStatus, UtilError> {
    if !executable.exists() {
        return Err(UtilError::ResourceMissing(executable.to_path_buf()));
    }

    Command::new(executable)
        .args(args)
        .status()
        .map_err(|source| UtilError::Launch {
            path: executable.to_path_buf(),
            source,
        })
}

/// One command entered into [`race_commands`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub label: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

/// How long one command of [`race_commands`] took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTiming {
    pub label: String,
    pub elapsed: Duration,
    pub status: ExitStatus,
}

/// Runs all `commands` concurrently, one [`Task`] each, and times them.
///
/// Results are returned in the order the commands were given. If any command fails to launch,
/// the first such error is returned, after all other commands have run to completion.
pub fn race_commands(commands: Vec<CommandSpec>) -> Result<Vec<CommandTiming>, UtilError> {
    let clock = RaceClock::start();
    let mut tasks = Vec::with_capacity(commands.len());
    for command in commands {
        let label = command.label.clone();
        let task = task::spawn(command.label.clone(), move || -> Result<_, UtilError> {
            log::info!("Started '{}'...", command.label);
            let status = run_to_completion(&command.executable, &command.args)?;
            let elapsed = clock.elapsed();
            log::info!("'{}' completed after {elapsed:.2?}", command.label);
            Ok(CommandTiming {
                label: command.label,
                elapsed,
                status,
            })
        })
        .map_err(|source| UtilError::Spawn { label, source })?;
        tasks.push(task);
    }

    // Join everything before looking at the results, so no command is left running.
    let results: Vec<_> = tasks.into_iter().map(Task::join).collect();
    results.into_iter().collect()
}

/// Returns the command that completed first.
pub fn fastest(timings: &[CommandTiming]) -> Option<&CommandTiming> {
    timings.iter().min_by_key(|timing| timing.elapsed)
}
