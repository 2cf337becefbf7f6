use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use photofinish::{
    files::summarize_file,
    process::{fastest, race_commands, resolve_executable, run_to_completion, CommandSpec},
    race::{DEFAULT_RACERS, DEFAULT_STOP_REASON},
    FileLog, Race, UtilError,
};
use rand::Rng;

#[derive(Parser)]
#[clap(name = "photofinish", version, about = "Races threads against each other")]
struct Opts {
    /// File that log lines are appended to.
    #[clap(long, default_value = "photofinish.log")]
    log_file: PathBuf,
    /// Most verbose level to log (off, error, warn, info, debug, trace).
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Runs a race between concurrent racers.
    Race(RaceArgs),
    /// Prints the size of a file.
    Summarize { file: PathBuf },
    /// Runs an executable and waits for it to exit.
    Run {
        /// Path or file:// URL of the executable.
        executable: String,
        /// Arguments passed to the executable, including ones starting with `-`.
        #[clap(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Races `sleep` subprocesses with random durations against each other.
    SleepRace {
        #[clap(long, default_value_t = 3)]
        count: usize,
        #[clap(long, default_value_t = 3)]
        min_secs: u64,
        #[clap(long, default_value_t = 10)]
        max_secs: u64,
    },
}

#[derive(clap::Args)]
struct RaceArgs {
    /// Comma-separated racer names.
    #[clap(long, value_delimiter = ',')]
    racers: Vec<String>,
    #[clap(long, default_value_t = 1000)]
    min_delay_ms: u64,
    #[clap(long, default_value_t = 8000)]
    max_delay_ms: u64,
    /// Time after which the race is stopped.
    #[clap(long, default_value_t = 5000)]
    timeout_ms: u64,
    /// Stop as soon as every racer has finished.
    #[clap(long)]
    close_when_settled: bool,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    FileLog::new(&opts.log_file)
        .level(opts.log_level)
        .install()
        .context("failed to install logger")?;

    match opts.command {
        Cmd::Race(args) => race(args),
        Cmd::Summarize { file } => {
            match summarize_file(&file) {
                Ok(summary) => log::info!("{summary}"),
                Err(UtilError::ResourceMissing(path)) => log::warn!(
                    "It was requested to summarize file '{}' but this file does not exist.",
                    path.display()
                ),
                Err(e) => log::error!("{:#}", anyhow::Error::new(e)),
            }
            Ok(())
        }
        Cmd::Run { executable, args } => {
            let path = resolve_executable(&executable);
            match run_to_completion(&path, &args) {
                Ok(status) if status.success() => {}
                Ok(status) => log::warn!("'{executable}' exited with {status}"),
                Err(e) => log::error!("{:#}", anyhow::Error::new(e)),
            }
            Ok(())
        }
        Cmd::SleepRace {
            count,
            min_secs,
            max_secs,
        } => sleep_race(count, min_secs, max_secs),
    }
}

fn race(args: RaceArgs) -> anyhow::Result<()> {
    let racers = if args.racers.is_empty() {
        DEFAULT_RACERS.iter().map(|s| s.to_string()).collect()
    } else {
        args.racers
    };

    log::info!("📢 Welcome to the 42nd annual Track & Field competition.");
    let report = Race::builder()
        .racers(racers)
        .delay_range(
            Duration::from_millis(args.min_delay_ms),
            Duration::from_millis(args.max_delay_ms),
        )
        .timeout(Duration::from_millis(args.timeout_ms))
        .stop_reason(DEFAULT_STOP_REASON)
        .close_when_settled(args.close_when_settled)
        .run()
        .context("race could not be run")?;

    println!();
    println!("{report}");
    Ok(())
}

fn sleep_race(count: usize, min_secs: u64, max_secs: u64) -> anyhow::Result<()> {
    if min_secs > max_secs {
        anyhow::bail!("--min-secs ({min_secs}) is larger than --max-secs ({max_secs})");
    }

    let mut rng = rand::thread_rng();
    let commands = (1..=count)
        .map(|i| {
            let secs = rng.gen_range(min_secs..=max_secs);
            CommandSpec {
                label: format!("sleep #{i} ({secs}s)"),
                executable: PathBuf::from("/bin/sleep"),
                args: vec![secs.to_string()],
            }
        })
        .collect();

    match race_commands(commands) {
        Ok(timings) => {
            if let Some(winner) = fastest(&timings) {
                log::info!("The '{}' task won the race!", winner.label);
            }
        }
        Err(e) => log::error!("{:#}", anyhow::Error::new(e)),
    }
    Ok(())
}
