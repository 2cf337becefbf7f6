//! An append-only, timestamped log file, usable as the [`log`] backend.
//!
//! Each message becomes one line of the form `HH:MM:SS: message`. The file is created the first
//! time something is written to it, and only ever appended to.

use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    thread,
    time::SystemTime,
};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::{clock::time_of_day, error::LogError, sync::Mutex};

/// A timestamped log file.
///
/// Timestamps are the UTC time of day, not local time.
///
/// When installed as the global logger (see [`FileLog::install`]), every record is also echoed to
/// stdout, prefixed with the name of the thread that logged it. Failing to write the file is
/// reported on stderr and otherwise ignored; logging never takes the program down.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    level: LevelFilter,
    echo: bool,
    /// Serializes appends, so lines from different threads never interleave.
    write_lock: Mutex<()>,
}

impl FileLog {
    /// Creates a logger writing to `path`. Nothing is touched on disk until the first write.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            level: LevelFilter::Info,
            echo: true,
            write_lock: Mutex::new(()),
        }
    }

    /// Sets the most verbose level that will be recorded.
    pub fn level(self, level: LevelFilter) -> Self {
        Self { level, ..self }
    }

    /// Sets whether records are echoed to stdout in addition to being written to the file.
    pub fn echo(self, echo: bool) -> Self {
        Self { echo, ..self }
    }

    /// Appends `message` as a single timestamped line, creating the file if needed.
    pub fn append(&self, message: &str) -> Result<(), LogError> {
        let line = format!("{}: {message}\n", time_of_day(SystemTime::now()));
        let _guard = self.write_lock.lock();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                file.write_all(line.as_bytes())?;
                file.flush()
            })
            .map_err(|source| LogError {
                path: self.path.clone(),
                source,
            })
    }

    /// Installs this as the global [`log`] backend.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for FileLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = record.args().to_string();
        if self.echo {
            let thread = thread::current();
            let name = thread.name().unwrap_or("<unnamed>");
            println!("[{name}] {message}");
        }
        if let Err(e) = self.append(&message) {
            eprintln!("{e}: {}", e.source);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use std::{env, fs, process};

    use log::Level;

    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("photofinish-{}-{name}.log", process::id()))
    }

    #[test]
    fn creates_and_appends() {
        let path = scratch_path("append");
        fs::remove_file(&path).ok();

        let logger = FileLog::new(&path);
        assert!(!path.exists());
        logger.append("first").unwrap();
        logger.append("second").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for (line, message) in lines.iter().zip(["first", "second"]) {
            // "HH:MM:SS: message"
            assert_eq!(&line[2..3], ":");
            assert_eq!(&line[8..10], ": ");
            assert_eq!(&line[10..], message);
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn reports_unwritable_path() {
        let path = scratch_path("missing-dir").join("nested.log");
        let err = FileLog::new(&path).append("lost").unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn logging_to_unwritable_path_carries_on() {
        let path = scratch_path("missing-dir").join("nested.log");
        let logger = FileLog::new(&path).echo(false);
        for message in ["first", "second"] {
            logger.log(
                &Record::builder()
                    .level(Level::Error)
                    .args(format_args!("{message}"))
                    .build(),
            );
        }
        assert!(!path.exists());
    }

    #[test]
    fn respects_level() {
        let path = scratch_path("level");
        fs::remove_file(&path).ok();

        let logger = FileLog::new(&path).level(LevelFilter::Warn).echo(false);
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("ignored"))
                .build(),
        );
        assert!(!path.exists());
        logger.log(
            &Record::builder()
                .level(Level::Error)
                .args(format_args!("kept"))
                .build(),
        );
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with(": kept\n"), "{contents}");
        fs::remove_file(&path).ok();
    }
}
