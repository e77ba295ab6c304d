//! Tracing setup shared by the hogtrain binaries.
//!
//! Events go to stdout and to `.hogtrain/logs/hogtrain_<timestamp>.log`, one
//! file per run. Only the newest [`KEEP_LOG_FILES`] run logs are kept.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

pub const KEEP_LOG_FILES: usize = 10;
const LOG_PREFIX: &str = "hogtrain_";
const LOG_SUFFIX: &str = "log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Failed to tidy log directory {path}: {source}")]
    Retention {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("Failed to open run log: {0}")]
    Appender(#[from] InitError),
    #[error("A global tracing subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the stdout and run-log subscriber.
///
/// `RUST_LOG` overrides the `info` default. Calling again is a no-op, and an
/// error leaves the process without logging rather than aborting it.
pub fn init() -> Result<(), LoggingError> {
    if FILE_GUARD.get().is_some() {
        return Ok(());
    }
    let dir = app_dirs::logs_dir()?;
    let stem = run_log_stem(
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
    )?;
    let appender = open_run_log(&dir, &stem)?;
    retain_newest_logs(&dir, KEEP_LOG_FILES)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    const CLOCK: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let timer = fmt::time::OffsetTime::new(offset, CLOCK);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_timer(timer.clone())
                .with_target(false)
                .with_writer(std::io::stdout),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = FILE_GUARD.set(guard);
    tracing::debug!("Run log at {}", dir.join(format!("{stem}.{LOG_SUFFIX}")).display());
    Ok(())
}

/// `hogtrain_<Y-m-d_H-M-S>`; names sort in start order.
fn run_log_stem(started: OffsetDateTime) -> Result<String, time::error::Format> {
    const STAMP: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    Ok(format!("{LOG_PREFIX}{}", started.format(STAMP)?))
}

fn open_run_log(dir: &Path, stem: &str) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(stem)
        .filename_suffix(LOG_SUFFIX)
        .build(dir)
}

/// Delete all but the `keep` newest run logs in `dir`. Other files stay.
fn retain_newest_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let io_err = |source| LoggingError::Retention {
        path: dir.to_path_buf(),
        source,
    };
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_run_log(path))
        .collect();
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for path in logs.drain(..excess) {
        fs::remove_file(&path).map_err(io_err)?;
    }
    Ok(())
}

fn is_run_log(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == LOG_SUFFIX)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_log_is_named_after_start_time() {
        let started = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let stem = run_log_stem(started).unwrap();
        assert_eq!(stem, "hogtrain_2023-11-14_22-13-20");

        let dir = tempdir().unwrap();
        drop(open_run_log(dir.path(), &stem).unwrap());
        assert!(dir.path().join("hogtrain_2023-11-14_22-13-20.log").is_file());
    }

    #[test]
    fn retention_drops_oldest_run_logs_only() {
        let dir = tempdir().unwrap();
        for second in 0..5 {
            let name = format!("hogtrain_2024-01-01_00-00-0{second}.log");
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::write(dir.path().join("features.dat"), "+1 1:0.5\n").unwrap();
        fs::write(dir.path().join("other.log"), b"").unwrap();

        retain_newest_logs(dir.path(), 3).unwrap();
        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            [
                "features.dat",
                "hogtrain_2024-01-01_00-00-02.log",
                "hogtrain_2024-01-01_00-00-03.log",
                "hogtrain_2024-01-01_00-00-04.log",
                "other.log",
            ]
        );
    }
}
