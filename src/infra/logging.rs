use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const ENV_FILTER: &str = "FSMON_LOG";
const LOG_FILE_NAME: &str = "fsmon.log";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogTarget {
    /// Append to `<state dir>/fsmon.log`; used while the TUI owns the terminal.
    StateDir(PathBuf),
    Stderr,
    Discard,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile { path: String, source: io::Error },
}

/// Installs the global subscriber. Level comes from `FSMON_LOG`, else `default_level`.
pub fn init_logging(target: &LogTarget, default_level: &str) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_env(ENV_FILTER).unwrap_or_else(|_| EnvFilter::new(default_level));

    match target {
        LogTarget::StateDir(dir) => {
            let file = open_log_file(dir)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init();
        }
        LogTarget::Discard => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

pub fn log_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_FILE_NAME)
}

fn open_log_file(state_dir: &Path) -> Result<File, LoggingError> {
    let path = log_file_path(state_dir);
    let map_error = |source: io::Error| LoggingError::OpenLogFile {
        path: path.display().to_string(),
        source,
    };
    fs::create_dir_all(state_dir).map_err(map_error)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(map_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_log_file_inside_missing_state_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state_dir = temp.path().join("nested").join("state");
        let file = open_log_file(&state_dir).expect("open");
        drop(file);
        assert!(log_file_path(&state_dir).is_file());
    }

    #[test]
    fn reports_unwritable_state_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a dir").expect("write");
        let result = open_log_file(&blocker.join("state"));
        assert!(matches!(result, Err(LoggingError::OpenLogFile { .. })));
    }
}
