use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

use crate::config::paths;
use crate::config::{LogLevel, LoggingSettings};
use crate::errors::HarborError;

static LOG_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Installs the global subscriber, writing to the log directory so the
/// interactive terminal stays clean. Calling it again returns the first
/// result without touching the subscriber.
pub fn init_logging(settings: &LoggingSettings, verbosity: u8) -> Result<Option<PathBuf>, HarborError> {
    init_logging_in(&paths::logs_dir(), settings, verbosity)
}

pub fn init_logging_in(dir: &Path, settings: &LoggingSettings, verbosity: u8) -> Result<Option<PathBuf>, HarborError> {
    if let Some(existing) = LOG_FILE.get() {
        return Ok(existing.clone());
    }
    if !settings.enabled {
        return Ok(LOG_FILE.get_or_init(|| None).clone());
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(settings.structured));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let level = effective_level(settings.level, verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let installed = if settings.structured {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    };
    installed.map_err(|e| HarborError::Internal(format!("failed to install log subscriber: {}", e)))?;

    tracing::debug!(path = %path.display(), level = %level, "Logging initialised");
    Ok(LOG_FILE.get_or_init(|| Some(path)).clone())
}

pub fn log_file_name(structured: bool) -> &'static str {
    if structured {
        "harbortui.jsonl"
    } else {
        "harbortui.log"
    }
}

/// Each `-v` lowers the threshold one step below the configured level.
pub fn effective_level(configured: LogLevel, verbosity: u8) -> LogLevel {
    let mut level = configured;
    for _ in 0..verbosity {
        level = match level {
            LogLevel::Error => LogLevel::Warn,
            LogLevel::Warn => LogLevel::Info,
            LogLevel::Info => LogLevel::Debug,
            LogLevel::Debug | LogLevel::Trace => LogLevel::Trace,
        };
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level(LogLevel::Info, 0), LogLevel::Info);
        assert_eq!(effective_level(LogLevel::Info, 1), LogLevel::Debug);
        assert_eq!(effective_level(LogLevel::Warn, 5), LogLevel::Trace);
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name(false), "harbortui.log");
        assert_eq!(log_file_name(true), "harbortui.jsonl");
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings::default();
        let first = init_logging_in(dir.path(), &settings, 0).unwrap();
        let second = init_logging_in(dir.path(), &settings, 2).unwrap();
        assert_eq!(first, second);
    }
}
