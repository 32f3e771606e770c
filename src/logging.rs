//! Logging setup.
//!
//! Logs go to stdout and to a daily rotated file under the configured log
//! directory. The daemon cannot guarantee its own operational logging without
//! the file sink, so every failure here is fatal to the caller.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, InitError, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{
    DEBUG_LOG_FILTER, DEFAULT_LOG_FILTER, INSTALL_DIR_MODE, LOG_FILES_RETAINED, LOG_FILE_PREFIX,
};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to create install directory {}: {source}", path.display())]
    InstallDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set up log rotation: {0}")]
    Rotation(#[from] InitError),

    #[error("Failed to install log subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending lines.
pub struct LogHandle {
    pub directory: PathBuf,
    _guard: WorkerGuard,
}

/// Filter used when RUST_LOG is not set.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

/// Create `<log_dir>/install` (owner-only access) and any missing parents.
pub fn create_install_directory(log_dir: &Path) -> Result<PathBuf, LoggingError> {
    let path = log_dir.join("install");
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(INSTALL_DIR_MODE)
        .create(&path)
        .map_err(|source| LoggingError::InstallDirectory {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Install the global subscriber with stdout and rotating-file layers.
pub fn init(log_dir: &Path, debug: bool) -> Result<LogHandle, LoggingError> {
    create_install_directory(log_dir)?;

    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(LOG_FILES_RETAINED)
        .build(log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    tracing::info!(path = %log_dir.display(), "writing log files to disk");

    Ok(LogHandle {
        directory: log_dir.to_path_buf(),
        _guard: guard,
    })
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn test_default_filter_follows_debug_mode() {
        assert_eq!(default_filter(false), DEFAULT_LOG_FILTER);
        assert_eq!(default_filter(true), DEBUG_LOG_FILTER);
    }

    #[test]
    fn test_install_directory_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_install_directory(&dir.path().join("logs")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777 & !0o700, 0);
        // A second call on the existing directory succeeds.
        create_install_directory(&dir.path().join("logs")).unwrap();
    }

    #[test]
    fn test_install_directory_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let err = create_install_directory(&blocker).unwrap_err();
        assert!(matches!(err, LoggingError::InstallDirectory { .. }));
    }
}
