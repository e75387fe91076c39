//! Monitoring lifecycle errors.

use std::path::PathBuf;

use crate::journal::JournalError;
use crate::watcher::WatcherError;

/// Errors that can occur when starting or stopping monitoring.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    /// The journal directory does not exist.
    #[error("Journal directory not found: {0}")]
    PathNotFound(PathBuf),

    /// Monitoring was started twice without a stop in between.
    #[error("Monitoring is already running")]
    AlreadyRunning,

    /// Scanning the journal directory failed.
    #[error("Journal discovery failed: {0}")]
    Journal(#[from] JournalError),

    /// The directory watcher failed.
    #[error(transparent)]
    Watcher(#[from] WatcherError),
}
