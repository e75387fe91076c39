//! Watcher error types.

/// Errors that can occur while starting or stopping the directory watcher.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error, e.g. the watcher thread could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The watcher thread panicked.
    #[error("Watcher thread panicked")]
    ThreadPanicked,
}
