//! Monitoring lifecycle.
//!
//! The [`MonitorController`] owns the one active tracker/watcher pair and
//! the broker that every stream session attaches to.

mod error;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::broker::EventBroker;
use crate::journal::{JournalPattern, JournalTracker};
use crate::session::StreamSession;
use crate::watcher::{ChangeInjector, JournalWatcher};

pub use error::MonitorError;

/// Snapshot of the monitoring state for health queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Whether the watcher thread is alive.
    pub monitoring: bool,
    /// File name of the journal currently tracked.
    pub current_journal: Option<String>,
}

struct ActiveMonitor {
    watcher: JournalWatcher,
    current_journal: watch::Receiver<Option<String>>,
}

struct Inner {
    active: Option<ActiveMonitor>,
    sessions: CancellationToken,
}

/// Process-wide start/stop lifecycle for journal monitoring.
pub struct MonitorController {
    broker: EventBroker,
    pattern: JournalPattern,
    idle: Duration,
    inner: Mutex<Inner>,
}

impl MonitorController {
    /// Create a stopped controller.
    #[must_use]
    pub fn new(broker: EventBroker, pattern: JournalPattern, idle: Duration) -> Self {
        Self {
            broker,
            pattern,
            idle,
            inner: Mutex::new(Inner {
                active: None,
                sessions: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The broker records are published to.
    #[must_use]
    pub fn broker(&self) -> &EventBroker {
        &self.broker
    }

    /// Start monitoring the journal directory at `path`.
    ///
    /// Discovers the newest journal (history is not replayed) and starts the
    /// directory watcher.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::PathNotFound`] if `path` does not exist,
    /// [`MonitorError::AlreadyRunning`] if monitoring is already active, or
    /// an error if discovery or the watcher fails.
    pub fn start(&self, path: &Path) -> Result<(), MonitorError> {
        let mut inner = self.lock();
        if inner.active.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }
        if !path.exists() {
            tracing::error!(path = %path.display(), "Journal directory not found");
            return Err(MonitorError::PathNotFound(path.to_path_buf()));
        }

        tracing::info!(path = %path.display(), "Starting journal monitoring");
        let tracker = JournalTracker::discover(path, self.pattern.clone(), self.broker.clone())?;
        let current_journal = tracker.current_journal();
        let watcher = JournalWatcher::spawn(tracker)?;

        inner.active = Some(ActiveMonitor {
            watcher,
            current_journal,
        });
        tracing::info!("Monitoring started");
        Ok(())
    }

    /// Stop monitoring and close every attached stream session.
    ///
    /// Returns once the watcher thread has exited, so nothing is published
    /// afterwards. Safe to call when not monitoring.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher thread panicked.
    pub fn stop(&self) -> Result<(), MonitorError> {
        let mut inner = self.lock();
        inner.sessions.cancel();
        inner.sessions = CancellationToken::new();

        let Some(mut active) = inner.active.take() else {
            return Ok(());
        };
        active.watcher.stop()?;
        tracing::info!("Monitoring stopped");
        Ok(())
    }

    /// Health snapshot: watcher liveness and current journal name.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        let inner = self.lock();
        match &inner.active {
            Some(active) => MonitorStatus {
                monitoring: active.watcher.is_alive(),
                current_journal: active.current_journal.borrow().clone(),
            },
            None => MonitorStatus {
                monitoring: false,
                current_journal: None,
            },
        }
    }

    /// Handle for injecting change notifications into the active watcher.
    #[must_use]
    pub fn injector(&self) -> Option<ChangeInjector> {
        self.lock().active.as_ref().map(|a| a.watcher.injector())
    }

    /// Attach a new stream session to the broker.
    ///
    /// The session closes when monitoring is stopped.
    #[must_use]
    pub fn attach_session(&self) -> StreamSession {
        let cancel = self.lock().sessions.child_token();
        StreamSession::attach(&self.broker, self.idle, cancel)
    }
}
