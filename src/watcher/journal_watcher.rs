//! Directory watcher driving the journal tracker.
//!
//! Raw `notify` events are forwarded to a dedicated `journal-watcher` thread
//! which owns the [`JournalTracker`] and calls it once per changed path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::error::WatcherError;
use crate::journal::JournalTracker;

/// Message to the watcher thread.
#[derive(Debug)]
enum WatchMessage {
    /// A path in the directory changed.
    Changed(PathBuf),
    /// Wake the thread so it sees the stop flag.
    Stop,
}

/// Handle for feeding change notifications to a running watcher.
///
/// Notifications sent through an injector are handled exactly like the ones
/// coming from the operating system.
#[derive(Debug, Clone)]
pub struct ChangeInjector {
    tx: std_mpsc::Sender<WatchMessage>,
}

impl ChangeInjector {
    /// Report that `path` changed. Returns `false` once the watcher is gone.
    pub fn notify(&self, path: impl Into<PathBuf>) -> bool {
        self.tx.send(WatchMessage::Changed(path.into())).is_ok()
    }
}

/// Watches a journal directory (non-recursive) on its own thread.
///
/// Dropping the watcher stops it and waits for the thread to exit.
pub struct JournalWatcher {
    /// The directory being watched.
    dir: PathBuf,
    /// OS watcher; dropped first on stop so no new events arrive.
    watcher: Option<RecommendedWatcher>,
    /// Sender shared by OS events, injectors and stop.
    tx: std_mpsc::Sender<WatchMessage>,
    /// Set before the stop message so queued changes are skipped.
    stopping: Arc<AtomicBool>,
    /// Handle to the watcher thread.
    handle: Option<thread::JoinHandle<()>>,
}

impl JournalWatcher {
    /// Start watching the tracker's directory.
    ///
    /// The tracker moves onto the watcher thread and is only ever touched
    /// from there.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watcher cannot be created or the thread
    /// cannot be spawned.
    pub fn spawn(tracker: JournalTracker) -> Result<Self, WatcherError> {
        let dir = tracker.dir().to_path_buf();
        let (tx, rx) = std_mpsc::channel();
        let stopping = Arc::new(AtomicBool::new(false));

        let notify_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            let _ = notify_tx.send(WatchMessage::Changed(path));
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let thread_stopping = Arc::clone(&stopping);
        let handle = thread::Builder::new()
            .name("journal-watcher".to_string())
            .spawn(move || run(tracker, &rx, &thread_stopping))?;

        tracing::info!(dir = %dir.display(), "Journal watcher started");

        Ok(Self {
            dir,
            watcher: Some(watcher),
            tx,
            stopping,
            handle: Some(handle),
        })
    }

    /// Get a handle for injecting change notifications.
    #[must_use]
    pub fn injector(&self) -> ChangeInjector {
        ChangeInjector {
            tx: self.tx.clone(),
        }
    }

    /// Whether the watcher thread is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop watching and wait for the watcher thread to exit.
    ///
    /// A change being handled when this is called finishes first; queued
    /// changes are discarded. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ThreadPanicked`] if the thread panicked.
    pub fn stop(&mut self) -> Result<(), WatcherError> {
        drop(self.watcher.take());
        self.stopping.store(true, Ordering::SeqCst);
        let _ = self.tx.send(WatchMessage::Stop);

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|_| WatcherError::ThreadPanicked)?;
        tracing::info!(dir = %self.dir.display(), "Journal watcher stopped");
        Ok(())
    }
}

impl Drop for JournalWatcher {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "Journal watcher did not stop cleanly");
        }
    }
}

fn run(
    mut tracker: JournalTracker,
    rx: &std_mpsc::Receiver<WatchMessage>,
    stopping: &AtomicBool,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create runtime for journal watcher");
            return;
        }
    };

    while let Ok(message) = rx.recv() {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match message {
            WatchMessage::Changed(path) => {
                tracing::trace!(path = %path.display(), "Journal directory changed");
                runtime.block_on(tracker.handle_change(&path));
            }
            WatchMessage::Stop => break,
        }
    }
}
