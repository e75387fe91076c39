//! Filesystem watcher for the journal directory.

mod error;
mod journal_watcher;

pub use error::WatcherError;
pub use journal_watcher::{ChangeInjector, JournalWatcher};
