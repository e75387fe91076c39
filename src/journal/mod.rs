//! Journal parsing and tracking.
//!
//! Turns a directory of append-only Elite Dangerous journal files into a
//! stream of validated records.

mod discovery;
mod error;
mod record;
mod tracker;

pub use discovery::{JournalPattern, DEFAULT_JOURNAL_PATTERN};
pub use error::{JournalError, RecordError};
pub use record::{parse_line, JournalRecord, JOURNAL_FILE_FIELD, SERVER_TIMESTAMP_FIELD};
pub use tracker::{JournalTracker, TrackingCursor};
