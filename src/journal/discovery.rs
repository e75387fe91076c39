//! Journal file discovery.
//!
//! Elite Dangerous writes `Journal.<timestamp>.<part>.log` files into a single
//! directory, starting a new file for every game session.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;

use super::error::JournalError;

/// Default pattern for journal file names.
pub const DEFAULT_JOURNAL_PATTERN: &str = r"^Journal\..+\.log$";

/// Matches file names against the journal naming pattern.
#[derive(Debug, Clone)]
pub struct JournalPattern {
    regex: Regex,
}

impl JournalPattern {
    /// Compile a file name pattern.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Pattern`] if the pattern is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self, JournalError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Check whether the file name of `path` is a journal file name.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.regex.is_match(name))
    }
}

/// A journal file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes at the time of the scan.
    pub len: u64,
}

/// List all journal files in `dir` (non-recursive).
///
/// Files whose metadata cannot be read are skipped.
///
/// # Errors
///
/// Returns an error if the directory itself cannot be read.
pub fn scan_journals(dir: &Path, pattern: &JournalPattern) -> Result<Vec<JournalFile>, JournalError> {
    let entries = std::fs::read_dir(dir)?;

    Ok(entries
        .filter_map(Result::ok)
        .filter(|entry| pattern.matches(&entry.path()))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            Some(JournalFile {
                path: entry.path(),
                modified: metadata.modified().ok()?,
                len: metadata.len(),
            })
        })
        .collect())
}

/// Pick the most recently modified journal from a scan.
#[must_use]
pub fn latest_journal(files: &[JournalFile]) -> Option<&JournalFile> {
    files.iter().max_by_key(|file| file.modified)
}

/// Read the modification time of a file, or `None` if it is gone.
#[must_use]
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
