//! Journal error types.

use std::path::PathBuf;

/// Reasons a single journal line is rejected by the parser.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// The line is not valid JSON.
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The line is valid JSON but not an object.
    #[error("Record is not a JSON object")]
    NotAnObject,

    /// The object has no string `event` discriminator.
    #[error("Record has no \"{0}\" discriminator")]
    MissingDiscriminator(&'static str),

    /// The discriminator cannot be used as a frame name.
    #[error("Invalid event name: {0:?}")]
    InvalidDiscriminator(String),
}

/// Errors that can occur while reading journal files.
#[derive(thiserror::Error, Debug)]
pub enum JournalError {
    /// Tracked file was deleted.
    #[error("Journal file deleted: {0}")]
    FileDeleted(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The journal file name pattern does not compile.
    #[error("Invalid journal file pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
