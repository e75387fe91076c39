//! Journal record parsing.
//!
//! Each journal line is a self-describing JSON object whose `event` field
//! names the game-state transition it records.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::RecordError;

/// Name of the discriminator field every record carries.
pub const DISCRIMINATOR: &str = "event";

/// Synthetic field holding the ingestion time.
pub const SERVER_TIMESTAMP_FIELD: &str = "_server_timestamp";

/// Synthetic field holding the source file name.
pub const JOURNAL_FILE_FIELD: &str = "_journal_file";

/// A decoded journal line.
///
/// Construction goes through [`parse_line`], so the `event` discriminator
/// is always present as a string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JournalRecord {
    fields: Map<String, Value>,
}

impl JournalRecord {
    /// The record's semantic type, e.g. `FSDJump`.
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.fields
            .get(DISCRIMINATOR)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Stamp the record with its ingestion time and source file.
    pub fn augment(&mut self, journal_file: &str) {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.fields
            .insert(SERVER_TIMESTAMP_FIELD.to_string(), Value::String(now));
        self.fields.insert(
            JOURNAL_FILE_FIELD.to_string(),
            Value::String(journal_file.to_string()),
        );
    }

    /// Serialize the record as a single JSON line.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

/// Decode one journal line.
///
/// # Errors
///
/// Returns [`RecordError`] if the line is not a JSON object or lacks a
/// string `event` field.
pub fn parse_line(line: &[u8]) -> Result<JournalRecord, RecordError> {
    let Value::Object(fields) = serde_json::from_slice::<Value>(line)? else {
        return Err(RecordError::NotAnObject);
    };

    let Some(name) = fields.get(DISCRIMINATOR).and_then(Value::as_str) else {
        return Err(RecordError::MissingDiscriminator(DISCRIMINATOR));
    };
    if name.contains(['\r', '\n']) {
        return Err(RecordError::InvalidDiscriminator(name.to_string()));
    }

    Ok(JournalRecord { fields })
}
