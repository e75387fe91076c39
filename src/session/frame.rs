//! Server-Sent Events frames.

use std::sync::Arc;

use axum::response::sse::Event;
use chrono::{SecondsFormat, Utc};

use crate::journal::JournalRecord;

/// Comment text of the keep-alive frame.
pub const KEEP_ALIVE_COMMENT: &str = "heartbeat";

/// One message written to a subscriber.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Greeting sent once when the session opens.
    Connected {
        /// When the session opened (UTC, RFC 3339).
        timestamp: String,
    },
    /// A journal record, named after its `event` field.
    Record(Arc<JournalRecord>),
    /// Comment-only frame keeping idle connections open.
    KeepAlive,
}

impl Frame {
    /// Greeting frame stamped with the current time.
    #[must_use]
    pub fn connected() -> Self {
        Self::Connected {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// The `event:` name of the frame; keep-alives have none.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Connected { .. } => Some("connected"),
            Self::Record(record) => Some(record.event_name()),
            Self::KeepAlive => None,
        }
    }

    /// The JSON payload of the frame; keep-alives have none.
    #[must_use]
    pub fn data(&self) -> Option<String> {
        match self {
            Self::Connected { timestamp } => Some(
                serde_json::json!({
                    "message": "Connected to the Elite Dangerous journal relay",
                    "timestamp": timestamp,
                })
                .to_string(),
            ),
            Self::Record(record) => Some(record.to_json()),
            Self::KeepAlive => None,
        }
    }

    /// Convert into an axum SSE event.
    #[must_use]
    pub fn to_sse_event(&self) -> Event {
        match (self.name(), self.data()) {
            (Some(name), Some(data)) => Event::default().event(name).data(data),
            _ => Event::default().comment(KEEP_ALIVE_COMMENT),
        }
    }
}
