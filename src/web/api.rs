//! API response types for the relay HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::monitor::MonitorStatus;

/// Response for GET /health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: String,
    /// Whether the journal watcher is alive.
    pub monitoring: bool,
    /// File name of the journal being followed.
    pub current_journal: Option<String>,
    /// Number of attached stream subscribers.
    pub subscribers: usize,
    /// Records published since startup.
    pub published: u64,
}

impl HealthResponse {
    /// Create a health response from a monitor snapshot.
    #[must_use]
    pub fn new(monitor: MonitorStatus, subscribers: usize, published: u64) -> Self {
        Self {
            status: "ok".to_string(),
            monitoring: monitor.monitoring,
            current_journal: monitor.current_journal,
            subscribers,
            published,
        }
    }
}
