//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broker::{DEFAULT_BROKER_CAPACITY, DEFAULT_IDLE_INTERVAL};
use crate::journal::DEFAULT_JOURNAL_PATTERN;

/// Environment variable overriding the journal directory.
pub const JOURNAL_PATH_ENV: &str = "ELITE_JOURNAL_PATH";

/// Default port for the relay server.
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration for the journal relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Directory holding the journal files.
    pub journal_dir: PathBuf,
    /// Regex matched against journal file names.
    pub journal_pattern: String,
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Seconds without records before a keep-alive is sent.
    pub idle_interval_secs: u64,
    /// Per-subscriber record buffer.
    pub broker_capacity: usize,
    /// Whether to enable permissive CORS.
    pub cors_permissive: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            journal_dir: default_journal_dir(),
            journal_pattern: DEFAULT_JOURNAL_PATTERN.to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            idle_interval_secs: DEFAULT_IDLE_INTERVAL.as_secs(),
            broker_capacity: DEFAULT_BROKER_CAPACITY,
            cors_permissive: true,
        }
    }
}

impl RelayConfig {
    /// Idle interval as a [`Duration`], never shorter than one second.
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs.max(1))
    }

    /// Apply `ELITE_JOURNAL_PATH` if it is set and non-empty.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(JOURNAL_PATH_ENV).filter(|v| !v.is_empty()) {
            self.journal_dir = PathBuf::from(dir);
        }
        self
    }
}

/// Where the game writes its journals on this platform.
#[must_use]
pub fn default_journal_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    if cfg!(windows) {
        home.join("Saved Games")
            .join("Frontier Developments")
            .join("Elite Dangerous")
    } else {
        // Steam Proton prefix for app 359320
        home.join(".steam/steam/steamapps/compatdata/359320/pfx/drive_c/users/steamuser")
            .join("Saved Games")
            .join("Frontier Developments")
            .join("Elite Dangerous")
    }
}
