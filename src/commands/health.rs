//! Health check command.
//!
//! Queries a running relay's `/health` endpoint and prints a summary, the
//! way a control panel polls the server.

use std::time::Duration;

use owo_colors::OwoColorize;
use url::Url;

use crate::web::HealthResponse;

/// Default base URL of a local relay.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8000";

/// Request timeout for the health query.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during a health check.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// The relay URL is not valid.
    #[error("Invalid relay URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The request failed or returned an unexpected body.
    #[error("Health request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Build the `/health` URL from a relay base URL.
///
/// # Errors
///
/// Returns an error if `base` is not a valid URL.
pub fn health_url(base: &str) -> Result<Url, HealthError> {
    Ok(Url::parse(base)?.join("/health")?)
}

/// Query the relay's health endpoint.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the relay is unreachable, or the
/// response is not a health document.
pub async fn fetch_health(base: &str) -> Result<HealthResponse, HealthError> {
    let url = health_url(base)?;
    tracing::debug!(url = %url, "Querying relay health");

    let client = reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.json().await?)
}

/// Render a health response for the terminal.
#[must_use]
pub fn format_health(health: &HealthResponse) -> String {
    let monitoring = if health.monitoring {
        "monitoring".green().bold().to_string()
    } else {
        "not monitoring".red().bold().to_string()
    };
    let journal = health
        .current_journal
        .as_deref()
        .unwrap_or("none")
        .cyan()
        .to_string();

    format!(
        "{} {monitoring}\n  journal: {journal}\n  subscribers: {}\n  published: {}",
        "[RELAY]".blue().bold(),
        health.subscribers,
        health.published,
    )
}
