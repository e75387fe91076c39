//! Web surface: the SSE stream, health check and test page.

mod api;
mod error;
mod handlers;
mod server;

pub use api::HealthResponse;
pub use error::ServerError;
pub use handlers::AppState;
pub use server::{RelayServer, ServerConfig};
