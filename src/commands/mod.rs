//! CLI command implementations.

pub mod health;
