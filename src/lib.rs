//! Journal Relay - stream Elite Dangerous journal events to live subscribers.
//!
//! New lines appended to the game's journal files are parsed, stamped, and
//! broadcast to every connected Server-Sent Events client.

pub mod broker;
pub mod commands;
pub mod config;
pub mod journal;
pub mod monitor;
pub mod session;
pub mod watcher;
pub mod web;
