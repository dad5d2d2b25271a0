//! Relay server
//!
//! TCP listener, per-connection role dispatch, and the glue between the
//! registry, the fan-out coordinator, and subscriber sessions.

pub mod config;
mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
