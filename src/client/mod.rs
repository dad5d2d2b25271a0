//! Relay client implementation
//!
//! Provides client-side access to a relay server for:
//! - Subscribing to the broadcast stream and rendering deliveries
//! - Publishing one-shot messages that fan out to every subscriber

pub mod config;
pub mod session;
pub mod sink;

pub use config::ClientConfig;
pub use session::{RelayClient, Subscription};
pub use sink::{ConsoleSink, MemorySink, MessageSink};
