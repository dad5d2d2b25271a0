//! Broadcast message relay over TCP
//!
//! A relay server accepts two kinds of peers on the same port. Subscribers
//! open a long-lived stream and receive every message published while they
//! are connected. Publishers submit a single message and are answered only
//! after the fan-out round has settled for every active subscriber, so a
//! slow consumer is felt by the publisher rather than papered over with an
//! unbounded queue.
//!
//! Key properties:
//! - Insertion-ordered fan-out: each round delivers to subscribers in
//!   registration order, concurrently, and resolves when all deliveries
//!   have settled.
//! - O(1) retirement: a failed or departing subscriber is deactivated by
//!   flipping an atomic flag and firing a terminal signal; structural
//!   removal is deferred to a configurable compaction policy.
//! - Monotonic timestamps: messages published without a timestamp are
//!   stamped by a server clock that never moves backwards.
//!
//! # Quick start
//!
//! ```no_run
//! use relay_rs::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> relay_rs::Result<()> {
//!     let config = ServerConfig::default().max_connections(500);
//!     let server = RelayServer::new(config);
//!     server.run().await
//! }
//! ```
//!
//! See [`client`] for the subscriber and publisher counterparts.

pub mod broadcast;
pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use broadcast::{BroadcastCoordinator, PublishOutcome};
pub use error::{Error, Result};
pub use protocol::{ConnectRequest, Frame, RelayMessage, UserInfo};
pub use registry::{CompactionPolicy, RegistryConfig, SubscriberRegistry};
pub use server::{RelayServer, ServerConfig};
