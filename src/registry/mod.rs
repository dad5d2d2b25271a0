//! Subscriber registry for broadcast fan-out
//!
//! The registry is an arena of live subscriber handles keyed by a stable,
//! monotonically increasing id. Registration hands back a token tied to the
//! handle's terminal signal; fan-out takes an insertion-ordered snapshot of
//! the arena and delivers to every active handle.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SubscriberRegistry>
//!                  ┌────────────────────────────────┐
//!                  │ subscribers: BTreeMap<Id,      │
//!                  │   SubscriberHandle {           │
//!                  │     outbound: mpsc::Sender,    │
//!                  │     active: AtomicBool,        │
//!                  │     terminal: oneshot::Sender, │
//!                  │   }                            │
//!                  │ >                              │
//!                  └───────────────┬────────────────┘
//!                                  │ snapshot()
//!                  ┌───────────────┼────────────────┐
//!                  ▼               ▼                ▼
//!             [delivery]      [delivery]       [delivery]
//!             deliver().await deliver().await  deliver().await
//!                  │               │                │
//!                  ▼               ▼                ▼
//!             writer task     writer task      writer task ──► TCP
//! ```
//!
//! A failed delivery flips the handle's `active` flag and fires its terminal
//! signal without touching the arena, so a publish round never needs the
//! write lock. Structural removal is deferred to the configured
//! [`CompactionPolicy`].

pub mod config;
pub mod error;
pub mod handle;
pub mod store;

pub use config::{CompactionPolicy, RegistryConfig};
pub use error::RegistryError;
pub use handle::{Registration, RegistrationToken, SubscriberHandle, SubscriberId};
pub use store::SubscriberRegistry;
