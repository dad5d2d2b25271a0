//! Server-side subscriber sessions
//!
//! A session is the server's view of one long-lived subscriber stream:
//! register, park on the terminal signal, terminate.

pub mod state;

pub use state::{SessionPhase, SubscriberSession};
