//! Broadcast fan-out
//!
//! One publish round: stamp the message, snapshot the registry, deliver to
//! every active handle concurrently, and resolve only when every delivery
//! has settled.

pub mod coordinator;

pub use coordinator::{BroadcastCoordinator, PublishOutcome};
