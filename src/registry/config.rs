//! Registry configuration

use std::time::Duration;

/// When inactive handles are structurally removed from the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionPolicy {
    /// Remove a handle as soon as a failed delivery retires it
    OnFailure,
    /// Sweep inactive handles on a background interval
    Periodic,
    /// Keep inactive handles until [`compact`] is called explicitly
    ///
    /// [`compact`]: super::SubscriberRegistry::compact
    Manual,
}

/// Configuration options for the subscriber registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each subscriber's outbound channel
    ///
    /// A delivery to a subscriber whose channel is full blocks, and with it
    /// the whole publish round.
    pub outbound_capacity: usize,

    /// Maximum number of registered subscribers (0 = unlimited)
    pub max_subscribers: usize,

    /// How inactive handles leave the arena
    pub compaction: CompactionPolicy,

    /// Sweep interval for `CompactionPolicy::Periodic`
    pub compaction_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 32,
            max_subscribers: 0, // Unlimited
            compaction: CompactionPolicy::Periodic,
            compaction_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the outbound channel capacity (floor of 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the subscriber limit
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    /// Set the compaction policy
    pub fn compaction(mut self, policy: CompactionPolicy) -> Self {
        self.compaction = policy;
        self
    }

    /// Set the periodic sweep interval
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = interval;
        self
    }
}
