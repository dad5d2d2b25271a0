//! Statistics and metrics for the relay server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::broadcast::PublishOutcome;

/// Live server-wide counters
///
/// Shared across connection tasks; every counter is monotonic.
#[derive(Debug)]
pub struct RelayStats {
    /// Server start time
    started_at: Instant,
    /// Connections ever accepted
    connections_accepted: AtomicU64,
    /// Subscriber registrations ever completed
    subscribers_registered: AtomicU64,
    /// Publish rounds completed
    messages_published: AtomicU64,
    /// Deliveries accepted by a subscriber's channel
    messages_delivered: AtomicU64,
    /// Deliveries that failed and retired their subscriber
    deliveries_failed: AtomicU64,
}

impl RelayStats {
    /// Create a zeroed counter set
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_accepted: AtomicU64::new(0),
            subscribers_registered: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
        }
    }

    /// Count an accepted connection
    pub fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a completed registration
    pub fn record_registration(&self) {
        self.subscribers_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one publish round into the counters
    pub fn record_publish(&self, outcome: &PublishOutcome) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.messages_delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.deliveries_failed
            .fetch_add(outcome.failed as u64, Ordering::Relaxed);
    }

    /// Copy the counters out
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            subscribers_registered: self.subscribers_registered.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the server counters
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Time since the counters were created
    pub uptime: Duration,
    /// Connections ever accepted
    pub connections_accepted: u64,
    /// Subscriber registrations ever completed
    pub subscribers_registered: u64,
    /// Publish rounds completed
    pub messages_published: u64,
    /// Deliveries accepted by a subscriber's channel
    pub messages_delivered: u64,
    /// Deliveries that failed and retired their subscriber
    pub deliveries_failed: u64,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let snapshot = RelayStats::new().snapshot();

        assert_eq!(snapshot.connections_accepted, 0);
        assert_eq!(snapshot.subscribers_registered, 0);
        assert_eq!(snapshot.messages_published, 0);
        assert_eq!(snapshot.messages_delivered, 0);
        assert_eq!(snapshot.deliveries_failed, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = RelayStats::new();

        stats.record_connection();
        stats.record_connection();
        stats.record_registration();
        stats.record_publish(&PublishOutcome {
            attempted: 3,
            delivered: 2,
            failed: 1,
            timestamp: Utc::now(),
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 2);
        assert_eq!(snapshot.subscribers_registered, 1);
        assert_eq!(snapshot.messages_published, 1);
        assert_eq!(snapshot.messages_delivered, 2);
        assert_eq!(snapshot.deliveries_failed, 1);
    }
}
