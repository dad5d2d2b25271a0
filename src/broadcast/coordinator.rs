//! Publish rounds and the delivery barrier
//!
//! [`BroadcastCoordinator::publish`] fans one message out to an
//! insertion-ordered snapshot of the registry. Deliveries run concurrently
//! in a `JoinSet`, and the round resolves only when every one of them has
//! settled. A subscriber whose outbound channel is full therefore stalls
//! the publisher instead of dropping messages; that backpressure is the
//! point, not an accident.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

use crate::protocol::RelayMessage;
use crate::registry::{SubscriberHandle, SubscriberId, SubscriberRegistry};

/// What a publish round did
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Active handles in the snapshot, i.e. deliveries attempted
    pub attempted: usize,
    /// Deliveries accepted by a subscriber's channel
    pub delivered: usize,
    /// Deliveries rejected; their handles were retired
    pub failed: usize,
    /// The timestamp the message went out with
    pub timestamp: DateTime<Utc>,
}

/// Fan-out engine over a shared registry
pub struct BroadcastCoordinator {
    registry: Arc<SubscriberRegistry>,

    /// Highest Unix-millisecond stamp assigned so far, so assigned stamps
    /// never run backwards even when the wall clock does
    stamp_floor: AtomicI64,
}

impl BroadcastCoordinator {
    /// Create a coordinator over a registry
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            stamp_floor: AtomicI64::new(0),
        }
    }

    /// The registry this coordinator fans out over
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Relay one message to every active subscriber
    ///
    /// Stamps the message if the publisher left the timestamp unset, then
    /// delivers to each active handle concurrently and waits for all of
    /// them. A failed delivery retires its handle and fires the terminal
    /// signal without touching the arena; the round itself always
    /// completes. Publishing with zero subscribers succeeds trivially.
    pub async fn publish(&self, message: RelayMessage) -> PublishOutcome {
        let (message, timestamp) = self.stamp(message);
        let snapshot = self.registry.snapshot().await;

        let mut deliveries = JoinSet::new();
        let mut attempted = 0;
        for handle in snapshot {
            if !handle.is_active() {
                continue;
            }
            attempted += 1;
            deliveries.spawn(deliver(handle, message.clone()));
        }

        let mut delivered = 0;
        let mut failed = Vec::new();
        while let Some(settled) = deliveries.join_next().await {
            match settled {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(id)) => failed.push(id),
                Err(err) => {
                    // A delivery task panicked or was aborted mid-round
                    tracing::error!(error = %err, "Delivery task did not settle");
                }
            }
        }

        if !failed.is_empty() {
            self.registry.reap_failed(&failed).await;
        }

        tracing::debug!(
            publisher = %message.publisher_id,
            attempted,
            delivered,
            failed = failed.len(),
            "Publish round complete"
        );

        PublishOutcome {
            attempted,
            delivered,
            failed: failed.len(),
            timestamp,
        }
    }

    /// Ensure the outgoing message carries a timestamp
    ///
    /// Publisher-supplied stamps pass through untouched. Assigned stamps
    /// are clamped against the highest previous assignment, keeping them
    /// monotonically non-decreasing across rounds.
    fn stamp(&self, mut message: RelayMessage) -> (RelayMessage, DateTime<Utc>) {
        let timestamp = match message.timestamp {
            Some(ts) => ts,
            None => {
                let now = Utc::now().timestamp_millis();
                let floor = self.stamp_floor.fetch_max(now, Ordering::Relaxed);
                let assigned = DateTime::<Utc>::from_timestamp_millis(now.max(floor))
                    .unwrap_or_else(Utc::now);
                message.timestamp = Some(assigned);
                assigned
            }
        };
        (message, timestamp)
    }
}

/// Deliver one message to one handle, retiring the handle on failure
async fn deliver(handle: Arc<SubscriberHandle>, message: RelayMessage) -> Result<(), SubscriberId> {
    let id = handle.id();
    match handle.deliver(message).await {
        Ok(()) => {
            tracing::trace!(subscriber = %id, "Delivered");
            Ok(())
        }
        Err(err) => {
            tracing::warn!(
                subscriber = %id,
                user = handle.user_id(),
                error = %err,
                "Delivery failed, retiring subscriber"
            );
            handle.fail(err);
            Err(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, task};

    use super::*;
    use crate::error::Error;
    use crate::protocol::UserInfo;
    use crate::registry::{CompactionPolicy, RegistryConfig};

    fn user(id: &str) -> UserInfo {
        UserInfo::new(id, format!("User-{}", id))
    }

    fn coordinator_with(config: RegistryConfig) -> BroadcastCoordinator {
        BroadcastCoordinator::new(Arc::new(SubscriberRegistry::with_config(config)))
    }

    #[tokio::test]
    async fn test_publish_reaches_every_active_subscriber() {
        let coordinator = BroadcastCoordinator::new(Arc::new(SubscriberRegistry::new()));
        let registry = coordinator.registry();

        let mut a = registry.register(&user("a")).await.unwrap();
        let mut b = registry.register(&user("b")).await.unwrap();

        let outcome = coordinator.publish(RelayMessage::new("pub", "hello")).await;

        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 0);

        assert_eq!(a.outbound.recv().await.unwrap().content, "hello");
        assert_eq!(b.outbound.recv().await.unwrap().content, "hello");
    }

    #[tokio::test]
    async fn test_duplicate_user_ids_each_get_delivery() {
        let coordinator = BroadcastCoordinator::new(Arc::new(SubscriberRegistry::new()));
        let registry = coordinator.registry();

        let mut first = registry.register(&user("alice")).await.unwrap();
        let mut second = registry.register(&user("alice")).await.unwrap();

        let outcome = coordinator.publish(RelayMessage::new("bob", "hi both")).await;

        assert_eq!(outcome.delivered, 2);
        assert_eq!(first.outbound.recv().await.unwrap().content, "hi both");
        assert_eq!(second.outbound.recv().await.unwrap().content, "hi both");
    }

    #[tokio::test]
    async fn test_assigned_timestamps_are_monotonic() {
        // No subscribers: rounds succeed trivially and still stamp
        let coordinator = BroadcastCoordinator::new(Arc::new(SubscriberRegistry::new()));

        let first = coordinator.publish(RelayMessage::new("pub", "one")).await;
        let second = coordinator.publish(RelayMessage::new("pub", "two")).await;

        assert_eq!(first.attempted, 0);
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_publisher_timestamp_passes_through() {
        let coordinator = BroadcastCoordinator::new(Arc::new(SubscriberRegistry::new()));
        let registry = coordinator.registry();
        let mut sub = registry.register(&user("a")).await.unwrap();

        let stamp = DateTime::<Utc>::from_timestamp_millis(1_600_000_000_000).unwrap();
        let outcome = coordinator
            .publish(RelayMessage::new("pub", "dated").with_timestamp(stamp))
            .await;

        assert_eq!(outcome.timestamp, stamp);
        assert_eq!(sub.outbound.recv().await.unwrap().timestamp, Some(stamp));
    }

    #[tokio::test]
    async fn test_failed_delivery_retires_subscriber() {
        let coordinator = BroadcastCoordinator::new(Arc::new(SubscriberRegistry::new()));
        let registry = coordinator.registry();

        let a = registry.register(&user("a")).await.unwrap();
        let mut b = registry.register(&user("b")).await.unwrap();

        // A's transport is gone before the round starts
        drop(a.outbound);

        let outcome = coordinator.publish(RelayMessage::new("pub", "hello")).await;
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 1);

        assert!(!a.handle.is_active());
        match a.token.terminated().await {
            Err(Error::ChannelClosed(id)) => assert_eq!(id, a.handle.id()),
            other => panic!("expected transport failure, got {:?}", other),
        }

        // The next round skips the retired handle entirely
        let outcome = coordinator.publish(RelayMessage::new("pub", "again")).await;
        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.delivered, 1);

        assert_eq!(b.outbound.recv().await.unwrap().content, "hello");
        assert_eq!(b.outbound.recv().await.unwrap().content, "again");
    }

    #[tokio::test]
    async fn test_on_failure_compaction_removes_failed_handle() {
        let coordinator = coordinator_with(
            RegistryConfig::default().compaction(CompactionPolicy::OnFailure),
        );
        let registry = coordinator.registry();

        let sub = registry.register(&user("a")).await.unwrap();
        drop(sub.outbound);

        coordinator.publish(RelayMessage::new("pub", "hello")).await;

        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_round_blocks_until_slow_subscriber_drains() {
        let coordinator = coordinator_with(RegistryConfig::default().outbound_capacity(1));
        let registry = coordinator.registry();
        let mut slow = registry.register(&user("slow")).await.unwrap();

        // Fill the only slot in the outbound channel
        let outcome = coordinator.publish(RelayMessage::new("pub", "first")).await;
        assert_eq!(outcome.delivered, 1);

        // The next round must not resolve while the channel is full
        let mut round = task::spawn(coordinator.publish(RelayMessage::new("pub", "second")));
        assert_pending!(round.poll());

        // Draining one message releases the blocked delivery
        assert_eq!(slow.outbound.recv().await.unwrap().content, "first");

        let outcome = round.await;
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(slow.outbound.recv().await.unwrap().content, "second");
    }
}
