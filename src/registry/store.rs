//! Subscriber registry implementation
//!
//! The central arena that holds all live subscriber handles and hands out
//! insertion-ordered snapshots for fan-out.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::{CompactionPolicy, RegistryConfig};
use super::error::RegistryError;
use super::handle::{Registration, SubscriberHandle, SubscriberId};
use crate::protocol::UserInfo;

/// Arena of live subscriber handles
///
/// Keys are stable, monotonically increasing ids, so snapshots come back in
/// registration order. Thread-safe via `RwLock`; fan-out only ever takes the
/// read side, so registrations queue behind a round but deliveries never
/// block each other.
pub struct SubscriberRegistry {
    /// Ordered arena of handles
    subscribers: RwLock<BTreeMap<SubscriberId, Arc<SubscriberHandle>>>,

    /// Next id to assign
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a subscriber
    ///
    /// Duplicate user ids are accepted; every registration gets its own
    /// handle, channel, and id. Fails only when the configured subscriber
    /// limit is reached.
    pub async fn register(&self, user: &UserInfo) -> Result<Registration, RegistryError> {
        let mut subscribers = self.subscribers.write().await;

        if self.config.max_subscribers > 0 && subscribers.len() >= self.config.max_subscribers {
            return Err(RegistryError::AtCapacity(self.config.max_subscribers));
        }

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, outbound, token) =
            SubscriberHandle::new(id, user, self.config.outbound_capacity);
        subscribers.insert(id, Arc::clone(&handle));

        tracing::info!(
            subscriber = %id,
            user = %user.id,
            total = subscribers.len(),
            "Subscriber registered"
        );

        Ok(Registration {
            handle,
            outbound,
            token,
        })
    }

    /// Snapshot the arena in registration order
    ///
    /// Includes inactive handles; fan-out filters on the active flag.
    pub async fn snapshot(&self) -> Vec<Arc<SubscriberHandle>> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Look up a handle by id
    pub async fn get(&self, id: SubscriberId) -> Option<Arc<SubscriberHandle>> {
        self.subscribers.read().await.get(&id).cloned()
    }

    /// Retire a handle cleanly and apply the compaction policy
    ///
    /// The subscriber's session resolves without an error. Used when a
    /// subscriber's transport goes away in an orderly fashion.
    pub async fn retire(&self, id: SubscriberId) -> Result<(), RegistryError> {
        let handle = self.get(id).await.ok_or(RegistryError::NotFound(id))?;
        handle.retire();

        tracing::debug!(subscriber = %id, user = handle.user_id(), "Subscriber retired");

        if self.config.compaction == CompactionPolicy::OnFailure {
            self.remove(id).await;
        }
        Ok(())
    }

    /// Apply the compaction policy to handles retired by failed deliveries
    ///
    /// The handles are already inactive and their terminal signals have
    /// fired; this only decides whether they leave the arena now or wait
    /// for a sweep.
    pub(crate) async fn reap_failed(&self, ids: &[SubscriberId]) {
        if self.config.compaction != CompactionPolicy::OnFailure || ids.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.write().await;
        for id in ids {
            if subscribers.remove(id).is_some() {
                tracing::debug!(subscriber = %id, "Failed subscriber removed");
            }
        }
    }

    /// Remove a handle from the arena
    ///
    /// Does not touch the handle's terminal signal; callers that want the
    /// session resolved use [`retire`](Self::retire) instead.
    pub async fn remove(&self, id: SubscriberId) -> Option<Arc<SubscriberHandle>> {
        let removed = self.subscribers.write().await.remove(&id);
        if removed.is_some() {
            tracing::debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    /// Sweep every inactive handle out of the arena
    ///
    /// Returns the number removed. This is the entire compaction step for
    /// `CompactionPolicy::Manual`, and what the background task runs for
    /// `CompactionPolicy::Periodic`.
    pub async fn compact(&self) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|_, handle| handle.is_active());
        let removed = before - subscribers.len();

        if removed > 0 {
            tracing::info!(removed, remaining = subscribers.len(), "Registry compacted");
        }
        removed
    }

    /// Retire every handle cleanly and empty the arena
    ///
    /// Every blocked session resolves without an error. Used for orderly
    /// server shutdown.
    pub async fn drain(&self) {
        let mut subscribers = self.subscribers.write().await;
        let drained = subscribers.len();
        for handle in subscribers.values() {
            handle.retire();
        }
        subscribers.clear();

        if drained > 0 {
            tracing::info!(drained, "Registry drained");
        }
    }

    /// Total number of handles in the arena, active or not
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Number of handles still eligible for deliveries
    pub async fn active_count(&self) -> usize {
        self.subscribers
            .read()
            .await
            .values()
            .filter(|handle| handle.is_active())
            .count()
    }

    /// Spawn the background sweep used by `CompactionPolicy::Periodic`
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_compaction_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.compaction_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.compact().await;
            }
        })
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserInfo {
        UserInfo::new(id, format!("User-{}", id))
    }

    #[tokio::test]
    async fn test_register_and_snapshot_order() {
        let registry = SubscriberRegistry::new();

        registry.register(&user("a")).await.unwrap();
        registry.register(&user("b")).await.unwrap();
        registry.register(&user("c")).await.unwrap();

        let snapshot = registry.snapshot().await;
        let users: Vec<&str> = snapshot.iter().map(|h| h.user_id()).collect();
        assert_eq!(users, ["a", "b", "c"]);

        // Ids are strictly increasing in registration order
        assert!(snapshot.windows(2).all(|pair| pair[0].id() < pair[1].id()));
    }

    #[tokio::test]
    async fn test_duplicate_user_ids_coexist() {
        let registry = SubscriberRegistry::new();

        let first = registry.register(&user("alice")).await.unwrap();
        let second = registry.register(&user("alice")).await.unwrap();

        assert_ne!(first.handle.id(), second.handle.id());
        assert_eq!(registry.subscriber_count().await, 2);
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let registry = SubscriberRegistry::with_config(RegistryConfig::default().max_subscribers(1));

        registry.register(&user("a")).await.unwrap();
        let result = registry.register(&user("b")).await;

        assert_eq!(result.err(), Some(RegistryError::AtCapacity(1)));
    }

    #[tokio::test]
    async fn test_retire_resolves_session_cleanly() {
        let registry = SubscriberRegistry::new();
        let registration = registry.register(&user("a")).await.unwrap();
        let id = registration.handle.id();

        registry.retire(id).await.unwrap();

        assert!(registration.token.terminated().await.is_ok());
        assert!(!registration.handle.is_active());

        // Default policy is Periodic: the handle stays until a sweep
        assert_eq!(registry.subscriber_count().await, 1);
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(registry.compact().await, 1);
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_on_failure_policy_removes_immediately() {
        let registry = SubscriberRegistry::with_config(
            RegistryConfig::default().compaction(CompactionPolicy::OnFailure),
        );
        let registration = registry.register(&user("a")).await.unwrap();

        registry.retire(registration.handle.id()).await.unwrap();

        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_retire_unknown_id() {
        let registry = SubscriberRegistry::new();
        let registration = registry.register(&user("a")).await.unwrap();
        let id = registration.handle.id();
        registry.remove(id).await;

        assert_eq!(
            registry.retire(id).await.err(),
            Some(RegistryError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn test_drain_resolves_all_sessions() {
        let registry = SubscriberRegistry::new();
        let first = registry.register(&user("a")).await.unwrap();
        let second = registry.register(&user("b")).await.unwrap();

        registry.drain().await;

        assert_eq!(registry.subscriber_count().await, 0);
        assert!(first.token.terminated().await.is_ok());
        assert!(second.token.terminated().await.is_ok());
    }
}
