//! Subscriber handle and registration types
//!
//! A handle owns one subscriber's outbound channel together with the
//! liveness flag and the one-shot terminal signal its session blocks on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::protocol::{RelayMessage, UserInfo};

/// Stable identifier the registry assigns to each registration
///
/// Ids increase monotonically and are never reused, so iterating an ordered
/// arena yields handles in registration order. The user-supplied id is
/// carried separately and may repeat; this one never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub(super) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One subscriber's delivery endpoint
///
/// The handle exclusively owns the sending side of the subscriber's
/// outbound channel. The `active` flag gates fan-out: it flips off exactly
/// once, on the first failed delivery or on retirement, and never back on.
pub struct SubscriberHandle {
    /// Registry-assigned id
    id: SubscriberId,

    /// Caller-supplied user id (duplicates allowed across handles)
    user_id: String,

    /// Display name presented at connect time
    user_name: String,

    /// Sending side of the subscriber's outbound channel
    outbound: mpsc::Sender<RelayMessage>,

    /// Whether the handle is still eligible for deliveries
    active: AtomicBool,

    /// Terminal signal, fired at most once
    terminal: Mutex<Option<oneshot::Sender<Error>>>,
}

impl SubscriberHandle {
    /// Create a handle together with its channel ends
    pub(super) fn new(
        id: SubscriberId,
        user: &UserInfo,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<RelayMessage>, RegistrationToken) {
        let (outbound, outbound_rx) = mpsc::channel(capacity);
        let (terminal_tx, terminal_rx) = oneshot::channel();

        let handle = Arc::new(Self {
            id,
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            outbound,
            active: AtomicBool::new(true),
            terminal: Mutex::new(Some(terminal_tx)),
        });
        let token = RegistrationToken {
            id,
            terminal: terminal_rx,
        };

        (handle, outbound_rx, token)
    }

    /// Registry-assigned id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Caller-supplied user id (may be shared by other handles)
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Display name presented at connect time
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Whether the handle is still eligible for deliveries
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Queue one message on the outbound channel
    ///
    /// Blocks while the channel is full. Fails when the receiving side has
    /// gone away, which is how a dead transport surfaces during fan-out.
    pub async fn deliver(&self, message: RelayMessage) -> Result<(), Error> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| Error::ChannelClosed(self.id))
    }

    /// Flip the active flag off
    ///
    /// Returns true if this call did the flip.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::Relaxed)
    }

    /// Retire the handle with a terminal error
    ///
    /// Deactivates, then fires the terminal signal. Only the first caller's
    /// error reaches the session; later calls are no-ops.
    pub fn fail(&self, error: Error) {
        self.deactivate();
        if let Some(tx) = self.take_terminal() {
            // Session may already have stopped listening
            let _ = tx.send(error);
        }
    }

    /// Retire the handle cleanly
    ///
    /// Deactivates and drops the terminal sender, resolving the session
    /// without an error.
    pub fn retire(&self) {
        self.deactivate();
        drop(self.take_terminal());
    }

    fn take_terminal(&self) -> Option<oneshot::Sender<Error>> {
        match self.terminal.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Ticket tied to one registration's terminal signal
///
/// Resolves with the delivery error when a failed delivery retires the
/// handle, or cleanly when the registry retires it in an orderly way.
pub struct RegistrationToken {
    id: SubscriberId,
    terminal: oneshot::Receiver<Error>,
}

impl RegistrationToken {
    /// Id of the registration this token belongs to
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the registration to end
    pub async fn terminated(self) -> Result<(), Error> {
        match self.terminal.await {
            Ok(err) => Err(err),
            // Sender dropped without a signal: clean retirement
            Err(_) => Ok(()),
        }
    }
}

/// Everything a successful registration hands back
pub struct Registration {
    /// Shared handle stored in the arena
    pub handle: Arc<SubscriberHandle>,
    /// Receiving side of the outbound channel; the caller's writer task
    /// drains this onto the transport
    pub outbound: mpsc::Receiver<RelayMessage>,
    /// Token the subscriber's session blocks on
    pub token: RegistrationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle(
        capacity: usize,
    ) -> (Arc<SubscriberHandle>, mpsc::Receiver<RelayMessage>, RegistrationToken) {
        SubscriberHandle::new(SubscriberId(7), &UserInfo::new("u-1", "Alice"), capacity)
    }

    #[tokio::test]
    async fn test_deliver_and_drain() {
        let (handle, mut rx, _token) = test_handle(4);

        handle.deliver(RelayMessage::new("u-2", "hello")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.content, "hello");
        assert_eq!(received.publisher_id, "u-2");
    }

    #[tokio::test]
    async fn test_deliver_fails_after_receiver_drops() {
        let (handle, rx, _token) = test_handle(4);
        drop(rx);

        let result = handle.deliver(RelayMessage::new("u-2", "hello")).await;
        assert!(matches!(result, Err(Error::ChannelClosed(id)) if id == handle.id()));
    }

    #[tokio::test]
    async fn test_fail_signals_terminal_once() {
        let (handle, _rx, token) = test_handle(4);

        handle.fail(Error::ChannelClosed(handle.id()));
        // Second failure has nowhere to go and must not panic
        handle.fail(Error::Cancelled);

        assert!(!handle.is_active());
        match token.terminated().await {
            Err(Error::ChannelClosed(_)) => {}
            other => panic!("expected the first failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retire_resolves_cleanly() {
        let (handle, _rx, token) = test_handle(4);

        handle.retire();

        assert!(!handle.is_active());
        assert!(token.terminated().await.is_ok());
    }

    #[test]
    fn test_deactivate_reports_first_flip() {
        let (handle, _rx, _token) = test_handle(4);

        assert!(handle.deactivate());
        assert!(!handle.deactivate());
    }
}
