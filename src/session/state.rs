//! Subscriber session state machine
//!
//! Tracks one server-side subscriber stream from connection to termination.

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::Error;
use crate::registry::RegistrationToken;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, registration not complete
    Connecting,
    /// Registered and parked on the terminal signal
    Active,
    /// Terminal signal or cancellation observed
    Terminated,
}

/// State for one subscriber session
///
/// The session registers, then parks on [`wait`](SubscriberSession::wait)
/// for as long as the subscription lives. That call resolving *is* the
/// session ending; there is no other exit.
pub struct SubscriberSession {
    /// Server-assigned connection id
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Caller-supplied user id
    pub user_id: String,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when registration completed
    pub registered_at: Option<Instant>,

    /// Token carrying the terminal signal, consumed by `wait`
    token: Option<RegistrationToken>,
}

impl SubscriberSession {
    /// Create a new session in the connecting phase
    pub fn new(id: u64, peer_addr: SocketAddr, user_id: impl Into<String>) -> Self {
        Self {
            id,
            peer_addr,
            user_id: user_id.into(),
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            registered_at: None,
            token: None,
        }
    }

    /// Complete registration, entering the active phase
    pub fn activate(&mut self, token: RegistrationToken) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Active;
            self.registered_at = Some(Instant::now());
            self.token = Some(token);
        }
    }

    /// Check if the session is active
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Park until the session terminates
    ///
    /// Resolves with the terminal error when a failed delivery retires the
    /// subscriber, cleanly when the registry retires it in an orderly way,
    /// and with a cancellation error as soon as `cancel` fires.
    pub async fn wait<F>(&mut self, cancel: F) -> Result<(), Error>
    where
        F: std::future::Future<Output = ()>,
    {
        let token = match self.token.take() {
            Some(token) => token,
            None => {
                // Never activated; nothing to wait on
                self.phase = SessionPhase::Terminated;
                return Ok(());
            }
        };

        let result = tokio::select! {
            outcome = token.terminated() => outcome,
            _ = cancel => Err(Error::Cancelled),
        };
        self.phase = SessionPhase::Terminated;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::protocol::UserInfo;
    use crate::registry::SubscriberRegistry;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4550)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let registry = SubscriberRegistry::new();
        let registration = registry
            .register(&UserInfo::new("u-1", "Alice"))
            .await
            .unwrap();

        let mut session = SubscriberSession::new(1, addr(), "u-1");
        assert_eq!(session.phase, SessionPhase::Connecting);

        session.activate(registration.token);
        assert!(session.is_active());
        assert!(session.registered_at.is_some());

        // Clean retirement resolves the wait without an error
        registry.retire(registration.handle.id()).await.unwrap();
        let result = session.wait(std::future::pending()).await;
        assert!(result.is_ok());
        assert_eq!(session.phase, SessionPhase::Terminated);
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_error() {
        let registry = SubscriberRegistry::new();
        let registration = registry
            .register(&UserInfo::new("u-1", "Alice"))
            .await
            .unwrap();
        let id = registration.handle.id();

        let mut session = SubscriberSession::new(1, addr(), "u-1");
        session.activate(registration.token);

        registration.handle.fail(Error::ChannelClosed(id));

        match session.wait(std::future::pending()).await {
            Err(Error::ChannelClosed(failed)) => assert_eq!(failed, id),
            other => panic!("expected terminal error, got {:?}", other),
        }
        assert_eq!(session.phase, SessionPhase::Terminated);
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_wait() {
        let registry = SubscriberRegistry::new();
        let registration = registry
            .register(&UserInfo::new("u-1", "Alice"))
            .await
            .unwrap();

        let mut session = SubscriberSession::new(1, addr(), "u-1");
        session.activate(registration.token);

        // Cancel fires immediately; the terminal signal never will
        let result = session.wait(async {}).await;
        match result {
            Err(err) => assert!(err.is_cancellation()),
            Ok(()) => panic!("expected cancellation"),
        }
        assert_eq!(session.phase, SessionPhase::Terminated);
    }

    #[tokio::test]
    async fn test_wait_without_activation() {
        let mut session = SubscriberSession::new(1, addr(), "u-1");

        assert!(session.wait(std::future::pending()).await.is_ok());
        assert_eq!(session.phase, SessionPhase::Terminated);
    }
}
