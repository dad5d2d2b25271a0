//! Relay frame types
//!
//! This module defines the identities peers present and the frames that
//! travel between them.

use chrono::{DateTime, Utc};

/// Identity a subscriber presents when connecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Caller-supplied identifier. Not required to be unique; several
    /// live connections may present the same id.
    pub id: String,
    /// Human-readable display name
    pub name: String,
}

impl UserInfo {
    /// Create a new user identity
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for UserInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Subscriber registration request, sent as the first frame on a
/// subscriber stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Who is subscribing
    pub user: UserInfo,
    /// Carried on the wire for schema compatibility. The server registers
    /// every accepted stream as eligible for deliveries regardless of
    /// this flag.
    pub active: bool,
}

impl ConnectRequest {
    /// Create a request that subscribes immediately
    pub fn new(user: UserInfo) -> Self {
        Self { user, active: true }
    }
}

/// A message relayed to every active subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    /// Id of the user who published the message
    pub publisher_id: String,
    /// Message body
    pub content: String,
    /// Publication time. Publishers may leave this unset, in which case
    /// the server assigns one during fan-out.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RelayMessage {
    /// Create a message without a timestamp
    pub fn new(publisher_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            publisher_id: publisher_id.into(),
            content: content.into(),
            timestamp: None,
        }
    }

    /// Attach a publication timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Render the timestamp as `HH:MM:SS` (UTC), or a placeholder when
    /// the message carries none
    pub fn format_timestamp(&self) -> String {
        match &self.timestamp {
            Some(ts) => ts.format("%H:%M:%S").to_string(),
            None => "unknown".to_string(),
        }
    }
}

/// A single protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Open a subscriber stream
    Connect(ConnectRequest),
    /// Relay a message: a publish when sent by a client, a delivery when
    /// sent by the server
    Message(RelayMessage),
    /// Acknowledge a publish or end the exchange
    Close,
}
