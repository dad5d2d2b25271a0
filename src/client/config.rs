//! Client configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,

    /// User id presented on connect and stamped on published messages
    pub user_id: String,

    /// Display name; derived from the user id when not set
    pub user_name: Option<String>,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Largest accepted frame payload
    pub max_frame_size: usize,
}

impl ClientConfig {
    /// Create a config for the given server and user id
    pub fn new(server_addr: SocketAddr, user_id: impl Into<String>) -> Self {
        Self {
            server_addr,
            user_id: user_id.into(),
            user_name: None,
            connect_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the display name
    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the largest accepted frame payload
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// The display name to present on connect
    pub fn display_name(&self) -> String {
        match &self.user_name {
            Some(name) => name.clone(),
            None => format!("User-{}", self.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_new_config() {
        let config = ClientConfig::new(addr(), "u-1");

        assert_eq!(config.server_addr, addr());
        assert_eq!(config.user_id, "u-1");
        assert!(config.user_name.is_none());
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_display_name_fallback() {
        let config = ClientConfig::new(addr(), "u-1");
        assert_eq!(config.display_name(), "User-u-1");

        let config = config.user_name("Alice");
        assert_eq!(config.display_name(), "Alice");
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientConfig::new(addr(), "u-1")
            .user_name("Alice")
            .connect_timeout(Duration::from_secs(1))
            .max_frame_size(512);

        assert_eq!(config.user_name.as_deref(), Some("Alice"));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.max_frame_size, 512);
    }
}
