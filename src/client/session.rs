//! Relay client sessions
//!
//! `RelayClient` opens one connection per operation: `subscribe` starts a
//! long-lived delivery stream, `publish` performs a single relay exchange
//! acknowledged by the server.
//!
//! # Example
//! ```no_run
//! use relay_rs::client::{ClientConfig, ConsoleSink, RelayClient};
//!
//! # async fn example() -> relay_rs::error::Result<()> {
//! let config = ClientConfig::new("127.0.0.1:8080".parse().unwrap(), "alice");
//! let client = RelayClient::new(config);
//!
//! let mut subscription = client.subscribe().await?;
//! client.publish("hello, everyone").await?;
//!
//! let mut sink = ConsoleSink;
//! let shutdown = async {
//!     let _ = tokio::signal::ctrl_c().await;
//! };
//! subscription.run_until(shutdown, &mut sink).await?;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::config::ClientConfig;
use super::sink::MessageSink;
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{codec, ConnectRequest, Frame, RelayMessage, UserInfo};

/// Client for a relay server
pub struct RelayClient {
    config: ClientConfig,
}

impl RelayClient {
    /// Create a client
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a subscriber stream
    ///
    /// Sends the connect frame and returns the live subscription. The
    /// stream stays open until the server goes away or the subscription
    /// is dropped.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let mut stream = self.connect().await?;

        let user = UserInfo::new(self.config.user_id.clone(), self.config.display_name());
        codec::write_frame(&mut stream, &Frame::Connect(ConnectRequest::new(user))).await?;

        tracing::info!(
            server = %self.config.server_addr,
            user = %self.config.user_id,
            "Subscribed"
        );

        Ok(Subscription {
            stream,
            max_frame_size: self.config.max_frame_size,
        })
    }

    /// Publish one message
    ///
    /// Opens its own connection, stamps the message with the local clock,
    /// and waits for the server's acknowledgement. The relay has fully
    /// fanned out by the time this returns.
    pub async fn publish(&self, content: impl Into<String>) -> Result<()> {
        let mut stream = self.connect().await?;

        let message =
            RelayMessage::new(self.config.user_id.clone(), content).with_timestamp(Utc::now());
        codec::write_frame(&mut stream, &Frame::Message(message)).await?;

        match codec::read_frame(&mut stream, self.config.max_frame_size).await? {
            Some(Frame::Close) => Ok(()),
            Some(_) => {
                Err(ProtocolError::UnexpectedFrame("awaiting publish acknowledgement").into())
            }
            None => Err(ProtocolError::UnexpectedEof.into()),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.server_addr),
        )
        .await??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// A live subscriber stream
pub struct Subscription {
    stream: TcpStream,
    max_frame_size: usize,
}

impl Subscription {
    /// Receive the next delivery
    ///
    /// `Ok(None)` means the server ended the stream cleanly.
    pub async fn recv(&mut self) -> Result<Option<RelayMessage>> {
        match codec::read_frame(&mut self.stream, self.max_frame_size).await? {
            Some(Frame::Message(message)) => Ok(Some(message)),
            Some(Frame::Close) | None => Ok(None),
            Some(Frame::Connect(_)) => {
                Err(ProtocolError::UnexpectedFrame("connect frame from server").into())
            }
        }
    }

    /// Pump deliveries into a sink until shutdown or end of stream
    ///
    /// Each message reaches the sink with its timestamp already rendered.
    /// Returns `Ok` at clean end of stream; a fired `shutdown` surfaces
    /// as a cancellation error right away, even mid-wait.
    pub async fn run_until<F, S>(&mut self, shutdown: F, sink: &mut S) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
        S: MessageSink,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::debug!("Subscription cancelled");
                    return Err(Error::Cancelled);
                }
                delivery = self.recv() => match delivery? {
                    Some(message) => {
                        let timestamp = message.format_timestamp();
                        sink.deliver(&message, &timestamp);
                    }
                    None => {
                        tracing::info!("Server ended the stream");
                        return Ok(());
                    }
                },
            }
        }
    }
}
