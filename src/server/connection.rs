//! Per-connection handling
//!
//! The peer's first frame decides its role: `Connect` turns the connection
//! into a long-lived subscriber stream, `Message` is a one-shot publish
//! answered with `Close`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::broadcast::BroadcastCoordinator;
use crate::error::Result;
use crate::protocol::{codec, ConnectRequest, Frame, RelayMessage};
use crate::registry::SubscriberRegistry;
use crate::server::config::ServerConfig;
use crate::session::SubscriberSession;
use crate::stats::RelayStats;

/// Handler for a single accepted connection
pub(crate) struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    config: ServerConfig,
    registry: Arc<SubscriberRegistry>,
    coordinator: Arc<BroadcastCoordinator>,
    stats: Arc<RelayStats>,
}

impl Connection {
    pub(crate) fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        registry: Arc<SubscriberRegistry>,
        coordinator: Arc<BroadcastCoordinator>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            config,
            registry,
            coordinator,
            stats,
        }
    }

    /// Drive the connection to completion
    pub(crate) async fn run(&mut self, socket: TcpStream) -> Result<()> {
        let (mut reader, writer) = socket.into_split();

        let first = tokio::time::timeout(
            self.config.connection_timeout,
            codec::read_frame(&mut reader, self.config.max_frame_size),
        )
        .await??;

        match first {
            Some(Frame::Connect(request)) => self.serve_subscriber(reader, writer, request).await,
            Some(Frame::Message(message)) => self.serve_publish(writer, message).await,
            Some(Frame::Close) | None => {
                tracing::debug!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    "Peer closed before choosing a role"
                );
                Ok(())
            }
        }
    }

    /// Long-lived subscriber stream
    ///
    /// Registers the subscriber, spawns a writer for its outbound channel,
    /// and parks the session until the terminal signal or the peer hangs
    /// up. The reader is only kept around as a disconnect signal.
    async fn serve_subscriber(
        &mut self,
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        request: ConnectRequest,
    ) -> Result<()> {
        let registration = match self.registry.register(&request.user).await {
            Ok(registration) => registration,
            Err(err) => {
                tracing::warn!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    user = %request.user.id,
                    error = %err,
                    "Registration refused"
                );
                return Err(err.into());
            }
        };
        self.stats.record_registration();

        let handle = Arc::clone(&registration.handle);
        let mut session =
            SubscriberSession::new(self.session_id, self.peer_addr, request.user.id.clone());
        session.activate(registration.token);

        tracing::info!(
            session_id = self.session_id,
            subscriber = %handle.id(),
            user = handle.user_id(),
            peer = %self.peer_addr,
            "Subscriber stream open"
        );

        let writer_task = tokio::spawn(forward_deliveries(writer, registration.outbound));

        let max_frame_size = self.config.max_frame_size;
        let result = session
            .wait(wait_for_disconnect(reader, max_frame_size))
            .await;

        // Reader EOF and terminal failure both end the session; either
        // way, make sure later rounds skip this handle.
        let _ = self.registry.retire(handle.id()).await;
        writer_task.abort();

        match result {
            Ok(()) => {
                tracing::info!(
                    session_id = self.session_id,
                    subscriber = %handle.id(),
                    "Subscriber stream closed"
                );
                Ok(())
            }
            Err(err) if err.is_cancellation() => {
                // Peer hung up; the normal way a subscription ends
                tracing::info!(
                    session_id = self.session_id,
                    subscriber = %handle.id(),
                    "Subscriber disconnected"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    session_id = self.session_id,
                    subscriber = %handle.id(),
                    error = %err,
                    "Subscriber stream failed"
                );
                Err(err)
            }
        }
    }

    /// One-shot publish, acknowledged with `Close`
    async fn serve_publish(
        &mut self,
        mut writer: OwnedWriteHalf,
        message: RelayMessage,
    ) -> Result<()> {
        let publisher = message.publisher_id.clone();
        let outcome = self.coordinator.publish(message).await;
        self.stats.record_publish(&outcome);

        tracing::info!(
            session_id = self.session_id,
            publisher = %publisher,
            delivered = outcome.delivered,
            failed = outcome.failed,
            "Publish relayed"
        );

        codec::write_frame(&mut writer, &Frame::Close).await
    }
}

/// Drain the outbound channel onto the socket
///
/// Stops on the first write failure. Dropping the receiver makes the next
/// fan-out delivery fail, which is what retires the handle.
async fn forward_deliveries(mut writer: OwnedWriteHalf, mut outbound: mpsc::Receiver<RelayMessage>) {
    while let Some(message) = outbound.recv().await {
        if let Err(err) = codec::write_frame(&mut writer, &Frame::Message(message)).await {
            tracing::debug!(error = %err, "Subscriber write failed");
            break;
        }
    }
}

/// Watch a subscriber's read half until the peer goes away
///
/// Subscribers have nothing to say after `Connect`; stray frames are
/// ignored. Resolves on EOF or a read error.
async fn wait_for_disconnect(mut reader: OwnedReadHalf, max_frame_size: usize) {
    loop {
        match codec::read_frame(&mut reader, max_frame_size).await {
            Ok(Some(_)) => {
                tracing::debug!("Ignoring frame on subscriber stream");
            }
            Ok(None) | Err(_) => return,
        }
    }
}
