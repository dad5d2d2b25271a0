//! Relay server listener
//!
//! Handles the TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::broadcast::BroadcastCoordinator;
use crate::error::Result;
use crate::registry::{CompactionPolicy, RegistryConfig, SubscriberRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::RelayStats;

/// Broadcast relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<SubscriberRegistry>,
    coordinator: Arc<BroadcastCoordinator>,
    stats: Arc<RelayStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry = Arc::new(SubscriberRegistry::with_config(registry_config));
        let coordinator = Arc::new(BroadcastCoordinator::new(Arc::clone(&registry)));

        Self {
            config,
            registry,
            coordinator,
            stats: Arc::new(RelayStats::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get a reference to the fan-out coordinator
    pub fn coordinator(&self) -> &Arc<BroadcastCoordinator> {
        &self.coordinator
    }

    /// Get a reference to the server counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` fires, the accept loop stops and every subscriber
    /// session is retired cleanly.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Accept on an already-bound listener
    ///
    /// Useful when binding to an ephemeral port: bind first, read the
    /// local address, then hand the listener over.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Relay server listening");

        // Background sweeps only exist under the periodic policy
        let compaction_handle = if self.registry.config().compaction == CompactionPolicy::Periodic
        {
            Some(self.registry.spawn_compaction_task())
        } else {
            None
        };

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        if let Some(handle) = compaction_handle {
            handle.abort();
        }

        // Resolve every parked subscriber session cleanly
        self.registry.drain().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.stats.record_connection();

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);
        let coordinator = Arc::clone(&self.coordinator);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            // Hold the permit for the connection's whole lifetime
            let _permit = permit;

            let mut connection =
                Connection::new(session_id, peer_addr, config, registry, coordinator, stats);

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
