//! TCP listeners and accept loops.
//!
//! # Responsibilities
//! - Bind one socket per raw route and per logical HTTP port
//! - Accept connections and spawn one task per session
//! - Stop accepting on shutdown; in-flight sessions keep running

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::net::connection::ConnectionTracker;
use crate::net::forwarder::RawForwarder;
use crate::net::sniff::Multiplexer;
use crate::observability::metrics;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
        }
    }
}

/// What a listener does with the connections it accepts.
#[derive(Debug, Clone)]
pub enum PortHandler {
    /// `raw` / `raw-tls`: splice straight to the backend.
    Raw(Arc<RawForwarder>),
    /// HTTP-family: sniff and dispatch per request.
    Multiplexed(Arc<Multiplexer>),
}

impl PortHandler {
    /// Label for logs and the connection counter.
    pub fn kind(&self) -> &'static str {
        match self {
            PortHandler::Raw(_) => "raw",
            PortHandler::Multiplexed(_) => "multiplexed",
        }
    }

    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        match self {
            PortHandler::Raw(forwarder) => forwarder.handle(stream, peer).await,
            PortHandler::Multiplexed(mux) => mux.handle(stream, peer).await,
        }
    }
}

/// A bound listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind `addr`; a port already in use is an error.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        tracing::debug!(address = %local_addr, "Listener bound");
        Ok(Self { inner, local_addr })
    }

    /// Bound address, with the real port when `0` was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until shutdown is signalled.
    pub async fn run(
        self,
        handler: PortHandler,
        tracker: ConnectionTracker,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let port = self.local_addr.port();
        tracing::info!(port, kind = handler.kind(), "Setup port {}", port);

        loop {
            tokio::select! {
                accepted = self.inner.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(port, error = %e, "Accept error");
                            // avoid a hot loop on persistent errors (e.g. EMFILE)
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);
                    let guard = tracker.track();
                    let span = tracing::info_span!("session", id = %guard.id(), port, peer = %peer);
                    metrics::record_connection(handler.kind());
                    tracing::debug!(parent: &span, "Connection established");

                    let handler = handler.clone();
                    tokio::spawn(
                        async move {
                            handler.handle(stream, peer).await;
                            drop(guard);
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!(port, "Listener stopping");
                    break;
                }
            }
        }
    }
}
