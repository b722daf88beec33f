//! Raw stream forwarding for `raw` and `raw-tls` ports.
//!
//! # Data Flow
//! ```text
//! accepted TCP ──(raw-tls: TLS accept)──▶ client stream
//!                                             │ splice
//! backend TCP  ──(raw-tls: TLS connect)──▶ remote stream
//! ```
//!
//! One outbound connection per session, no retry.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::net::connector::BackendConnector;
use crate::net::splice::{splice, Side, SpliceReport};
use crate::observability::metrics;
use crate::routing::{RawRoute, Target};

/// Connect to `target` and splice it with the accepted `client` stream.
///
/// A failed connect ends the session; the client stream is dropped.
pub async fn forward<C>(
    client: C,
    connector: &BackendConnector,
    target: &Target,
) -> io::Result<SpliceReport>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let remote = connector.connect(target).await?;
    Ok(splice(client, remote).await)
}

/// Handler owning one raw route.
pub struct RawForwarder {
    route: RawRoute,
    acceptor: Option<TlsAcceptor>,
    connector: BackendConnector,
}

impl RawForwarder {
    /// `acceptor` is only used when the route terminates TLS.
    pub fn new(route: RawRoute, acceptor: Option<TlsAcceptor>, connector: BackendConnector) -> Self {
        Self {
            route,
            acceptor,
            connector,
        }
    }

    /// Serve one accepted connection until either peer goes away.
    pub async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let route = &self.route;
        info!(
            peer = %peer,
            "Proxying {} {}: self:{} to {}:{}",
            route.mode,
            route.index,
            route.inbound,
            route.target.address,
            route.target.port
        );

        let result = if route.terminates_tls() {
            let Some(acceptor) = &self.acceptor else {
                warn!(port = route.inbound, "No certificate for raw-tls port");
                return;
            };
            match acceptor.accept(stream).await {
                Ok(tls) => forward(tls, &self.connector, &route.target).await,
                Err(e) => {
                    warn!(side = %Side::Client, "Client socket: {}", e);
                    return;
                }
            }
        } else {
            forward(stream, &self.connector, &route.target).await
        };

        match result {
            Ok(report) => {
                report.log();
                metrics::record_splice(&report);
            }
            Err(e) => warn!(side = %Side::Remote, backend = %route.target, "Remote socket: {}", e),
        }
    }
}

impl std::fmt::Debug for RawForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawForwarder")
            .field("route", &self.route)
            .field("tls", &self.acceptor.is_some())
            .finish()
    }
}
