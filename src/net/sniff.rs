//! Protocol sniffing multiplexer for HTTP-family ports.
//!
//! One external port serves both plaintext HTTP and TLS. The first byte of
//! each connection is peeked (never consumed) and decides which leg of the
//! dispatch engine receives the untouched stream.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::http::DispatchEngine;
use crate::routing::Leg;

/// Record type of a TLS handshake record, the first byte of every ClientHello.
pub const TLS_HANDSHAKE_RECORD: u8 = 0x16;

/// Classify a connection by its first byte; no byte counts as plaintext.
pub fn classify(first: Option<u8>) -> Leg {
    match first {
        Some(TLS_HANDSHAKE_RECORD) => Leg::Tls,
        _ => Leg::Plaintext,
    }
}

/// Peek the first byte of `stream` without removing it from the socket.
///
/// Returns `None` when the peer closed before sending anything.
pub async fn peek_first_byte(stream: &TcpStream) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    let n = stream.peek(&mut byte).await?;
    Ok((n > 0).then_some(byte[0]))
}

/// Routes accepted connections of one logical port to the proper leg.
pub struct Multiplexer {
    engine: Arc<DispatchEngine>,
    acceptor: Option<TlsAcceptor>,
}

impl Multiplexer {
    /// `acceptor` serves the TLS leg; without one, TLS clients are dropped.
    pub fn new(engine: Arc<DispatchEngine>, acceptor: Option<TlsAcceptor>) -> Self {
        Self { engine, acceptor }
    }

    /// External port this multiplexer listens on.
    pub fn port(&self) -> u16 {
        self.engine.port().port()
    }

    /// Sniff, optionally terminate TLS, and serve the connection.
    pub async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let first = match peek_first_byte(&stream).await {
            Ok(Some(byte)) => byte,
            Ok(None) => {
                debug!("Peer closed before sending data");
                return;
            }
            Err(e) => {
                debug!(error = %e, "Failed to read first byte");
                return;
            }
        };

        debug!(first_byte = first, "Multiplexer first byte");
        match classify(Some(first)) {
            Leg::Plaintext => self.engine.serve(stream, Leg::Plaintext, peer).await,
            Leg::Tls => {
                let Some(acceptor) = &self.acceptor else {
                    warn!(port = self.port(), "TLS connection on a port without a certificate");
                    return;
                };
                match acceptor.accept(stream).await {
                    Ok(tls) => self.engine.serve(tls, Leg::Tls, peer).await,
                    Err(e) => warn!(error = %e, "HTTPS client error"),
                }
            }
        }
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("port", &self.port())
            .field("tls", &self.acceptor.is_some())
            .finish()
    }
}
