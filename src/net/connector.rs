//! Outbound connections to backends.

use std::io;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::net::tls::{insecure_client_config, TlsError};
use crate::routing::Target;

/// Any duplex byte stream the proxy can forward over.
pub trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ProxyStream for T {}

/// A backend stream, plaintext or TLS.
pub type BoxedStream = Box<dyn ProxyStream>;

/// Opens one fresh connection per call; nothing is pooled.
#[derive(Clone)]
pub struct BackendConnector {
    tls: TlsConnector,
}

impl BackendConnector {
    /// Build the connector and its backend TLS configuration.
    pub fn new() -> Result<Self, TlsError> {
        Ok(Self {
            tls: TlsConnector::from(insecure_client_config()?),
        })
    }

    /// Connect to `target`, wrapping the socket in TLS when the target asks for it.
    pub async fn connect(&self, target: &Target) -> io::Result<BoxedStream> {
        let tcp = TcpStream::connect((target.address.as_str(), target.port)).await?;
        tcp.set_nodelay(true)?;

        if !target.tls {
            return Ok(Box::new(tcp));
        }

        let name = ServerName::try_from(target.address.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = self.tls.connect(name, tcp).await?;
        Ok(Box::new(stream))
    }
}

impl std::fmt::Debug for BackendConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_plaintext() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hello").await.unwrap();
        });

        let connector = BackendConnector::new().unwrap();
        let mut stream = connector
            .connect(&Target {
                address: "127.0.0.1".into(),
                port,
                tls: false,
            })
            .await
            .unwrap();

        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = BackendConnector::new().unwrap();
        let result = connector
            .connect(&Target {
                address: "127.0.0.1".into(),
                port,
                tls: false,
            })
            .await;
        assert!(result.is_err());
    }
}
