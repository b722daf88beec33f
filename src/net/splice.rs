//! Bidirectional byte splicing between two connected streams.
//!
//! # Design Decisions
//! - Both directions are pumped concurrently on the same task
//! - The first direction to end (EOF or error) ends the session: both write
//!   halves are shut down and both streams dropped, which unblocks the other
//!   direction
//! - No application framing and no buffering beyond one read buffer

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BUFFER_SIZE: usize = 8192;

/// Upper bound for flushing shutdowns once a session is over.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Which peer of a session something happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// Outcome of a finished splice.
#[derive(Debug)]
pub struct SpliceReport {
    /// Bytes copied from the client to the remote.
    pub to_remote: u64,
    /// Bytes copied from the remote to the client.
    pub to_client: u64,
    /// Peer whose read side ended the session.
    pub closed_by: Side,
    /// Error that ended the session, with the peer it came from.
    pub error: Option<(Side, io::Error)>,
}

impl SpliceReport {
    /// Log the outcome the way every forwarding path reports it.
    pub fn log(&self) {
        match &self.error {
            Some((Side::Client, e)) => tracing::warn!(side = %Side::Client, "Client socket: {}", e),
            Some((Side::Remote, e)) => tracing::warn!(side = %Side::Remote, "Remote socket: {}", e),
            None => {}
        }
        tracing::debug!(
            closed_by = %self.closed_by,
            to_remote = self.to_remote,
            to_client = self.to_client,
            "Session closed"
        );
    }
}

/// Copy `reader` into `writer` until EOF, counting bytes into `total`.
async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    from: Side,
    to: Side,
    total: &mut u64,
) -> Result<(), (Side, io::Error)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await.map_err(|e| (from, e))?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await.map_err(|e| (to, e))?;
        writer.flush().await.map_err(|e| (to, e))?;
        *total += n as u64;
    }
}

/// Splice `client` and `remote` until either side closes or errors.
pub async fn splice<C, R>(client: C, remote: R) -> SpliceReport
where
    C: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let mut to_remote = 0u64;
    let mut to_client = 0u64;

    let (closed_by, result) = {
        let upstream = pump(
            &mut client_read,
            &mut remote_write,
            Side::Client,
            Side::Remote,
            &mut to_remote,
        );
        let downstream = pump(
            &mut remote_read,
            &mut client_write,
            Side::Remote,
            Side::Client,
            &mut to_client,
        );
        tokio::pin!(upstream, downstream);

        tokio::select! {
            result = &mut upstream => (Side::Client, result),
            result = &mut downstream => (Side::Remote, result),
        }
    };

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = remote_write.shutdown().await;
        let _ = client_write.shutdown().await;
    })
    .await;

    SpliceReport {
        to_remote,
        to_client,
        closed_by,
        error: result.err(),
    }
}
