//! OS signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) both request a graceful shutdown.

use std::io;

/// Resolve once the process is asked to stop.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => tracing::debug!("Received SIGTERM"),
        _ = interrupt.recv() => tracing::debug!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::debug!("Received Ctrl+C");
    Ok(())
}
