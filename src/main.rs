//! Multi-protocol reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//! raw / raw-tls       ─▶ listener ─▶ forwarder ─(TLS accept)─▶ splice ─▶ backend
//!
//! http / https        ─▶ listener ─▶ sniff ─┬─ plaintext ──┐
//! ws / wss                                  └─ TLS accept ─┴─▶ dispatch ─▶ backend
//!                                              (subdomain, leg, upgrade)
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use mux_proxy::config::loader::expand_home;
use mux_proxy::config::{load_config, ConfigError};
use mux_proxy::lifecycle::{wait_for_signal, Proxy, Shutdown};
use mux_proxy::net::tls::load_acceptor;
use mux_proxy::observability::{logging, metrics};
use mux_proxy::routing::RouteTable;

#[derive(Parser)]
#[command(name = "mux-proxy", version, about = "Multi-protocol reverse proxy", long_about = None)]
struct Cli {
    /// Path to config file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Append logs to this file as well as stdout.
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Enable verbose logs.
    #[arg(short, long)]
    verbose: bool,

    /// Address every listener binds to.
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(&logging::LogOptions {
        verbose: cli.verbose,
        file: cli.logfile.as_deref().map(expand_home),
    })?;

    tracing::info!("Starting proxy server version {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(path = %cli.config.display(), "Found config path");

    let config = load_config(&cli.config)?;
    let table = RouteTable::load(&config)?;

    let acceptor = match &config.certificates {
        Some(certificates) => Some(load_acceptor(certificates).map_err(ConfigError::from)?),
        None => None,
    };

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let proxy = Proxy::bind(&table, acceptor, cli.bind).await?;
    for addr in proxy.local_addrs() {
        tracing::info!(address = %addr, "Listening for connections");
    }

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
        shutdown.trigger();
    });

    proxy.run(stopped).await;
    Ok(())
}
