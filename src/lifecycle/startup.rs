//! Startup orchestration.
//!
//! # Responsibilities
//! - Build one handler per raw route and per logical HTTP port
//! - Bind every listener before serving anything
//! - Run the accept loops until shutdown, then drain sessions
//!
//! # Design Decisions
//! - Fail fast: a port that cannot bind is fatal for the whole process
//! - Certificate presence is settled by config validation; a TLS connection
//!   reaching a listener without an acceptor is dropped at runtime
//! - One backend connector shared by every handler

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::http::DispatchEngine;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::connector::BackendConnector;
use crate::net::forwarder::RawForwarder;
use crate::net::listener::{Listener, ListenerError, PortHandler};
use crate::net::sniff::Multiplexer;
use crate::net::tls::TlsError;
use crate::routing::RouteTable;

/// How long sessions may keep running after the listeners stop.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Every listener of the process, bound and ready to accept.
#[derive(Debug)]
pub struct Proxy {
    listeners: Vec<(Listener, PortHandler)>,
    tracker: ConnectionTracker,
}

impl Proxy {
    /// Bind a listener for every raw route and every logical HTTP port.
    pub async fn bind(
        table: &RouteTable,
        acceptor: Option<TlsAcceptor>,
        bind_ip: IpAddr,
    ) -> Result<Self, StartupError> {
        let connector = BackendConnector::new()?;
        let mut listeners = Vec::new();

        for route in table.raw_routes() {
            let listener = Listener::bind(SocketAddr::new(bind_ip, route.inbound)).await?;
            let forwarder = RawForwarder::new(route.clone(), acceptor.clone(), connector.clone());
            listeners.push((listener, PortHandler::Raw(Arc::new(forwarder))));
        }

        for (&port, group) in table.http_groups_by_port() {
            let listener = Listener::bind(SocketAddr::new(bind_ip, port)).await?;
            let engine = Arc::new(DispatchEngine::new(group.clone(), connector.clone()));
            let mux = Multiplexer::new(engine, acceptor.clone());
            listeners.push((listener, PortHandler::Multiplexed(Arc::new(mux))));
        }

        Ok(Self {
            listeners,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Addresses actually bound, in raw-then-HTTP order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .map(|(listener, _)| listener.local_addr())
            .collect()
    }

    /// Accept on every listener until `shutdown` fires, then drain.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let stop = Shutdown::new();
        let mut accept_loops = JoinSet::new();
        for (listener, handler) in self.listeners {
            accept_loops.spawn(listener.run(handler, self.tracker.clone(), stop.subscribe()));
        }
        info!(listeners = accept_loops.len(), "Proxy running");

        let _ = shutdown.recv().await;
        info!("Shutdown signal received");
        stop.trigger();
        while accept_loops.join_next().await.is_some() {}

        let active = self.tracker.active_count();
        if active > 0 {
            info!(active, "Draining sessions");
        }
        if !self.tracker.wait_idle(DRAIN_TIMEOUT).await {
            warn!(
                active = self.tracker.active_count(),
                "Sessions still open after drain timeout"
            );
        }
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{HttpRoute, Mode, RawRoute, Route, SubdomainFilter};
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn free_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn binds_one_listener_per_raw_route_and_logical_port() {
        let raw = free_port().await;
        let http = free_port().await;
        let table = RouteTable::from_routes(vec![
            Route::Raw(RawRoute::new(0, raw, 9000, Mode::Raw, "main", "127.0.0.1")),
            Route::Http(HttpRoute::new(1, http, 9001, Mode::Http, "main", "127.0.0.1", SubdomainFilter::Any)),
            Route::Http(HttpRoute::new(2, http, 9002, Mode::Ws, "main", "127.0.0.1", SubdomainFilter::Any)),
        ]);

        let proxy = Proxy::bind(&table, None, LOCALHOST).await.unwrap();
        let mut ports: Vec<u16> = proxy.local_addrs().iter().map(SocketAddr::port).collect();
        ports.sort_unstable();
        let mut expected = vec![raw, http];
        expected.sort_unstable();
        assert_eq!(ports, expected);
    }

    #[tokio::test]
    async fn tls_routes_bind_without_an_acceptor() {
        let raw_tls = free_port().await;
        let https = free_port().await;
        let table = RouteTable::from_routes(vec![
            Route::Raw(RawRoute::new(0, raw_tls, 9000, Mode::RawTls, "main", "127.0.0.1")),
            Route::Http(HttpRoute::new(1, https, 9001, Mode::Https, "main", "127.0.0.1", SubdomainFilter::Any)),
        ]);

        let proxy = Proxy::bind(&table, None, LOCALHOST).await.unwrap();
        assert_eq!(proxy.local_addrs().len(), 2);
    }

    #[tokio::test]
    async fn occupied_port_fails_startup() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let table = RouteTable::from_routes(vec![Route::Raw(RawRoute::new(
            0,
            port,
            9000,
            Mode::Raw,
            "main",
            "127.0.0.1",
        ))]);

        let err = Proxy::bind(&table, None, LOCALHOST).await.unwrap_err();
        assert!(matches!(err, StartupError::Listener(_)));
    }

    #[tokio::test]
    async fn run_returns_after_shutdown() {
        let table = RouteTable::from_routes(vec![Route::Raw(RawRoute::new(
            0,
            free_port().await,
            9000,
            Mode::Raw,
            "main",
            "127.0.0.1",
        ))]);
        let proxy = Proxy::bind(&table, None, LOCALHOST).await.unwrap();

        let shutdown = Shutdown::new();
        let running = tokio::spawn(proxy.run(shutdown.subscribe()));
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("proxy should stop")
            .unwrap();
    }
}
