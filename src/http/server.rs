//! HTTP dispatch engine for one logical port.
//!
//! # Responsibilities
//! - Serve HTTP/1.1 on a connection handed over by the multiplexer
//! - Resolve the subdomain of each request and select its route
//! - Forward plain requests and upgrades to the selected backend
//! - Answer unroutable requests with the synthetic error, or abort upgrades
//!
//! # Design Decisions
//! - One engine per logical port, shared by both legs
//! - The leg is fixed per connection, so each connection gets its own service
//! - A service error aborts the connection without writing a response

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use tokio::io::{AsyncRead, AsyncWrite};
use tower::{service_fn, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::http::forward::{forward_request, ForwardError};
use crate::http::response::error_response;
use crate::http::websocket::{forward_upgrade, is_upgrade_request};
use crate::net::connector::BackendConnector;
use crate::observability::metrics;
use crate::routing::{resolve_subdomain, Leg, LogicalPort};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No route on port {port} for {leg} request")]
    NoRoute { port: u16, leg: Leg },
    #[error(transparent)]
    Upstream(#[from] ForwardError),
}

impl DispatchError {
    /// Status of the synthetic response for a plain request.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoRoute { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Human name of a request kind, as used in log lines.
fn request_kind(leg: Leg, upgrade: bool) -> &'static str {
    match (leg, upgrade) {
        (Leg::Plaintext, false) => "HTTP",
        (Leg::Tls, false) => "HTTPS",
        (Leg::Plaintext, true) => "WebSocket",
        (Leg::Tls, true) => "Secure WebSocket",
    }
}

/// Host the client addressed: the `Host` header, else the URI authority.
fn request_host<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| req.uri().authority().map(|authority| authority.to_string()))
}

/// Routes requests arriving on one logical port.
#[derive(Debug)]
pub struct DispatchEngine {
    port: LogicalPort,
    connector: BackendConnector,
}

impl DispatchEngine {
    /// Engine serving the routes of `port`.
    pub fn new(port: LogicalPort, connector: BackendConnector) -> Self {
        Self { port, connector }
    }

    /// Routes this engine dispatches to.
    pub fn port(&self) -> &LogicalPort {
        &self.port
    }

    /// Serve HTTP/1.1 on `io` until the client goes away.
    pub async fn serve<IO>(self: &Arc<Self>, io: IO, leg: Leg, peer: SocketAddr)
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let engine = Arc::clone(self);
        let service = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .service(service_fn(move |req: Request<Incoming>| {
                let engine = Arc::clone(&engine);
                async move { engine.respond(req, leg, peer).await }
            }));

        let result = http1::Builder::new()
            .serve_connection(TokioIo::new(io), TowerToHyperService::new(service))
            .with_upgrades()
            .await;

        if let Err(e) = result {
            debug!(leg = %leg, error = %e, "Connection closed");
        }
    }

    /// Dispatch a request and turn plain-request failures into responses.
    ///
    /// Failed upgrades stay errors so the connection is dropped without a
    /// response.
    pub async fn respond<B>(
        &self,
        req: Request<B>,
        leg: Leg,
        peer: SocketAddr,
    ) -> Result<Response<Body>, DispatchError>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let upgrade = is_upgrade_request(req.headers());
        match self.dispatch(req, leg, peer).await {
            Ok(res) => Ok(res),
            Err(e) if upgrade => Err(e),
            Err(e) => Ok(error_response(e.status())),
        }
    }

    /// Select the route for `req` and forward it.
    pub async fn dispatch<B>(
        &self,
        req: Request<B>,
        leg: Leg,
        peer: SocketAddr,
    ) -> Result<Response<Body>, DispatchError>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let port = self.port.port();
        let upgrade = is_upgrade_request(req.headers());
        let kind = request_kind(leg, upgrade);
        let host = request_host(&req);
        let subdomain = resolve_subdomain(host.as_deref());

        let Some(route) = self.port.select(leg, &subdomain, upgrade) else {
            info!(
                peer = %peer,
                host = host.as_deref().unwrap_or(""),
                "Unable to proxy {} request: Port not found",
                kind
            );
            metrics::record_request(port, leg, "no_route");
            return Err(DispatchError::NoRoute { port, leg });
        };

        debug!(
            route = route.index,
            backend = %route.target,
            method = %req.method(),
            path = %req.uri().path(),
            "Forwarding {} request",
            kind
        );

        let result = if upgrade {
            forward_upgrade(&self.connector, &route.target, req).await
        } else {
            forward_request(&self.connector, &route.target, req).await
        };

        match result {
            Ok(res) => {
                let outcome = if res.status() == StatusCode::SWITCHING_PROTOCOLS {
                    "upgraded"
                } else {
                    "forwarded"
                };
                metrics::record_request(port, leg, outcome);
                Ok(res)
            }
            Err(e) => {
                warn!(peer = %peer, route = route.index, error = %e, "Unable to proxy {} request", kind);
                metrics::record_request(port, leg, "upstream_error");
                Err(e.into())
            }
        }
    }
}
