//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Detect upgrade requests
//! - Replay the handshake against the backend
//! - Splice both upgraded connections once the backend switches protocols
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded bytes ────→ Proxy ←──── upgraded bytes ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Byte-level relay after the 101; frames are never parsed
//! - A non-101 backend answer is returned to the client as is

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, Response, StatusCode},
};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;

use crate::http::forward::{open, prepare_request, ForwardError};
use crate::net::connector::BackendConnector;
use crate::net::splice::splice;
use crate::observability::metrics;
use crate::routing::Target;

/// Whether `headers` ask for a protocol upgrade.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Forward an upgrade request to `target` and relay the upgraded streams.
pub async fn forward_upgrade<B>(
    connector: &BackendConnector,
    target: &Target,
    mut req: Request<B>,
) -> Result<Response<Body>, ForwardError>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let client_upgrade = hyper::upgrade::on(&mut req);
    let req = prepare_request(req, target)?;
    let (mut sender, conn) = open(connector, target).await?;

    let backend = target.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            tracing::debug!(backend = %backend, error = %e, "Backend connection closed with error");
        }
    });

    let mut res = sender
        .send_request(req)
        .await
        .map_err(|source| ForwardError::Request {
            target: target.to_string(),
            source,
        })?;

    if res.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::debug!(status = %res.status(), "Backend declined upgrade");
        return Ok(res.map(Body::new));
    }

    let backend_upgrade = hyper::upgrade::on(&mut res);
    tokio::spawn(async move {
        match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok((client, backend)) => {
                let report = splice(TokioIo::new(client), TokioIo::new(backend)).await;
                report.log();
                metrics::record_splice(&report);
            }
            Err(e) => tracing::warn!(error = %e, "Upgrade failed"),
        }
    });

    let (parts, _) = res.into_parts();
    Ok(Response::from_parts(parts, Body::empty()))
}
