//! Forwarding of a single HTTP request to a route's backend.
//!
//! # Responsibilities
//! - Rewrite the request into origin form with the backend as `Host`
//! - Open one backend connection per request (no pooling, no retry)
//! - Stream the backend response back unchanged

use axum::{
    body::Body,
    http::{
        header::{self, HeaderValue, InvalidHeaderValue},
        uri::PathAndQuery,
        Request, Response, Uri, Version,
    },
};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;

use crate::net::connector::{BackendConnector, BoxedStream};
use crate::routing::Target;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },
    #[error("Handshake with {target} failed: {source}")]
    Handshake {
        target: String,
        source: hyper::Error,
    },
    #[error("Request to {target} failed: {source}")]
    Request {
        target: String,
        source: hyper::Error,
    },
    #[error("Invalid Host for backend: {0}")]
    InvalidHost(#[from] InvalidHeaderValue),
}

/// Rewrite `req` for the backend at `target`.
///
/// The URI becomes origin-form (path and query only) and `Host` names the
/// backend authority.
pub fn prepare_request<B>(mut req: Request<B>, target: &Target) -> Result<Request<B>, ForwardError> {
    let path = req
        .uri()
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    *req.uri_mut() = Uri::from(path);
    *req.version_mut() = Version::HTTP_11;

    let host = HeaderValue::from_str(&target.authority())?;
    req.headers_mut().insert(header::HOST, host);
    Ok(req)
}

/// Connect to `target` and perform the HTTP/1 client handshake.
pub(crate) async fn open<B>(
    connector: &BackendConnector,
    target: &Target,
) -> Result<
    (
        http1::SendRequest<B>,
        http1::Connection<TokioIo<BoxedStream>, B>,
    ),
    ForwardError,
>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = connector
        .connect(target)
        .await
        .map_err(|source| ForwardError::Connect {
            target: target.to_string(),
            source,
        })?;

    http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|source| ForwardError::Handshake {
            target: target.to_string(),
            source,
        })
}

/// Forward one request to `target` and return the backend's response.
pub async fn forward_request<B>(
    connector: &BackendConnector,
    target: &Target,
    req: Request<B>,
) -> Result<Response<Body>, ForwardError>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let req = prepare_request(req, target)?;
    let (mut sender, conn) = open(connector, target).await?;

    let backend = target.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(backend = %backend, error = %e, "Backend connection closed with error");
        }
    });

    let res = sender
        .send_request(req)
        .await
        .map_err(|source| ForwardError::Request {
            target: target.to_string(),
            source,
        })?;

    Ok(res.map(Body::new))
}
