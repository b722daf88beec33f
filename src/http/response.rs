//! Synthetic responses produced by the proxy itself.
//!
//! Every proxy-generated failure carries the same JSON body and asks the
//! client to close the connection.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const PROXY_ERROR_MESSAGE: &str = "Unable to proxy this request.";

/// Build the synthetic error response for `status`.
pub fn error_response(status: StatusCode) -> Response {
    (
        status,
        [(header::CONNECTION, "close")],
        Json(json!({ "error": PROXY_ERROR_MESSAGE })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_body_is_json() {
        let res = error_response(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers()[header::CONNECTION], "close");
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Unable to proxy this request." }));
    }

    #[test]
    fn status_is_honoured() {
        assert_eq!(error_response(StatusCode::BAD_GATEWAY).status(), StatusCode::BAD_GATEWAY);
    }
}
