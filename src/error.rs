use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ProxyError {
    #[error("upstream {target} unreachable: {source}")]
    UpstreamUnreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed upstream response from {path} ({size} bytes): {source}")]
    MalformedUpstreamResponse {
        path: String,
        size: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode discovery document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("forwarding to {target} failed: {source}")]
    Forward {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("invalid forward request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("connection upgrade failed: {0}")]
    Upgrade(#[from] hyper::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamUnreachable { .. } | Self::Forward { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_response_maps_to_internal_error() {
        let source = serde_json::from_str::<serde_json::Value>("not json")
            .expect_err("invalid json");
        let error = ProxyError::MalformedUpstreamResponse {
            path: "/json/version".to_string(),
            size: 8,
            source,
        };

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.to_string().contains("8 bytes"));
    }

    #[test]
    fn config_error_renders_message() {
        let response = ProxyError::Config("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
