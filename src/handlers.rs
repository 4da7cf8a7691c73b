use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    error::ProxyError,
    routes::Route,
    services::{discovery, upstream::VERSION_PATH},
    AppState,
};

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    uptime: String,
    target: String,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct HealthFailure {
    status: &'static str,
    error: String,
}

/// Single entry point for every request; see [`Route::classify`] for the dispatch order.
pub(crate) async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    state.metrics.record_request();

    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    debug!(
        %method,
        %path,
        query = request.uri().query().unwrap_or(""),
        %remote,
        "request received"
    );

    let route = Route::classify(&method, &path, request.headers());
    let public = public_authority(&state, request.headers(), request.uri());

    let result = match route {
        Route::Health => Ok(health(&state).await),
        Route::Metrics => Ok(metrics(&state)),
        Route::Version => version_document(&state, &public).await,
        Route::TargetList => target_list(&state, &path, &public).await,
        Route::WebSocket => {
            info!(%path, "proxying websocket connection");
            state.forwarder.forward(request).await
        }
        Route::Passthrough => state.forwarder.forward(request).await,
    };

    let response = result.unwrap_or_else(|err| {
        state.metrics.record_error();
        error!(%method, %path, error = %err, "request failed");
        err.into_response()
    });

    debug!(
        %method,
        %path,
        status = %response.status(),
        elapsed = ?started.elapsed(),
        "request completed"
    );
    response
}

async fn health(state: &AppState) -> Response {
    match state.upstream.fetch_version().await {
        Ok(_) => Json(HealthReport {
            status: "healthy",
            uptime: format!("{:.3?}", state.metrics.uptime()),
            target: state.upstream.target().authority(),
            timestamp: Utc::now().timestamp(),
        })
        .into_response(),
        Err(error) => {
            warn!(%error, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthFailure {
                    status: "unhealthy",
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn metrics(state: &AppState) -> Response {
    Json(state.metrics.snapshot(&state.config.target.authority())).into_response()
}

async fn version_document(state: &AppState, public: &str) -> Result<Response, ProxyError> {
    debug!(public, target = %state.config.target, "processing /json/version");

    let body = state.upstream.fetch_version().await?;
    let mut document = discovery::decode_version(VERSION_PATH, &body)?;
    discovery::rewrite_version(&mut document, &state.rewriter, public);

    Ok(json_response(discovery::encode(&document)?))
}

async fn target_list(state: &AppState, path: &str, public: &str) -> Result<Response, ProxyError> {
    debug!(path, public, target = %state.config.target, "processing target list");

    let body = state.upstream.fetch(path).await?;
    let mut targets = discovery::decode_target_list(path, &body)?;
    discovery::rewrite_target_list(&mut targets, &state.rewriter, public);

    Ok(json_response(discovery::encode(&targets)?))
}

fn json_response(body: Vec<u8>) -> Response {
    let length = HeaderValue::from(body.len());
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_LENGTH, length),
        ],
        body,
    )
        .into_response()
}

/// The address the caller used to reach us, which is what rewritten URLs must point at.
fn public_authority(state: &AppState, headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.to_string()))
        .unwrap_or_else(|| state.config.default_public_authority())
}
