mod config;
mod error;
mod handlers;
mod metrics;
mod routes;
mod services;

use std::{net::SocketAddr, sync::Arc};

use axum::{http::StatusCode, Router};
use clap::Parser;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::{Args, ProxyConfig},
    error::ProxyError,
    metrics::Metrics,
    services::{Forwarder, UpstreamClient, UrlRewriter},
};

pub(crate) struct AppState {
    pub(crate) config: Arc<ProxyConfig>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) upstream: UpstreamClient,
    pub(crate) rewriter: UrlRewriter,
    pub(crate) forwarder: Forwarder,
}

impl AppState {
    pub(crate) fn new(config: ProxyConfig) -> Result<Arc<Self>, ProxyError> {
        let metrics = Arc::new(Metrics::new());
        let upstream = UpstreamClient::new(config.target.clone(), config.request_timeout)?;
        let rewriter = UrlRewriter::new(&config.target);
        let forwarder = Forwarder::new(config.target.clone(), Arc::clone(&metrics))?;

        Ok(Arc::new(Self {
            config: Arc::new(config),
            metrics,
            upstream,
            rewriter,
            forwarder,
        }))
    }
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let deadline = state.config.listener_timeout();

    Router::new()
        .fallback(handlers::dispatch)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            deadline,
        ))
        .with_state(state)
}

fn setup_logging(config: &ProxyConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let config = match ProxyConfig::from_args(Args::parse()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    setup_logging(&config);

    if let Err(error) = run(config).await {
        error!(%error, "proxy stopped");
        std::process::exit(1);
    }
}

async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    let bind_addr = config.listen_addr();

    info!(listen = %bind_addr, "starting devtools reverse proxy");
    info!(target = %config.target, "forwarding to browser remote-debugging port");
    info!(
        debug = config.debug_enabled,
        timeout_secs = config.request_timeout.as_secs(),
        "proxy settings"
    );

    let state = AppState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|source| ProxyError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;

    info!(listen = %bind_addr, "proxy listening, waiting for connections");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
