use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};
use tokio::io::{copy_bidirectional, AsyncWriteExt};
use tracing::{debug, warn};

use crate::{
    config::UpstreamTarget, error::ProxyError, metrics::Metrics, routes::is_websocket_upgrade,
};

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Byte-level passthrough to the debugged browser.
///
/// The only modification is the Host header, which is set to the target's own
/// address so the browser's host check treats the caller as local.
#[derive(Clone)]
pub(crate) struct Forwarder {
    target: UpstreamTarget,
    host: HeaderValue,
    client: Client<HttpConnector, Body>,
    metrics: Arc<Metrics>,
}

impl Forwarder {
    pub(crate) fn new(target: UpstreamTarget, metrics: Arc<Metrics>) -> Result<Self, ProxyError> {
        let host = HeaderValue::from_str(&target.authority())
            .map_err(|error| ProxyError::Config(format!("invalid target authority: {error}")))?;
        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            target,
            host,
            client,
            metrics,
        })
    }

    pub(crate) async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        if is_websocket_upgrade(request.headers()) {
            self.forward_upgrade(request).await
        } else {
            self.forward_plain(request).await
        }
    }

    async fn forward_plain(&self, request: Request) -> Result<Response, ProxyError> {
        let outbound = self.outbound(request, false)?;
        let response = self.send(outbound).await?;
        Ok(relay(response))
    }

    async fn forward_upgrade(&self, mut request: Request) -> Result<Response, ProxyError> {
        let path = request.uri().path().to_string();
        let client_upgrade = hyper::upgrade::on(&mut request);
        let outbound = self.outbound(request, true)?;
        let mut response = self.send(outbound).await?;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            warn!(%path, status = %response.status(), "upstream declined websocket upgrade");
            return Ok(relay(response));
        }

        let upstream_upgrade = hyper::upgrade::on(&mut response);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            let (client, upstream) =
                match futures_util::future::try_join(client_upgrade, upstream_upgrade).await {
                    Ok(pair) => pair,
                    Err(error) => {
                        metrics.record_error();
                        let error = ProxyError::from(error);
                        warn!(%path, %error, "websocket splice not established");
                        return;
                    }
                };

            debug!(%path, "websocket splice established");
            let mut client = TokioIo::new(client);
            let mut upstream = TokioIo::new(upstream);

            match copy_bidirectional(&mut client, &mut upstream).await {
                Ok((sent, received)) => {
                    debug!(%path, sent, received, "websocket splice closed");
                }
                Err(error) => {
                    metrics.record_error();
                    let error = ProxyError::from(error);
                    warn!(%path, %error, "websocket splice terminated");
                }
            }

            let _ = client.shutdown().await;
            let _ = upstream.shutdown().await;
        });

        let (parts, _) = response.into_parts();
        Ok(Response::from_parts(parts, Body::empty()))
    }

    /// Re-targets the request at the upstream, rewriting only what the target needs.
    fn outbound(&self, request: Request, upgrade: bool) -> Result<Request, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let path = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        parts.uri = format!("{}{path}", self.target.base_url())
            .parse::<Uri>()
            .map_err(axum::http::Error::from)?;
        parts.version = Version::HTTP_11;

        if upgrade {
            parts
                .headers
                .insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
            parts
                .headers
                .insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        } else {
            strip_hop_by_hop(&mut parts.headers);
        }
        parts.headers.insert(header::HOST, self.host.clone());

        Ok(Request::from_parts(parts, body))
    }

    async fn send(
        &self,
        request: Request,
    ) -> Result<Response<hyper::body::Incoming>, ProxyError> {
        self.client
            .request(request)
            .await
            .map_err(|source| ProxyError::Forward {
                target: self.target.authority(),
                source,
            })
    }
}

/// Hands an upstream answer back to the caller without its hop-by-hop headers.
fn relay(response: Response<hyper::body::Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}
