use std::time::Duration;

use axum::body::Bytes;

use crate::{config::UpstreamTarget, error::ProxyError};

pub(crate) const VERSION_PATH: &str = "/json/version";

/// Fetches discovery documents from the debugged browser.
#[derive(Clone)]
pub(crate) struct UpstreamClient {
    target: UpstreamTarget,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub(crate) fn new(target: UpstreamTarget, timeout: Duration) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ProxyError::Config(format!("failed to build http client: {error}")))?;

        Ok(Self { target, http })
    }

    pub(crate) fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// GETs `path` from the target and returns the raw body. The status code is not inspected.
    pub(crate) async fn fetch(&self, path: &str) -> Result<Bytes, ProxyError> {
        let url = format!("{}{path}", self.target.base_url());
        let unreachable = |source| ProxyError::UpstreamUnreachable {
            target: self.target.authority(),
            source,
        };

        let response = self.http.get(&url).send().await.map_err(unreachable)?;
        response.bytes().await.map_err(unreachable)
    }

    pub(crate) async fn fetch_version(&self) -> Result<Bytes, ProxyError> {
        self.fetch(VERSION_PATH).await
    }
}
