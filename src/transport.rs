//! HTTP implementations of the remote capabilities.
//!
//! [`HttpVersionOracle`] speaks `GET {base}/{resource_class}/version` and
//! [`HttpSearchEngine`] speaks `POST {base}/search`, both over a shared
//! `reqwest` client with rustls. Timeouts are enforced here; a timed-out
//! call surfaces as [`TransportError::Transport`] and is handled upstream
//! exactly like any other transport failure.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::capability::{SearchEngine, TransportError, VersionOracle};
use crate::resource::ResourceClass;
use crate::search::{SearchQuery, SearchResponse};

fn build_client(timeout_ms: u64) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| TransportError::Transport(e.to_string()))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Wire shape of the version endpoint.
#[derive(Debug, Deserialize)]
struct VersionPayload {
    success: bool,
    #[serde(default)]
    version: Option<String>,
}

/// `GET /{resource_class}/version` client.
pub struct HttpVersionOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVersionOracle {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout_ms)?,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, class: ResourceClass) -> String {
        join_url(&self.base_url, &format!("{}/version", class.as_str()))
    }
}

#[async_trait]
impl VersionOracle for HttpVersionOracle {
    async fn current_version(&self, class: ResourceClass) -> Result<String, TransportError> {
        let url = self.endpoint(class);
        debug!(url = %url, "version check");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let payload: VersionPayload = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))?;

        match payload {
            VersionPayload {
                success: true,
                version: Some(version),
            } => Ok(version),
            // `success: false` (or a missing token) is an inconclusive check,
            // handled upstream like a transport failure.
            _ => Err(TransportError::InvalidPayload(
                "version endpoint reported failure".into(),
            )),
        }
    }
}

/// `POST /search` client.
pub struct HttpSearchEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchEngine {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout_ms)?,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        join_url(&self.base_url, "search")
    }
}

#[async_trait]
impl SearchEngine for HttpSearchEngine {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, TransportError> {
        let url = self.endpoint();
        debug!(url = %url, "search request");

        let response = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        // A body without a hits array fails deserialization here, which the
        // executor treats as a malformed payload and routes to the fallback.
        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))
    }
}
