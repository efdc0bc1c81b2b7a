//! Gateway clients
//!
//! Each backend trait of the engine is served by one HTTP endpoint family on
//! a gateway that fronts the actual cloud services. The clients share
//! [`GatewayClient`] for URL building, timeouts and error mapping.

mod flows;
mod logs;
mod traces;

pub use flows::FlowGatewayClient;
pub use logs::LogGatewayClient;
pub use traces::TraceGatewayClient;

use flowtrace_core::{BackendError, BackendResult};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Shared HTTP plumbing for one gateway base URL
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl GatewayClient {
    /// Create a client for `base_url`
    pub fn new(base_url: &str) -> BackendResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Unavailable(format!("invalid gateway url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Unavailable(format!("gateway url {} cannot be a base", base_url)));
        }

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded
    pub fn url(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Unavailable(format!("gateway url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client.get(url).timeout(self.timeout)
    }

    pub(crate) fn post(&self, url: Url) -> reqwest::RequestBuilder {
        self.client.post(url).timeout(self.timeout)
    }

    /// Send a request and decode a successful JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> BackendResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()));
    }

    let url = response.url().to_string();
    let error_text = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(url),
        StatusCode::SERVICE_UNAVAILABLE => BackendError::Unavailable(error_text),
        _ => BackendError::Server {
            status: status.as_u16(),
            message: error_text,
        },
    })
}
