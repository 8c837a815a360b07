//! Network gateway contract and the reqwest-backed implementation.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;

use super::models::{is_hop_by_hop, GatewayRequest, GatewayResponse, ResponseKind};
use super::store::StoreError;

/// Errors surfaced by a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request never produced a response.
    #[error("network request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// Offline with nothing cached for this request.
    #[error("offline and no cached response for {url}")]
    CacheMiss { url: String },

    #[error("could not queue request: {0}")]
    Queue(#[from] StoreError),
}

/// Sends one HTTP request and returns the response.
///
/// Non-2xx statuses are responses, not errors. Only failures to get any
/// response at all are `Err`.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    async fn fetch(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Gateway that talks to the real network.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
}

impl HttpGateway {
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("build reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NetworkGateway for HttpGateway {
    async fn fetch(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let url = Url::parse(&request.url).map_err(|err| GatewayError::InvalidUrl {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;
        let transport = |err: reqwest::Error| GatewayError::Transport {
            url: request.url.clone(),
            reason: err.to_string(),
        };

        let mut builder = self.client.request(request.method.clone(), url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(transport)?;

        let status = response.status();
        // A redirect to another origin makes the final response cross-origin
        let kind = if response.url().origin() == url.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(transport)?;

        tracing::debug!(method = %request.method, url = %request.url, status = status.as_u16(), "upstream response");

        Ok(GatewayResponse {
            status,
            kind,
            headers,
            body,
        })
    }
}
