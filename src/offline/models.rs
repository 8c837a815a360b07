//! Request, response and queue entry types for the offline layer.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Background sync tag that triggers a replay cycle.
pub const SYNC_TAG: &str = "replay-queued-requests";

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Outgoing request as seen by a gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Key identifying this request in the response cache.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Where a response came from, as far as caching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin network response
    Basic,
    /// Cross-origin network response
    Cors,
    /// Produced locally, never cached
    Synthetic,
}

/// Response returned by a gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl GatewayResponse {
    /// Only complete network responses may replace a cache entry.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && matches!(self.kind, ResponseKind::Basic | ResponseKind::Cors)
    }

    /// Synthetic `202 Queued` answer for a captured mutation.
    pub fn queued(id: &str) -> Self {
        let body = serde_json::json!({ "queued": true, "id": id }).to_string();
        Self {
            status: StatusCode::ACCEPTED,
            kind: ResponseKind::Synthetic,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from(body),
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if is_hop_by_hop(name) {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!("dropping unrepresentable response header {}", name),
            }
        }
        response
    }
}

/// Mutating methods that are queued when the network is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueuedMethod {
    Post,
    Delete,
    Patch,
}

impl QueuedMethod {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::POST => Some(Self::Post),
            Method::DELETE => Some(Self::Delete),
            Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_method(self) -> Method {
        match self {
            Self::Post => Method::POST,
            Self::Delete => Method::DELETE,
            Self::Patch => Method::PATCH,
        }
    }
}

/// Persisted document for one queued request.
///
/// Stored shape: `{url, method, headers: [[name, value], ...], body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPayload {
    pub url: String,
    pub method: QueuedMethod,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl QueuedPayload {
    /// Snapshot of a request for the queue. `None` if the body is not UTF-8 text.
    pub fn capture(method: QueuedMethod, request: &GatewayRequest) -> Option<Self> {
        let body = std::str::from_utf8(&request.body).ok()?;
        Some(Self {
            url: request.url.clone(),
            method,
            headers: request.headers.clone(),
            body: body.to_string(),
        })
    }
}

/// A queued mutation keyed by its ISO-8601 capture timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    #[serde(flatten)]
    pub payload: QueuedPayload,
}

impl QueuedRequest {
    /// Request to send on replay.
    ///
    /// Goes to the URL recorded at capture time. Content-Type is always
    /// `application/json`, whatever was captured.
    pub fn replay_request(&self) -> GatewayRequest {
        let mut headers: Vec<(String, String)> = self
            .payload
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
            .cloned()
            .collect();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));

        GatewayRequest {
            method: self.payload.method.as_method(),
            url: self.payload.url.clone(),
            headers,
            body: Bytes::from(self.payload.body.clone()),
        }
    }
}

/// Outcome of one replay cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Delivered and removed from the queue
    pub delivered: Vec<String>,
    /// Still queued for the next cycle
    pub retained: Vec<String>,
}
