//! Response cache used as the offline read path for GET requests.
//!
//! Entries are replaced by every cacheable live response and only read when
//! the network cannot answer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::future::Cache;

use crate::offline::{GatewayRequest, GatewayResponse};

/// Shared application cache
#[derive(Clone)]
pub struct AppCache {
    responses: Cache<String, GatewayResponse>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl AppCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            responses: Cache::builder().max_capacity(capacity).build(),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached response for this request, if any.
    pub async fn get_response(&self, request: &GatewayRequest) -> Option<GatewayResponse> {
        let cached = self.responses.get(&request.cache_key()).await;
        let counter = if cached.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        cached
    }

    /// Store a copy of a live response, replacing any previous entry.
    pub async fn put_response(&self, request: &GatewayRequest, response: &GatewayResponse) {
        self.responses
            .insert(request.cache_key(), response.clone())
            .await;
    }

    /// Cache statistics for the health endpoint
    pub fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "responses": {
                "entries": self.responses.entry_count(),
                "hits": self.hits.load(Ordering::Relaxed),
                "misses": self.misses.load(Ordering::Relaxed),
            }
        })
    }
}
