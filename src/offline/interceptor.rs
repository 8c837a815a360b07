//! Capture path: network-first reads with cache fallback, queue-on-failure
//! writes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::cache::AppCache;

use super::gateway::{GatewayError, NetworkGateway};
use super::models::{GatewayRequest, GatewayResponse, QueuedMethod, QueuedPayload, QueuedRequest, SYNC_TAG};
use super::store::{QueueStore, StoreError};
use super::sync::{Connectivity, SyncTrigger};

/// Writer side of the durable request queue.
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    /// Last issued id, microseconds since the epoch
    last_issued: AtomicI64,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            last_issued: AtomicI64::new(0),
        }
    }

    /// Next queue id: the current UTC time, bumped by a microsecond when the
    /// clock has not moved past the previous id.
    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_issued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
            .unwrap_or_else(|prev| prev);
        let issued = now.max(previous + 1);

        DateTime::from_timestamp_micros(issued)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Persist a failed mutation for later replay.
    pub async fn enqueue(&self, payload: QueuedPayload) -> Result<QueuedRequest, StoreError> {
        let entry = QueuedRequest {
            id: self.next_id(),
            payload,
        };
        self.store.enqueue(&entry).await?;
        Ok(entry)
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }
}

/// Gateway decorator implementing the offline policies.
pub struct OfflineGateway {
    inner: Arc<dyn NetworkGateway>,
    queue: Arc<OfflineQueue>,
    cache: AppCache,
    connectivity: Connectivity,
    sync: SyncTrigger,
}

impl OfflineGateway {
    pub fn new(
        inner: Arc<dyn NetworkGateway>,
        queue: Arc<OfflineQueue>,
        cache: AppCache,
        connectivity: Connectivity,
        sync: SyncTrigger,
    ) -> Self {
        Self {
            inner,
            queue,
            cache,
            connectivity,
            sync,
        }
    }

    /// Send upstream. Any response proves the network is back.
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let response = self.inner.fetch(request).await?;
        self.connectivity.set_online(true);
        Ok(response)
    }

    async fn fetch_read(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        match self.send(request.clone()).await {
            Ok(response) if response.is_cacheable() => {
                self.cache.put_response(&request, &response).await;
                Ok(response)
            }
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status.as_u16(), "uncacheable response, trying cache");
                Ok(self.cache.get_response(&request).await.unwrap_or(response))
            }
            Err(err) if !self.connectivity.is_online() => {
                tracing::info!(url = %request.url, "offline ({}), serving from cache", err);
                self.cache
                    .get_response(&request)
                    .await
                    .ok_or(GatewayError::CacheMiss { url: request.url })
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_mutation(
        &self,
        method: QueuedMethod,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        // Keep a copy: the attempt consumes the original
        let captured = request.clone();

        match self.send(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                // Reconnecting later fires the online listener
                self.connectivity.set_online(false);

                let Some(payload) = QueuedPayload::capture(method, &captured) else {
                    tracing::warn!(url = %captured.url, "{}; body is not UTF-8 text, not queueing", err);
                    return Err(err);
                };
                tracing::warn!("{}; queueing for replay", err);
                let entry = self.queue.enqueue(payload).await?;
                tracing::info!(id = %entry.id, method = ?method, url = %entry.payload.url, "request queued");

                if !self.sync.register(SYNC_TAG) {
                    tracing::error!(id = %entry.id, "sync worker is not running");
                }
                Ok(GatewayResponse::queued(&entry.id))
            }
        }
    }
}

#[async_trait]
impl NetworkGateway for OfflineGateway {
    async fn fetch(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        if request.method == Method::GET {
            return self.fetch_read(request).await;
        }
        match QueuedMethod::from_method(&request.method) {
            Some(method) => self.fetch_mutation(method, request).await,
            None => self.send(request).await,
        }
    }
}
