//! Test doubles shared across module tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::cache::AppCache;
use crate::offline::{
    sync_channel, Connectivity, GatewayError, GatewayRequest, GatewayResponse, MemoryQueueStore,
    NetworkGateway, OfflineGateway, OfflineQueue, OriginResolver, ResponseKind,
};
use crate::AppState;

pub fn ok_response(body: &str) -> GatewayResponse {
    GatewayResponse {
        status: StatusCode::OK,
        kind: ResponseKind::Basic,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: Bytes::from(body.to_string()),
    }
}

/// Gateway that answers from a script and records what it was sent.
///
/// Once the script runs out every request fails at the transport layer.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Option<GatewayResponse>>>,
    sent: Mutex<Vec<(Instant, GatewayRequest)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: GatewayResponse) {
        self.script.lock().unwrap().push_back(Some(response));
    }

    pub fn push_status(&self, status: StatusCode) {
        self.push(GatewayResponse {
            status,
            kind: ResponseKind::Basic,
            headers: vec![],
            body: Bytes::new(),
        });
    }

    pub fn push_transport_error(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.sent.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl NetworkGateway for ScriptedGateway {
    async fn fetch(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let url = request.url.clone();
        self.sent.lock().unwrap().push((Instant::now(), request));
        match self.script.lock().unwrap().pop_front().flatten() {
            Some(response) => Ok(response),
            None => Err(GatewayError::Transport {
                url,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    pub upstream: Arc<ScriptedGateway>,
    pub sync_rx: mpsc::UnboundedReceiver<String>,
}

/// Application state over an in-memory queue and a scripted upstream at
/// `http://upstream.test`.
pub fn test_state() -> TestApp {
    let upstream = Arc::new(ScriptedGateway::new());
    let queue = Arc::new(OfflineQueue::new(Arc::new(MemoryQueueStore::new())));
    let cache = AppCache::new(100);
    let connectivity = Connectivity::new(true);
    let (sync, sync_rx) = sync_channel();

    let gateway = Arc::new(OfflineGateway::new(
        upstream.clone(),
        queue.clone(),
        cache.clone(),
        connectivity.clone(),
        sync.clone(),
    ));

    let state = AppState {
        cache,
        gateway,
        queue,
        connectivity,
        sync,
        origins: OriginResolver::parse("http://upstream.test").unwrap(),
    };

    TestApp {
        state,
        upstream,
        sync_rx,
    }
}
