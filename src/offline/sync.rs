//! Connectivity state and background sync triggers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::gateway::NetworkGateway;
use super::models::{GatewayRequest, SYNC_TAG};

/// Connectivity snapshot published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    /// Offline to online transitions seen so far
    pub reconnects: u64,
}

/// Shared online/offline flag.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState {
            online,
            reconnects: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }

    /// Update the flag. Returns whether it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            if online {
                state.reconnects += 1;
            }
            true
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

/// Registers sync tags for the replay worker.
#[derive(Clone)]
pub struct SyncTrigger {
    tx: mpsc::UnboundedSender<String>,
}

pub fn sync_channel() -> (SyncTrigger, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SyncTrigger { tx }, rx)
}

impl SyncTrigger {
    /// Queue a sync event. Returns false once the worker has stopped.
    pub fn register(&self, tag: impl Into<String>) -> bool {
        self.tx.send(tag.into()).is_ok()
    }
}

/// Fire a replay whenever connectivity goes from offline to online.
///
/// Compares reconnect counts, so a flap that happens between two wakeups
/// still fires.
pub fn spawn_online_listener(connectivity: &Connectivity, trigger: SyncTrigger) -> JoinHandle<()> {
    let mut rx = connectivity.subscribe();
    let mut seen = rx.borrow_and_update().reconnects;
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let reconnects = rx.borrow_and_update().reconnects;
            if reconnects > seen && !trigger.register(SYNC_TAG) {
                break;
            }
            seen = reconnects;
        }
    })
}

/// Poll the API origin and keep the connectivity flag current.
///
/// Any HTTP response counts as online; only transport failures mean offline.
pub fn spawn_connectivity_probe(
    connectivity: Connectivity,
    gateway: Arc<dyn NetworkGateway>,
    probe_url: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let online = match gateway
                .fetch(GatewayRequest::new(Method::HEAD, probe_url.clone()))
                .await
            {
                Ok(_) => true,
                Err(err) => {
                    tracing::debug!("connectivity probe failed: {}", err);
                    false
                }
            };
            connectivity.set_online(online);
        }
    })
}
