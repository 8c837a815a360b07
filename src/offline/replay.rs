//! Replay of queued requests.
//!
//! One cycle walks the queue oldest first, sends each entry to the URL it was
//! captured with, removes it on a 2xx and keeps it otherwise. Entries are sent
//! one at a time with a fixed pause after each, and cycles never overlap.
//! There is no retry limit: a rejected entry is tried again every cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use super::gateway::NetworkGateway;
use super::models::{ReplayReport, SYNC_TAG};
use super::store::{QueueStore, StoreError};

pub struct Replayer {
    store: Arc<dyn QueueStore>,
    gateway: Arc<dyn NetworkGateway>,
    delay: Duration,
    cycle: Mutex<()>,
}

impl Replayer {
    /// `gateway` must reach the network directly, not through the offline
    /// decorator, or failures would be queued a second time.
    pub fn new(store: Arc<dyn QueueStore>, gateway: Arc<dyn NetworkGateway>, delay: Duration) -> Self {
        Self {
            store,
            gateway,
            delay,
            cycle: Mutex::new(()),
        }
    }

    /// Run one replay cycle over everything currently queued.
    pub async fn replay(&self) -> Result<ReplayReport, StoreError> {
        let _cycle = self.cycle.lock().await;

        let entries = self.store.list_ordered().await?;
        let mut report = ReplayReport::default();
        if entries.is_empty() {
            return Ok(report);
        }
        tracing::info!(pending = entries.len(), "replaying queued requests");

        for entry in entries {
            let delivered = match self.gateway.fetch(entry.replay_request()).await {
                Ok(response) if response.status.is_success() => {
                    match self.store.remove(&entry.id).await {
                        Ok(()) => true,
                        Err(err) => {
                            tracing::error!(id = %entry.id, "delivered but could not dequeue: {}", err);
                            false
                        }
                    }
                }
                Ok(response) => {
                    tracing::warn!(
                        id = %entry.id,
                        url = %entry.payload.url,
                        status = response.status.as_u16(),
                        "replay rejected, keeping request queued"
                    );
                    false
                }
                Err(err) => {
                    tracing::error!(id = %entry.id, "replay failed: {}", err);
                    false
                }
            };

            if delivered {
                tracing::debug!(id = %entry.id, "queued request delivered");
                report.delivered.push(entry.id);
            } else {
                report.retained.push(entry.id);
            }

            tokio::time::sleep(self.delay).await;
        }

        tracing::info!(
            delivered = report.delivered.len(),
            retained = report.retained.len(),
            "replay cycle finished"
        );
        Ok(report)
    }
}

/// Consume sync events and run a replay cycle for each recognised tag.
pub async fn run_sync_worker(mut rx: mpsc::UnboundedReceiver<String>, replayer: Arc<Replayer>) {
    while let Some(tag) = rx.recv().await {
        if tag != SYNC_TAG {
            tracing::debug!(tag = %tag, "ignoring unknown sync tag");
            continue;
        }
        if let Err(err) = replayer.replay().await {
            tracing::error!("replay cycle aborted: {}", err);
        }
    }
    tracing::debug!("sync worker stopped");
}
