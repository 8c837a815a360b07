//! Offline mutation queue.
//!
//! Mutations that cannot reach the field ticket API are persisted and answered
//! with `202 Queued`; a sync event replays them in submission order once
//! connectivity returns. Reads fall back to the last cached response while
//! offline.

mod gateway;
mod interceptor;
mod models;
mod origin;
mod replay;
mod routes;
mod store;
mod sync;

pub use gateway::{GatewayError, HttpGateway, NetworkGateway};
pub use interceptor::{OfflineGateway, OfflineQueue};
pub use models::{GatewayRequest, GatewayResponse, ResponseKind, SYNC_TAG};
pub use origin::OriginResolver;
pub use replay::{run_sync_worker, Replayer};
pub use routes::router;
pub use store::{MemoryQueueStore, PgQueueStore, QueueStore, StoreError};
pub use sync::{spawn_connectivity_probe, spawn_online_listener, sync_channel, Connectivity, SyncTrigger};
