//! Durable storage for queued requests.
//!
//! The queue is append-and-delete only: entries are written once at capture
//! and removed after a confirmed replay. Listing is ordered by id, which is
//! the capture timestamp, so listing order is submission order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use super::models::{QueuedPayload, QueuedRequest};

/// Table backing the `request-queue` namespace.
const QUEUE_TABLE: &str = "request_queue";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("queue entry '{0}' already exists")]
    DuplicateId(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage capability for the offline request queue.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a new entry. Existing ids are never overwritten.
    async fn enqueue(&self, request: &QueuedRequest) -> Result<(), StoreError>;

    /// All entries, ascending by id.
    async fn list_ordered(&self) -> Result<Vec<QueuedRequest>, StoreError>;

    /// Delete an entry. Removing a missing id is not an error.
    async fn remove(&self, id: &str) -> Result<(), StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;

    /// Verify the store is reachable.
    async fn check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-process queue store.
#[derive(Default)]
pub struct MemoryQueueStore {
    entries: RwLock<BTreeMap<String, QueuedPayload>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, request: &QueuedRequest) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&request.id) {
            return Err(StoreError::DuplicateId(request.id.clone()));
        }
        entries.insert(request.id.clone(), request.payload.clone());
        Ok(())
    }

    async fn list_ordered(&self) -> Result<Vec<QueuedRequest>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .map(|(id, payload)| QueuedRequest {
                id: id.clone(),
                payload: payload.clone(),
            })
            .collect())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }
}

/// Postgres-backed queue store.
#[derive(Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the queue table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {QUEUE_TABLE} (
                id TEXT PRIMARY KEY,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

/// Decode stored rows in order, skipping any whose payload no longer parses.
fn decode_rows(rows: impl IntoIterator<Item = (String, serde_json::Value)>) -> Vec<QueuedRequest> {
    rows.into_iter()
        .filter_map(|(id, payload)| match serde_json::from_value::<QueuedPayload>(payload) {
            Ok(payload) => Some(QueuedRequest { id, payload }),
            Err(e) => {
                tracing::error!(id = %id, "skipping undecodable queue entry: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn enqueue(&self, request: &QueuedRequest) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO {QUEUE_TABLE} (id, payload) VALUES ($1, $2)");
        let result = sqlx::query(&sql)
            .bind(&request.id)
            .bind(Json(request.payload.clone()))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateId(request.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_ordered(&self) -> Result<Vec<QueuedRequest>, StoreError> {
        let sql = format!("SELECT id, payload FROM {QUEUE_TABLE} ORDER BY id ASC");
        let rows: Vec<(String, Json<serde_json::Value>)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(decode_rows(rows.into_iter().map(|(id, Json(payload))| (id, payload))))
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {QUEUE_TABLE} WHERE id = $1");
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {QUEUE_TABLE}");
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as usize)
    }

    async fn check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::models::QueuedMethod;

    fn entry(id: &str) -> QueuedRequest {
        QueuedRequest {
            id: id.to_string(),
            payload: QueuedPayload {
                url: "https://acme.api.example.com/tickets.php".to_string(),
                method: QueuedMethod::Post,
                headers: vec![],
                body: format!(r#"{{"ticket":"{id}"}}"#),
            },
        }
    }

    #[tokio::test]
    async fn test_lists_in_id_order() {
        let store = MemoryQueueStore::new();
        store.enqueue(&entry("2026-10-19T14:00:00.000002Z")).await.unwrap();
        store.enqueue(&entry("2026-10-19T13:59:59.999999Z")).await.unwrap();
        store.enqueue(&entry("2026-10-19T14:00:00.000001Z")).await.unwrap();

        let ids: Vec<String> = store
            .list_ordered()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "2026-10-19T13:59:59.999999Z",
                "2026-10-19T14:00:00.000001Z",
                "2026-10-19T14:00:00.000002Z",
            ]
        );
    }

    #[tokio::test]
    async fn test_entries_are_never_overwritten() {
        let store = MemoryQueueStore::new();
        let original = entry("2026-10-19T14:00:00.000000Z");
        store.enqueue(&original).await.unwrap();

        let mut clash = original.clone();
        clash.payload.body = "{}".to_string();
        let result = store.enqueue(&clash).await;

        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
        assert_eq!(store.list_ordered().await.unwrap(), vec![original]);
    }

    #[test]
    fn test_bad_row_does_not_hide_the_rest() {
        let good = entry("2026-10-19T14:00:00.000000Z");
        let later = entry("2026-10-19T14:00:02.000000Z");
        let rows = vec![
            (good.id.clone(), serde_json::to_value(&good.payload).unwrap()),
            (
                "2026-10-19T14:00:01.000000Z".to_string(),
                serde_json::json!({ "url": "https://acme.api.example.com/", "method": "PUT" }),
            ),
            (later.id.clone(), serde_json::to_value(&later.payload).unwrap()),
        ];

        assert_eq!(decode_rows(rows), vec![good, later]);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryQueueStore::new();
        store.enqueue(&entry("a")).await.unwrap();
        store.enqueue(&entry("b")).await.unwrap();

        store.remove("a").await.unwrap();
        store.remove("missing").await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.list_ordered().await.unwrap()[0].id, "b");
    }
}
