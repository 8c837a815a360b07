//! Runtime configuration loaded from the environment.

use std::time::Duration;

use anyhow::{bail, Context};

/// Backing store for the offline request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStoreKind {
    Postgres,
    Memory,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub queue_store: QueueStoreKind,
    /// Origin of the field ticket API, optionally containing `{tenant}`
    pub api_origin: String,
    /// Pause between replayed entries
    pub replay_delay: Duration,
    /// Per-request upstream timeout (None = wait forever)
    pub upstream_timeout: Option<Duration>,
    /// Connectivity probe interval (None = probe disabled)
    pub probe_interval: Option<Duration>,
    pub probe_url: Option<String>,
    pub response_cache_capacity: u64,
}

impl Config {
    /// Load from process environment (after `.env` has been applied).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let queue_store = match get("QUEUE_STORE", "postgres").to_ascii_lowercase().as_str() {
            "postgres" | "pg" => QueueStoreKind::Postgres,
            "memory" => QueueStoreKind::Memory,
            other => bail!("unknown QUEUE_STORE '{}' (expected postgres or memory)", other),
        };

        let api_origin = get("API_ORIGIN", "http://localhost");

        // Probing a tenant template needs an explicit URL
        let probe_url = lookup("CONNECTIVITY_PROBE_URL").or_else(|| {
            if api_origin.contains("{tenant}") {
                None
            } else {
                Some(api_origin.clone())
            }
        });

        Ok(Self {
            bind_addr: get("BIND_ADDR", "0.0.0.0:8080"),
            database_url: database_url(&lookup),
            queue_store,
            api_origin,
            replay_delay: Duration::from_millis(parse_u64(&lookup, "REPLAY_DELAY_MS", 100)?),
            upstream_timeout: optional_secs(parse_u64(&lookup, "UPSTREAM_TIMEOUT_SECS", 30)?),
            probe_interval: optional_secs(parse_u64(&lookup, "CONNECTIVITY_PROBE_SECS", 15)?),
            probe_url,
            response_cache_capacity: parse_u64(&lookup, "RESPONSE_CACHE_CAPACITY", 1000)?,
        })
    }
}

/// Supports: DATABASE_URL, or build from POSTGRES_* vars.
/// For Unix socket: leave POSTGRES_HOST empty or point it at the socket dir.
fn database_url<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        return url;
    }

    let user = lookup("POSTGRES_USER").unwrap_or_else(|| "fieldticket".to_string());
    let password = lookup("POSTGRES_PASSWORD").unwrap_or_else(|| "fieldticket".to_string());
    let db = lookup("POSTGRES_DB").unwrap_or_else(|| "fieldticket".to_string());
    let host = lookup("POSTGRES_HOST").unwrap_or_default();

    if host.is_empty() || host.starts_with('/') {
        let socket_dir = if host.is_empty() { "/var/run/postgresql" } else { &host };
        format!("postgres://{}:{}@/{db}?host={socket_dir}", user, password)
    } else {
        let port = lookup("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
        format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db)
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw)),
        None => Ok(default),
    }
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
