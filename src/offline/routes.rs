//! HTTP route handlers for the offline proxy and queue administration.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get, post},
    Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::AppState;

use super::gateway::NetworkGateway;
use super::models::{is_hop_by_hop, GatewayRequest, SYNC_TAG};

/// Create the offline router with all endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proxy/*path", any(forward))
        .route("/queue", get(list_queue))
        .route("/queue/sync", post(register_sync))
        .route("/connectivity", get(connectivity).put(set_connectivity))
}

/// Forward a request to the field ticket API through the offline gateway.
async fn forward(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let url = state
        .origins
        .target(host, &path, query.as_deref())
        .map_err(AppError::BadRequest)?;

    let mut request = GatewayRequest::new(method, url.to_string()).body(body);
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request = request.header(name.as_str(), value);
        }
    }

    let response = state.gateway.fetch(request).await?;
    Ok(response.into_response())
}

/// Pending requests in replay order.
async fn list_queue(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let entries = state.queue.store().list_ordered().await?;
    Ok(Json(serde_json::json!({
        "pending": entries.len(),
        "entries": entries,
    })))
}

#[derive(Debug, Deserialize)]
struct SyncRequest {
    #[serde(default = "default_tag")]
    tag: String,
}

fn default_tag() -> String {
    SYNC_TAG.to_string()
}

/// Register a background sync event.
async fn register_sync(
    State(state): State<AppState>,
    payload: Option<Json<SyncRequest>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let tag = payload.map(|Json(p)| p.tag).unwrap_or_else(default_tag);
    let registered = state.sync.register(tag.clone());
    let status = if registered {
        StatusCode::ACCEPTED
    } else {
        tracing::error!("sync worker is not running");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "registered": registered, "tag": tag })))
}

async fn connectivity(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let pending = state.queue.store().len().await?;
    Ok(Json(serde_json::json!({
        "online": state.connectivity.is_online(),
        "pending": pending,
    })))
}

#[derive(Debug, Deserialize)]
struct ConnectivityUpdate {
    online: bool,
}

/// Override the online flag, as a browser online/offline event would.
async fn set_connectivity(
    State(state): State<AppState>,
    Json(update): Json<ConnectivityUpdate>,
) -> impl IntoResponse {
    let changed = state.connectivity.set_online(update.online);
    Json(serde_json::json!({ "online": update.online, "changed": changed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok_response, test_state};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_failed_post_answers_202_and_is_listed() {
        let app = test_state();
        app.upstream.push_transport_error();
        let router = router().with_state(app.state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::post("/proxy/jobitem.php?ticket=1001")
                    .header("host", "localhost:8080")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"item":"Hot oil truck","hours":4}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["queued"], true);

        let sent = app.upstream.requests();
        assert_eq!(sent[0].url, "http://upstream.test/jobitem.php?ticket=1001");
        assert!(sent[0].headers.iter().all(|(name, _)| name != "host"));

        let listing = router
            .oneshot(Request::get("/queue").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listing = json_body(listing).await;
        assert_eq!(listing["pending"], 1);
        assert_eq!(listing["entries"][0]["method"], "POST");
        assert_eq!(listing["entries"][0]["body"], r#"{"item":"Hot oil truck","hours":4}"#);
    }

    #[tokio::test]
    async fn test_failed_post_schedules_replay() {
        let mut app = test_state();
        app.upstream.push_transport_error();

        let response = router()
            .with_state(app.state.clone())
            .oneshot(
                Request::patch("/proxy/ticket.php?id=1001")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"status":"signed"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(app.sync_rx.try_recv().unwrap(), SYNC_TAG);
        assert!(!app.state.connectivity.is_online());
    }

    #[tokio::test]
    async fn test_get_is_proxied() {
        let app = test_state();
        app.upstream.push(ok_response(r#"{"leases":[]}"#));

        let response = router()
            .with_state(app.state)
            .oneshot(Request::get("/proxy/leases.php").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({ "leases": [] }));
    }

    #[tokio::test]
    async fn test_offline_get_cache_miss_is_503() {
        let app = test_state();
        app.state.connectivity.set_online(false);
        app.upstream.push_transport_error();

        let response = router()
            .with_state(app.state)
            .oneshot(Request::get("/proxy/wells.php").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error_type"], "offline_cache_miss");
    }

    #[tokio::test]
    async fn test_sync_registers_default_tag() {
        let mut app = test_state();

        let response = router()
            .with_state(app.state.clone())
            .oneshot(Request::post("/queue/sync").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(app.sync_rx.recv().await.unwrap(), SYNC_TAG);
    }

    #[tokio::test]
    async fn test_connectivity_override() {
        let app = test_state();

        let response = router()
            .with_state(app.state.clone())
            .oneshot(
                Request::put("/connectivity")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"online": false}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(json_body(response).await["changed"], true);
        assert!(!app.state.connectivity.is_online());
    }
}
