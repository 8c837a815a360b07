//! HTTP route handlers for the measurement calculator API.

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use sha2::{Digest, Sha256};

use crate::AppState;

use super::calculator;
use super::models::{ComputeResponse, MeasurementDisplay, MeasurementInput};

const TOOL: &str = "fieldticket-measurement";
const TOOL_VERSION: &str = "0.1.0";
const METHOD: &str = "API gravity / VCF (K0 341.0957)";

/// Create the measurement router with all endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/compute", post(compute))
}

/// Health check for the measurement calculator.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "measurement-calculator",
        "version": TOOL_VERSION,
        "method": METHOD
    }))
}

/// Compute SHA256 hash of input string.
fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Compute standard volumes for a set of field readings.
///
/// Incomplete readings are not an error: the response carries blank fields.
async fn compute(Json(input): Json<MeasurementInput>) -> Json<ComputeResponse> {
    let input_json = serde_json::to_string(&input).unwrap_or_default();
    let result = calculator::compute(&input);

    let display = result
        .as_ref()
        .map(|r| r.display())
        .unwrap_or_else(MeasurementDisplay::blank);

    if display.is_blank() {
        tracing::debug!("measurement input incomplete, returning blank result");
    }

    Json(ComputeResponse {
        tool: TOOL,
        tool_version: TOOL_VERSION,
        method: METHOD,
        unit_of_measure: input.unit_of_measure,
        display,
        effective_temperature_f: result.map(|r| r.effective_temperature_f),
        iterations: result.map(|r| r.iterations),
        converged: result.map(|r| r.converged),
        input_hash: sha256_hex(&input_json),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn post_compute(body: &str) -> (StatusCode, serde_json::Value) {
        let app = router().with_state(test_state().state);
        let response = app
            .oneshot(
                Request::post("/compute")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_compute_run_ticket() {
        let (status, json) = post_compute(
            r#"{"observedGravityAPI": "40.8", "bswPercent": "0.1", "grossObservedVolume": "185.60",
                "openTemperatureF": "79.0", "closeTemperatureF": "78.0"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["correctedGravityAPI60"], "39.2");
        assert_eq!(json["grossStandardVolume"], "183.89");
        assert_eq!(json["netStandardVolume"], "183.70");
        assert_eq!(json["effectiveTemperatureF"], 78.5);
        assert_eq!(json["converged"], true);
        assert_eq!(json["unitOfMeasure"], "Barrel");
    }

    #[tokio::test]
    async fn test_incomplete_input_is_blank_not_error() {
        let (status, json) =
            post_compute(r#"{"observedGravityAPI": "", "observedTemperatureF": 70}"#).await;

        assert_eq!(status, StatusCode::OK);
        for field in [
            "correctedGravityAPI60",
            "volumeCorrectionFactor",
            "grossStandardVolume",
            "sedimentWaterCorrectionFactor",
            "netStandardVolume",
        ] {
            assert_eq!(json[field], "", "{field} should be blank");
        }
        assert!(json["iterations"].is_null());
    }

    #[test]
    fn test_input_hash() {
        let hash = sha256_hex(r#"{"test": true}"#);
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), 7 + 64);
    }
}
