//! JSON presentation of the cached state.
//!
//! Each endpoint returns the composed record, or `503 Service Unavailable` while
//! the state has not been observed yet (for example during warm-up after start).

use crate::state::HvacState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn respond<T: Serialize>(value: Option<T>, what: &str) -> Response {
    match value {
        Some(value) => Json(value).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error: format!("{what} not yet known"),
            }),
        )
            .into_response(),
    }
}

async fn zone_config(State(state): State<HvacState>) -> Response {
    respond(state.get_thermostat_config(), "thermostat configuration")
}

async fn air_handler(State(state): State<HvacState>) -> Response {
    respond(state.get_air_handler_state(), "air handler state")
}

async fn heat_pump(State(state): State<HvacState>) -> Response {
    respond(state.get_heat_pump_state(), "heat pump state")
}

async fn health_check() -> &'static str {
    "OK"
}

/// Builds the top-level router.
pub fn router(state: HvacState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/zone/1/config", get(zone_config))
        .route("/api/airhandler", get(air_handler))
        .route("/api/heatpump", get(heat_pump))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StateCache;
    use crate::constants::{KEY_HEAT_PUMP, KEY_HEAT_PUMP_STAGE};
    use crate::decode::{DomainRecord, HeatPumpStage, HeatPumpTemperatures};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_state_is_503() {
        let app = router(HvacState::new(Arc::new(StateCache::new())));
        let (status, body) = get_json(app, "/api/heatpump").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "heat pump state not yet known");
    }

    #[tokio::test]
    async fn test_heat_pump_json() {
        let cache = Arc::new(StateCache::new());
        cache.update(
            KEY_HEAT_PUMP,
            DomainRecord::HeatPump(HeatPumpTemperatures {
                coil_temp: 16.0,
                outside_temp: 2.5,
            }),
        );
        cache.update(KEY_HEAT_PUMP_STAGE, DomainRecord::HeatPumpStage(HeatPumpStage { stage: 1 }));
        let app = router(HvacState::new(cache));

        let (status, body) = get_json(app, "/api/heatpump").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coilTemp"], 16.0);
        assert_eq!(body["outsideTemp"], 2.5);
        assert_eq!(body["stage"], 1);
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(HvacState::new(Arc::new(StateCache::new())));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
