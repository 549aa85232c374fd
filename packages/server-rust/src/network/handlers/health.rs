//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::health::HealthState;

/// Detailed health as JSON. Always 200; `state` tells whether the server
/// is actually ready.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": state.health.state().as_str(),
        "operations": state.runtime.registry().len(),
        "custom_operations": state.runtime.custom_operations().installed().len(),
        "in_flight": state.health.in_flight(),
        "rejected_operations": state.runtime.pipeline().rejected(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: the process is up.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 once custom operations are loaded, 503 before that
/// and while draining.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::network::health::ServerHealth;
    use crate::service::{OperationRuntime, ServerConfig};

    fn test_state() -> AppState {
        AppState {
            runtime: Arc::new(OperationRuntime::new(ServerConfig::default()).unwrap()),
            health: Arc::new(ServerHealth::new()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn health_reports_operations_and_state() {
        let state = test_state();
        let expected = state.runtime.registry().len();
        state.health.set_ready();

        let body = health_handler(State(state)).await.0;
        assert_eq!(body["state"], "ready");
        assert_eq!(body["operations"], expected);
        assert_eq!(body["custom_operations"], 0);
        assert_eq!(body["in_flight"], 0);
        assert_eq!(body["rejected_operations"], 0);
        assert!(body["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::SERVICE_UNAVAILABLE);
        state.health.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);
        state.health.begin_drain();
        assert_eq!(readiness_handler(State(state)).await, StatusCode::SERVICE_UNAVAILABLE);
    }
}
