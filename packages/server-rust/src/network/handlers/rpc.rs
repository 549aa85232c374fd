//! JSON-RPC 2.0 endpoint.
//!
//! Accepts a single request object or a batch array. Requests without an
//! `id` are notifications: they run but produce no response entry. Batch
//! entries run in order.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::service::OperationError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Expression evaluation failed inside a logic operation.
pub const LOGIC_ERROR: i64 = -32000;
/// The call timed out or was shed under load.
pub const UNAVAILABLE: i64 = -32001;

pub async fn jsonrpc_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let _guard = state.health.call_guard();

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return Json(error_response(Value::Null, PARSE_ERROR, &e.to_string())).into_response(),
    };

    match payload {
        Value::Array(entries) if entries.is_empty() => {
            Json(error_response(Value::Null, INVALID_REQUEST, "empty batch")).into_response()
        }
        Value::Array(entries) => {
            let mut responses = Vec::with_capacity(entries.len());
            for entry in entries {
                if let Some(response) = handle_entry(&state, entry).await {
                    responses.push(response);
                }
            }
            if responses.is_empty() {
                StatusCode::NO_CONTENT.into_response()
            } else {
                Json(Value::Array(responses)).into_response()
            }
        }
        single => match handle_entry(&state, single).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
    }
}

/// Runs one request. Returns `None` for notifications.
async fn handle_entry(state: &AppState, entry: Value) -> Option<Value> {
    let Value::Object(mut request) = entry else {
        return Some(error_response(Value::Null, INVALID_REQUEST, "request must be an object"));
    };
    let id = request.remove("id");

    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Some(error_response(id.unwrap_or(Value::Null), INVALID_REQUEST, "jsonrpc must be \"2.0\""));
    }
    let Some(Value::String(method)) = request.remove("method") else {
        return Some(error_response(id.unwrap_or(Value::Null), INVALID_REQUEST, "method must be a string"));
    };
    let params = request.remove("params").unwrap_or(Value::Null);

    let outcome = state.runtime.call(&method, params).await;
    let id = id?;
    Some(match outcome {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err(err) => error_response(id, error_code(&err), &err.to_string()),
    })
}

/// JSON-RPC error code for an operation failure.
#[must_use]
pub fn error_code(err: &OperationError) -> i64 {
    match err {
        OperationError::UnknownOperation { .. } => METHOD_NOT_FOUND,
        OperationError::MissingRequiredParameter { .. }
        | OperationError::InvalidParameter { .. }
        | OperationError::InvalidParams { .. } => INVALID_PARAMS,
        OperationError::Logic(_) => LOGIC_ERROR,
        OperationError::Timeout { .. } | OperationError::Overloaded => UNAVAILABLE,
        OperationError::DuplicateOperation { .. } | OperationError::Internal(_) => INTERNAL_ERROR,
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::to_bytes;
    use devtools_core::LogicError;

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

    async fn call(state: &AppState, body: &str) -> (StatusCode, Value) {
        let response = jsonrpc_handler(State(state.clone()), Bytes::from(body.to_string())).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn single_request_returns_result() {
        let state = test_state();
        let (status, body) = call(
            &state,
            r#"{"jsonrpc": "2.0", "id": 7, "method": "hex-encode", "params": {"value": "A"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"jsonrpc": "2.0", "id": 7, "result": "41"}));
        assert_eq!(state.health.in_flight(), 0);
    }

    #[tokio::test]
    async fn unknown_method_maps_to_method_not_found() {
        let (_, body) = call(&test_state(), r#"{"jsonrpc": "2.0", "id": "a", "method": "nope"}"#).await;
        assert_eq!(body["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(body["id"], "a");
    }

    #[tokio::test]
    async fn parse_error_and_invalid_request() {
        let state = test_state();
        let (_, body) = call(&state, "{").await;
        assert_eq!(body["error"]["code"], PARSE_ERROR);

        let (_, body) = call(&state, r#"{"jsonrpc": "1.0", "id": 1, "method": "x"}"#).await;
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
        assert_eq!(body["id"], 1);

        let (_, body) = call(&state, "[]").await;
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn batch_skips_notifications() {
        let (status, body) = call(
            &test_state(),
            r#"[
                {"jsonrpc": "2.0", "id": 1, "method": "hex-encode", "params": ["B"]},
                {"jsonrpc": "2.0", "method": "uuid-generator"},
                {"jsonrpc": "2.0", "id": 2, "method": "hex-decode", "params": {}},
                5
            ]"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["result"], "42");
        assert_eq!(entries[1]["error"]["code"], INVALID_PARAMS);
        assert_eq!(entries[2]["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn notification_only_yields_no_content() {
        let (status, body) = call(&test_state(), r#"{"jsonrpc": "2.0", "method": "uuid-generator"}"#).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
    }

    #[test]
    fn error_codes() {
        assert_eq!(error_code(&OperationError::Overloaded), UNAVAILABLE);
        assert_eq!(error_code(&OperationError::Timeout { timeout_ms: 1 }), UNAVAILABLE);
        assert_eq!(
            error_code(&OperationError::Logic(LogicError::ResolverUnavailable)),
            LOGIC_ERROR
        );
        assert_eq!(
            error_code(&OperationError::Internal(anyhow::anyhow!("x"))),
            INTERNAL_ERROR
        );
    }
}
