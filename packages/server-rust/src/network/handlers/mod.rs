//! HTTP handlers and the shared state they extract.

pub mod health;
pub mod rpc;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use rpc::jsonrpc_handler;

use std::sync::Arc;
use std::time::Instant;

use super::health::ServerHealth;
use crate::service::OperationRuntime;

/// Shared application state passed to all axum handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<OperationRuntime>,
    pub health: Arc<ServerHealth>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
