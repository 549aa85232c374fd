//! Pipeline composition: combines all middleware layers into a single service stack.

use serde_json::Value;
use tower::{ServiceBuilder, ServiceExt};

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{OperationError, RpcCall};
use crate::service::router::OperationRouter;

/// Build the operation pipeline by wrapping the `OperationRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `TimeoutLayer` -- enforce per-call timeouts
/// 3. `MetricsLayer` -- record timing and outcome (closest to the actual handler)
#[must_use]
pub fn build_operation_pipeline(router: OperationRouter, config: &ServerConfig) -> OperationPipeline {
    OperationPipeline {
        router,
        load_shed: LoadShedLayer::new(config.max_concurrent_operations),
    }
}

/// Cloneable handle to the composed pipeline, shared across HTTP handlers.
///
/// The load-shed semaphore is shared by all clones; each call gets a fresh
/// service stack around a clone of the router.
#[derive(Debug, Clone)]
pub struct OperationPipeline {
    router: OperationRouter,
    load_shed: LoadShedLayer,
}

impl OperationPipeline {
    /// Calls rejected by load shedding since startup.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.load_shed.rejected()
    }

    /// Runs one call through all layers.
    ///
    /// # Errors
    ///
    /// Returns `Overloaded`, `Timeout`, or the operation's own error.
    pub async fn call(&self, call: RpcCall) -> Result<Value, OperationError> {
        ServiceBuilder::new()
            .layer(self.load_shed.clone())
            .layer(TimeoutLayer)
            .layer(MetricsLayer)
            .service(self.router.clone())
            .oneshot(call)
            .await
    }
}
