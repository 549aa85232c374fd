//! Operation routing: dispatches `RpcCall` values through the registry by method name.

use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tower::Service;

use super::operation::{BoxedFuture, OperationError, RpcCall};
use super::registry::OperationRegistry;

/// Innermost service of the pipeline. Calls to names that are not
/// registered return `OperationError::UnknownOperation`.
#[derive(Debug, Clone)]
pub struct OperationRouter {
    registry: Arc<OperationRegistry>,
}

impl OperationRouter {
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }
}

impl Service<RpcCall> for OperationRouter {
    type Response = Value;
    type Error = OperationError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: RpcCall) -> Self::Future {
        let registry = self.registry.clone();
        Box::pin(async move { registry.dispatch(&call.method, call.params).await })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::operation::OperationDescriptor;

    fn registry() -> Arc<OperationRegistry> {
        let registry = Arc::new(OperationRegistry::new());
        registry
            .register_native(
                OperationDescriptor::builder("ping").native(|_| async { Ok(json!("pong")) }),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn routes_by_method_name() {
        let router = OperationRouter::new(registry());
        let out = router.oneshot(RpcCall::new(1, "ping", Value::Null, 1000)).await.unwrap();
        assert_eq!(out, json!("pong"));
    }

    #[tokio::test]
    async fn unknown_method_returns_error() {
        let router = OperationRouter::new(registry());
        let err = router
            .oneshot(RpcCall::new(2, "missing", Value::Null, 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::UnknownOperation { name } if name == "missing"));
    }
}
