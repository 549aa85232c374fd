//! Wiring of registry, logic engine, native operations, catalog and custom operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use devtools_core::{LogicEngine, OperationResolver};
use serde_json::Value;

use super::catalog::CatalogBuilder;
use super::config::ServerConfig;
use super::domain::register_builtin_operations;
use super::lifecycle::{LifecycleManager, ServiceContext};
use super::loader::CustomOperationLoader;
use super::middleware::{build_operation_pipeline, OperationPipeline};
use super::operation::{OperationError, RpcCall};
use super::registry::OperationRegistry;
use super::router::OperationRouter;

/// Everything needed to dispatch operations, assembled once at startup.
///
/// Native operations and the catalog are registered on construction.
/// Custom operations are installed by [`start`](Self::start) and removed
/// by [`shutdown`](Self::shutdown).
pub struct OperationRuntime {
    config: Arc<ServerConfig>,
    registry: Arc<OperationRegistry>,
    engine: Arc<LogicEngine>,
    custom_operations: Arc<CustomOperationLoader>,
    lifecycle: LifecycleManager,
    pipeline: OperationPipeline,
    next_call_id: AtomicU64,
}

impl OperationRuntime {
    /// # Errors
    ///
    /// Returns an error if a native operation name is registered twice.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(OperationRegistry::new());
        let resolver: Arc<dyn OperationResolver> = registry.clone();
        let engine = Arc::new(LogicEngine::with_resolver(Arc::downgrade(&resolver)));

        let natives = register_builtin_operations(&registry)?;
        registry.register_native(CatalogBuilder::new(&registry, &config).into_descriptor())?;
        tracing::debug!(natives, "native operations registered");

        let custom_operations = Arc::new(CustomOperationLoader::new(registry.clone(), engine.clone()));
        let lifecycle = LifecycleManager::new();
        lifecycle.register(custom_operations.clone());

        let pipeline = build_operation_pipeline(OperationRouter::new(registry.clone()), &config);

        Ok(Self {
            config,
            registry,
            engine,
            custom_operations,
            lifecycle,
            pipeline,
            next_call_id: AtomicU64::new(1),
        })
    }

    /// Initializes managed services, which loads custom operations.
    ///
    /// A failure leaves the native operations registered and usable.
    ///
    /// # Errors
    ///
    /// Returns the first service initialization error.
    pub async fn start(&self) -> anyhow::Result<()> {
        let ctx = ServiceContext {
            config: self.config.clone(),
        };
        self.lifecycle.init_all(&ctx).await
    }

    /// Shuts managed services down in reverse order, removing custom operations.
    ///
    /// # Errors
    ///
    /// Returns the first service shutdown error.
    pub async fn shutdown(&self, terminate: bool) -> anyhow::Result<()> {
        self.lifecycle.shutdown_all(terminate).await
    }

    /// Dispatches `method` through the middleware pipeline with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns whatever the pipeline or the operation fails with.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, OperationError> {
        let call = RpcCall::new(
            self.next_call_id(),
            method,
            params,
            self.config.default_operation_timeout_ms,
        );
        self.pipeline.call(call).await
    }

    #[must_use]
    pub fn next_call_id(&self) -> u64 {
        self.next_call_id.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<LogicEngine> {
        &self.engine
    }

    #[must_use]
    pub fn custom_operations(&self) -> &Arc<CustomOperationLoader> {
        &self.custom_operations
    }

    #[must_use]
    pub fn pipeline(&self) -> &OperationPipeline {
        &self.pipeline
    }
}

impl std::fmt::Debug for OperationRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRuntime")
            .field("registry", &self.registry)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::catalog::CATALOG_METHOD;

    #[tokio::test]
    async fn natives_and_catalog_are_available_before_start() {
        let runtime = OperationRuntime::new(ServerConfig::default()).unwrap();
        assert!(runtime.registry().contains(CATALOG_METHOD));

        let out = runtime.call("hex-encode", json!({"value": "A"})).await.unwrap();
        assert_eq!(out, json!("41"));
    }

    #[tokio::test]
    async fn start_failure_keeps_natives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let runtime = OperationRuntime::new(ServerConfig {
            custom_operations_location: Some(path),
            ..ServerConfig::default()
        })
        .unwrap();

        assert!(runtime.start().await.is_err());
        assert!(runtime.registry().contains("uuid-generator"));
        assert!(runtime.custom_operations().installed().is_empty());
    }

    #[test]
    fn call_ids_increase() {
        let runtime = OperationRuntime::new(ServerConfig::default()).unwrap();
        let first = runtime.next_call_id();
        assert!(runtime.next_call_id() > first);
    }
}
