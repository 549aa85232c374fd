//! Startup and teardown of stateful subsystems.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::config::ServerConfig;

// ---------------------------------------------------------------------------
// ServiceContext
// ---------------------------------------------------------------------------

/// Context provided to services during initialization.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

// ---------------------------------------------------------------------------
// ManagedService trait
// ---------------------------------------------------------------------------

/// A subsystem with an explicit start and stop.
///
/// Services are initialized in registration order and shut down in reverse
/// registration order.
#[async_trait]
pub trait ManagedService: Send + Sync {
    /// Unique name of this service (e.g. `"custom-operations"`).
    fn name(&self) -> &'static str;

    /// Initialize the service with the given context.
    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Shut down the service. If `terminate` is true, skip graceful cleanup.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// LifecycleManager
// ---------------------------------------------------------------------------

/// Ordered set of managed services.
#[derive(Default)]
pub struct LifecycleManager {
    services: RwLock<Vec<Arc<dyn ManagedService>>>,
}

impl LifecycleManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service: Arc<dyn ManagedService>) {
        self.services.write().push(service);
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.services.read().iter().map(|s| s.name()).collect()
    }

    /// Initialize all services in registration order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first `init()` error, annotated with the service name.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let services = self.services.read().clone();
        for service in &services {
            tracing::debug!(service = service.name(), "initializing service");
            service
                .init(ctx)
                .await
                .map_err(|e| e.context(format!("failed to initialize `{}`", service.name())))?;
        }
        Ok(())
    }

    /// Shut down all services in reverse registration order.
    ///
    /// # Errors
    ///
    /// Returns the first `shutdown()` error.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        let services = self.services.read().clone();
        for service in services.iter().rev() {
            tracing::debug!(service = service.name(), terminate, "shutting down service");
            service.shutdown(terminate).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("services", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
