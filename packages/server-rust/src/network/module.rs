//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{health_handler, jsonrpc_handler, liveness_handler, readiness_handler, AppState};
use super::health::ServerHealth;
use super::middleware::build_http_layers;
use crate::service::OperationRuntime;

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    runtime: Arc<OperationRuntime>,
    health: Arc<ServerHealth>,
    start_time: Instant,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, runtime: Arc<OperationRuntime>) -> Self {
        Self {
            config,
            listener: None,
            runtime,
            health: Arc::new(ServerHealth::new()),
            start_time: Instant::now(),
        }
    }

    /// Shared health state; the caller marks it ready once custom
    /// operations are loaded.
    #[must_use]
    pub fn health(&self) -> Arc<ServerHealth> {
        Arc::clone(&self.health)
    }

    /// Routes:
    /// - `POST /jsonrpc` -- JSON-RPC 2.0, single or batch
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    pub fn build_router(&self) -> Router {
        let state = AppState {
            runtime: Arc::clone(&self.runtime),
            health: Arc::clone(&self.health),
            start_time: self.start_time,
        };

        Router::new()
            .route("/jsonrpc", post(jsonrpc_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the listener and returns the actual port (relevant for port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "TCP listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then waits for in-flight calls.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(mut self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();

        info!("serving JSON-RPC over HTTP");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.health.begin_drain();
        if self.health.wait_for_drain(self.config.drain_timeout).await {
            info!("all calls drained");
        } else {
            warn!(in_flight = self.health.in_flight(), "drain timeout expired");
        }
        Ok(())
    }
}
