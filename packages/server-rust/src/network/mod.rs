//! HTTP transport: configuration, middleware, handlers and server lifecycle.

pub mod config;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use health::{HealthState, ServerHealth};
pub use module::NetworkModule;
