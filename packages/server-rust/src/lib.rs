//! Dev tools server: a registry of native and custom operations, a catalog
//! describing them, and a JSON-RPC transport dispatching into the registry.

pub mod network;
pub mod service;

pub use network::{NetworkConfig, NetworkModule};
pub use service::{OperationRuntime, ServerConfig};
