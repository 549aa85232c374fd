//! Operation registry and execution framework.
//!
//! 1. **Descriptors** (`operation`): parameters, tags, handlers, binding
//! 2. **Registry** (`registry`): concurrent name table with revocation handles
//! 3. **Native operations** (`domain`): encoding, text, formatting, generators, security
//! 4. **Custom operations** (`loader`): logic expressions loaded from a definitions file
//! 5. **Catalog** (`catalog`): OpenRPC-shaped description of the registry
//! 6. **Pipeline** (`router`, `middleware`): Tower layers around registry dispatch
//! 7. **Runtime** (`runtime`, `lifecycle`): startup and teardown wiring

pub mod catalog;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod loader;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod router;
pub mod runtime;

pub use catalog::{CatalogBuilder, CatalogDocument, CATALOG_METHOD};
pub use config::ServerConfig;
pub use lifecycle::{LifecycleManager, ManagedService, ServiceContext};
pub use loader::{CustomOperationLoader, LoadError};
pub use middleware::{build_operation_pipeline, OperationPipeline};
pub use operation::{
    OperationDescriptor, OperationError, OperationKind, ParamType, ParameterSpec, RpcCall, Tag,
};
pub use registry::{OperationRegistry, RevocationHandle};
pub use router::OperationRouter;
pub use runtime::OperationRuntime;
