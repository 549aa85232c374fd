use async_trait::async_trait;
use serde_json::Value;

use crate::logic::LogicResult;

/// Read-only invocation capability into an operation registry.
///
/// The logic engine only ever calls operations through this trait; it never
/// registers or removes them. Implemented by the server's operation registry.
#[async_trait]
pub trait OperationResolver: Send + Sync {
    /// Whether an operation with this name is currently registered.
    fn contains(&self, method: &str) -> bool;

    /// Dispatch `params` (object, array or null) to the named operation.
    ///
    /// Returns `LogicError::UnknownOperation` when no such operation exists.
    async fn invoke(&self, method: &str, params: Value) -> LogicResult;
}
