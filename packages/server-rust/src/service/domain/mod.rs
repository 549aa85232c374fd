//! Native operations shipped with the server.
//!
//! Each module returns its descriptors; [`register_builtin_operations`]
//! installs all of them for the lifetime of the registry.

pub mod encoding;
pub mod formatter;
pub mod generator;
pub mod security;
pub mod text;

use super::operation::{OperationDescriptor, OperationError};
use super::registry::OperationRegistry;

/// UI widget hint for multi-line text inputs.
pub const TEXTAREA: &str = "textarea";

/// All native operations, grouped by module.
#[must_use]
pub fn builtin_operations() -> Vec<OperationDescriptor> {
    let mut operations = encoding::operations();
    operations.extend(text::operations());
    operations.extend(formatter::operations());
    operations.extend(generator::operations());
    operations.extend(security::operations());
    operations
}

/// Registers every native operation. Returns how many were installed.
///
/// # Errors
///
/// Returns `DuplicateOperation` if a native name is already taken.
pub fn register_builtin_operations(registry: &OperationRegistry) -> Result<usize, OperationError> {
    let operations = builtin_operations();
    let count = operations.len();
    for descriptor in operations {
        let name = descriptor.name().to_string();
        registry.register_native(descriptor).inspect_err(|err| {
            tracing::warn!(operation = %name, error = %err, "native operation collides");
        })?;
    }
    Ok(count)
}
