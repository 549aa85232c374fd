//! `uuid-*` operations.

use serde_json::Value;
use uuid::Uuid;

use crate::service::operation::OperationDescriptor;

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![OperationDescriptor::builder("uuid-generator")
        .documentation("Creates a new random UUID.")
        .ui_metadata("Generator", "uuid-")
        .native(|_| async { Ok(Value::String(Uuid::new_v4().to_string())) })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::registry::OperationRegistry;

    #[tokio::test]
    async fn generates_distinct_v4_uuids() {
        let registry = OperationRegistry::new();
        for descriptor in operations() {
            registry.register_native(descriptor).unwrap();
        }
        let a = registry.dispatch("uuid-generator", Value::Null).await.unwrap();
        let b = registry.dispatch("uuid-generator", Value::Null).await.unwrap();
        assert_ne!(a, b);

        let parsed = Uuid::parse_str(a.as_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }
}
