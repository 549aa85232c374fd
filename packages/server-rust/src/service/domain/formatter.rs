//! `json-*` operations.

use serde_json::Value;

use super::TEXTAREA;
use crate::service::operation::{Arguments, OperationDescriptor, OperationError, ParameterSpec};

pub(super) fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::builder("json-format")
            .documentation("Pretty-prints a JSON document.")
            .ui_metadata("Formatter", "json-")
            .param(
                ParameterSpec::string("value")
                    .required()
                    .documentation("JSON to format.")
                    .ui_hint(TEXTAREA),
            )
            .native(|args| async move { format(&args) }),
        OperationDescriptor::builder("json-unescape")
            .documentation("Unescapes an escaped JSON string.")
            .ui_metadata("Formatter", "json-")
            .param(
                ParameterSpec::string("value")
                    .required()
                    .documentation("Escaped JSON string, with or without surrounding quotes.")
                    .ui_hint(TEXTAREA),
            )
            .native(|args| async move { unescape(&args) }),
    ]
}

fn format(args: &Arguments) -> Result<Value, OperationError> {
    let parsed: Value = serde_json::from_str(args.require_string(0)?).map_err(|e| args.invalid(0, e.to_string()))?;
    serde_json::to_string_pretty(&parsed)
        .map(Value::String)
        .map_err(|e| OperationError::Internal(e.into()))
}

fn unescape(args: &Arguments) -> Result<Value, OperationError> {
    let value = args.require_string(0)?;
    let quoted = if !value.starts_with('"') && !value.ends_with('"') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    };
    serde_json::from_str(&quoted).map_err(|e| args.invalid(0, e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::registry::OperationRegistry;

    fn registry() -> OperationRegistry {
        let registry = OperationRegistry::new();
        for descriptor in operations() {
            registry.register_native(descriptor).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn format_pretty_prints() {
        let out = registry()
            .dispatch("json-format", json!({"value": "{\"a\":[1,2]}"}))
            .await
            .unwrap();
        assert_eq!(out, json!("{\n  \"a\": [\n    1,\n    2\n  ]\n}"));
    }

    #[tokio::test]
    async fn format_rejects_invalid_json() {
        let err = registry()
            .dispatch("json-format", json!({"value": "{"}))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn unescape_adds_missing_quotes() {
        let registry = registry();
        let out = registry
            .dispatch("json-unescape", json!({"value": "{\\\"a\\\":1}"}))
            .await
            .unwrap();
        assert_eq!(out, json!("{\"a\":1}"));

        let out = registry
            .dispatch("json-unescape", json!({"value": "\"line\\nbreak\""}))
            .await
            .unwrap();
        assert_eq!(out, json!("line\nbreak"));
    }
}
