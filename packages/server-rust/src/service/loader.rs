//! Custom logic operations loaded from a JSON definitions file.
//!
//! ```json
//! {"jsonLogics": [{
//!     "name": "greet",
//!     "description": "Builds a greeting.",
//!     "parameters": [{"type": "string", "name": "in", "required": true}],
//!     "jsonLogic": {"cat": ["Hello ", {"var": "in"}]}
//! }]}
//! ```
//!
//! A document is installed all-or-nothing: every definition is validated
//! before the first registration, and a registration conflict rolls back
//! whatever the same document already installed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use devtools_core::LogicEngine;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::lifecycle::{ManagedService, ServiceContext};
use super::operation::{OperationDescriptor, OperationError, ParamType, ParameterSpec};
use super::registry::{OperationRegistry, RevocationHandle};

/// `root_label` tag shared by every custom operation.
pub const CUSTOM_OPERATIONS_LABEL: &str = "Custom Operations";

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// Top-level shape of a definitions file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOperationsDocument {
    #[serde(default)]
    pub json_logics: Option<Vec<CustomOperationDefinition>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOperationDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<CustomParameterDefinition>>,
    #[serde(rename = "jsonLogic", alias = "expression", default)]
    pub expression: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomParameterDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub declared_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub ui_hint: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed custom operations: {reason}")]
    MalformedDefinition { reason: String },
    #[error("failed to register custom operation: {0}")]
    Registration(#[from] OperationError),
}

fn malformed(reason: impl Into<String>) -> LoadError {
    LoadError::MalformedDefinition {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// CustomOperationLoader
// ---------------------------------------------------------------------------

/// Installs custom operations into the registry and keeps their revocation
/// handles until [`teardown`](Self::teardown).
pub struct CustomOperationLoader {
    registry: Arc<OperationRegistry>,
    engine: Arc<LogicEngine>,
    handles: Mutex<Vec<RevocationHandle>>,
}

impl CustomOperationLoader {
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>, engine: Arc<LogicEngine>) -> Self {
        Self {
            registry,
            engine,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Loads the definitions file at `location`. A missing location, or one
    /// that does not exist, installs nothing.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as [`Self::load_document`].
    pub async fn load_from(&self, location: Option<&Path>) -> Result<usize, LoadError> {
        let Some(path) = location else {
            info!("no custom operations location configured, skipping");
            return Ok(0);
        };
        let exists = tokio::fs::try_exists(path).await.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !exists {
            info!(path = %path.display(), "custom operations file does not exist, skipping");
            return Ok(0);
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let installed = self.load_document(&contents)?;
        info!(path = %path.display(), installed, "custom operations loaded");
        Ok(installed)
    }

    /// Parses, validates and registers every definition in `json`.
    /// Returns the number of operations installed.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDefinition` for unparseable or invalid documents and
    /// `Registration` when a name is already taken. Nothing from the document
    /// stays registered on error.
    pub fn load_document(&self, json: &str) -> Result<usize, LoadError> {
        let document: CustomOperationsDocument =
            serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
        let Some(definitions) = document.json_logics else {
            return Ok(0);
        };

        let descriptors = definitions
            .into_iter()
            .map(|definition| self.build_descriptor(definition))
            .collect::<Result<Vec<_>, _>>()?;

        let mut installed = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match self.registry.register(descriptor) {
                Ok(handle) => installed.push(handle),
                Err(err) => {
                    warn!(error = %err, rolled_back = installed.len(), "custom operations rejected");
                    for handle in &installed {
                        handle.revoke();
                    }
                    return Err(err.into());
                }
            }
        }

        let count = installed.len();
        self.handles.lock().extend(installed);
        Ok(count)
    }

    /// Turns one definition into a logic operation descriptor.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDefinition` for an empty name, a missing expression,
    /// or duplicate parameter names.
    pub fn build_descriptor(&self, definition: CustomOperationDefinition) -> Result<OperationDescriptor, LoadError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(malformed("operation name must not be empty"));
        }
        if definition.expression.is_null() {
            return Err(malformed(format!("`{name}` has no jsonLogic expression")));
        }

        let mut builder = OperationDescriptor::builder(name)
            .documentation(definition.description.unwrap_or_default())
            .ui_metadata(CUSTOM_OPERATIONS_LABEL, "");

        let mut seen = HashSet::new();
        for param in definition.parameters.unwrap_or_default() {
            if !seen.insert(param.name.clone()) {
                return Err(malformed(format!(
                    "`{name}` declares parameter `{}` twice",
                    param.name
                )));
            }
            let mut spec = ParameterSpec::new(param.name, param.declared_type)
                .documentation(param.documentation.unwrap_or_default());
            if param.required {
                spec = spec.required();
            }
            if let Some(hint) = param.ui_hint {
                spec = spec.ui_hint(hint);
            }
            builder = builder.param(spec);
        }

        Ok(builder.logic(definition.expression, self.engine.clone()))
    }

    /// Revokes every operation this loader installed. Returns how many were removed.
    pub fn teardown(&self) -> usize {
        let handles = std::mem::take(&mut *self.handles.lock());
        handles.iter().filter(|handle| handle.revoke()).count()
    }

    /// Names of the operations currently installed by this loader.
    #[must_use]
    pub fn installed(&self) -> Vec<String> {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_revoked())
            .map(|handle| handle.name().to_string())
            .collect()
    }
}

impl std::fmt::Debug for CustomOperationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomOperationLoader")
            .field("installed", &self.installed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ManagedService for CustomOperationLoader {
    fn name(&self) -> &'static str {
        "custom-operations"
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let location = ctx.config.resolve_custom_operations_location();
        self.load_from(location.as_deref()).await?;
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        let removed = self.teardown();
        info!(removed, "custom operations removed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use devtools_core::{LogicError, OperationResolver};
    use serde_json::json;

    use super::*;
    use crate::service::operation::{tag_categories, OperationKind, Tag};

    fn setup() -> (Arc<OperationRegistry>, CustomOperationLoader) {
        let registry = Arc::new(OperationRegistry::new());
        let resolver: Arc<dyn OperationResolver> = registry.clone();
        let engine = Arc::new(LogicEngine::with_resolver(Arc::downgrade(&resolver)));
        let loader = CustomOperationLoader::new(registry.clone(), engine);
        (registry, loader)
    }

    const GREET: &str = r#"{"jsonLogics": [{
        "name": "greet",
        "description": "Builds a greeting.",
        "parameters": [{"type": "string", "name": "in", "required": true, "uiHint": "textarea"}],
        "jsonLogic": {"cat": ["Hello ", {"var": "in"}]}
    }]}"#;

    #[tokio::test]
    async fn loads_and_dispatches_custom_operation() {
        let (registry, loader) = setup();
        assert_eq!(loader.load_document(GREET).unwrap(), 1);

        let descriptor = registry.lookup("greet").unwrap();
        assert_eq!(descriptor.kind(), OperationKind::Logic);
        assert_eq!(descriptor.documentation(), "Builds a greeting.");
        assert_eq!(descriptor.parameters()[0].ui_hint.as_deref(), Some("textarea"));
        assert_eq!(
            descriptor.tags(),
            &[
                Tag::new(tag_categories::ROOT_LABEL, CUSTOM_OPERATIONS_LABEL),
                Tag::new(tag_categories::COMMAND_PREFIX, ""),
            ]
        );

        let out = registry.dispatch("greet", json!({"in": "you"})).await.unwrap();
        assert_eq!(out, json!("Hello you"));
    }

    #[tokio::test]
    async fn required_parameter_is_enforced() {
        let (registry, loader) = setup();
        loader.load_document(GREET).unwrap();
        let err = registry.dispatch("greet", json!({})).await.unwrap_err();
        assert!(matches!(err, OperationError::MissingRequiredParameter { .. }));
    }

    #[tokio::test]
    async fn self_invoking_operation_fails_instead_of_overflowing() {
        let (registry, loader) = setup();
        loader
            .load_document(
                r#"{"jsonLogics": [
                    {"name": "loop", "jsonLogic": {"jsonrpc": {"method": "loop", "params": {}}}},
                    {"name": "ping", "jsonLogic": {"jsonrpc": {"method": "pong"}}},
                    {"name": "pong", "jsonLogic": {"jsonrpc": {"method": "ping"}}}
                ]}"#,
            )
            .unwrap();

        for name in ["loop", "ping"] {
            let err = registry.dispatch(name, json!({})).await.unwrap_err();
            assert!(
                matches!(err, OperationError::Logic(LogicError::RecursionLimit { .. })),
                "{name}: {err}"
            );
        }
        assert!(registry.contains("loop"));
    }

    #[test]
    fn null_or_missing_list_installs_nothing() {
        let (registry, loader) = setup();
        assert_eq!(loader.load_document(r#"{"jsonLogics": null}"#).unwrap(), 0);
        assert_eq!(loader.load_document("{}").unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let (_, loader) = setup();
        assert!(matches!(
            loader.load_document("{not json"),
            Err(LoadError::MalformedDefinition { .. })
        ));
    }

    #[test]
    fn invalid_definition_installs_nothing() {
        let (registry, loader) = setup();
        let doc = r#"{"jsonLogics": [
            {"name": "ok", "jsonLogic": 1},
            {"name": "dup-params", "parameters": [{"name": "a"}, {"name": "a"}], "jsonLogic": 1}
        ]}"#;
        assert!(matches!(
            loader.load_document(doc),
            Err(LoadError::MalformedDefinition { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_expression_is_malformed() {
        let (_, loader) = setup();
        let err = loader
            .load_document(r#"{"jsonLogics": [{"name": "empty"}]}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedDefinition { .. }));
    }

    #[test]
    fn name_conflict_rolls_back_the_whole_document() {
        let (registry, loader) = setup();
        registry
            .register_native(OperationDescriptor::builder("taken").native(|_| async { Ok(Value::Null) }))
            .unwrap();
        let doc = r#"{"jsonLogics": [
            {"name": "first", "jsonLogic": 1},
            {"name": "taken", "jsonLogic": 2}
        ]}"#;

        let err = loader.load_document(doc).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Registration(OperationError::DuplicateOperation { ref name }) if name == "taken"
        ));
        assert!(!registry.contains("first"));
        assert!(registry.contains("taken"));
        assert!(loader.installed().is_empty());
    }

    #[test]
    fn teardown_removes_only_custom_operations() {
        let (registry, loader) = setup();
        registry
            .register_native(OperationDescriptor::builder("native").native(|_| async { Ok(Value::Null) }))
            .unwrap();
        loader
            .load_document(r#"{"jsonLogics": [{"name": "a", "jsonLogic": 1}, {"name": "b", "expression": 2}]}"#)
            .unwrap();
        assert_eq!(loader.installed(), vec!["a", "b"]);

        assert_eq!(loader.teardown(), 2);
        assert_eq!(loader.teardown(), 0);
        assert!(registry.contains("native"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn custom_operation_composes_natives_with_sequence() {
        let (registry, loader) = setup();
        registry
            .register_native(
                OperationDescriptor::builder("reverse")
                    .param(ParameterSpec::string("value").required())
                    .native(|args| async move {
                        Ok(Value::String(args.require_string(0)?.chars().rev().collect()))
                    }),
            )
            .unwrap();
        let doc = r#"{"jsonLogics": [{
            "name": "shout-back",
            "parameters": [{"type": "STRING", "name": "in"}],
            "jsonLogic": {"sequence": {"operations": [
                {"resultName": "rev", "logic": {"jsonrpc": {"method": "reverse",
                    "params": {"value": {"$jsonLogic": {"var": "in"}}}}}},
                {"resultName": "out", "logic": {"cat": [{"var": "rev"}, "!"]}}
            ]}}
        }]}"#;
        loader.load_document(doc).unwrap();

        let out = registry.dispatch("shout-back", json!(["abc"])).await.unwrap();
        assert_eq!(out, json!("cba!"));
    }

    #[tokio::test]
    async fn load_from_missing_file_is_a_noop() {
        let (registry, loader) = setup();
        let installed = loader
            .load_from(Some(Path::new("/definitely/not/here.json")))
            .await
            .unwrap();
        assert_eq!(installed, 0);
        assert_eq!(loader.load_from(None).await.unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn load_from_reads_file() {
        let (registry, loader) = setup();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GREET.as_bytes()).unwrap();

        assert_eq!(loader.load_from(Some(file.path())).await.unwrap(), 1);
        assert!(registry.contains("greet"));
    }

    #[tokio::test]
    async fn managed_lifecycle_loads_and_tears_down() {
        let (registry, loader) = setup();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GREET.as_bytes()).unwrap();
        let ctx = ServiceContext {
            config: Arc::new(crate::service::ServerConfig {
                custom_operations_location: Some(file.path().to_path_buf()),
                ..crate::service::ServerConfig::default()
            }),
        };

        loader.init(&ctx).await.unwrap();
        assert!(registry.contains("greet"));
        loader.shutdown(false).await.unwrap();
        assert!(!registry.contains("greet"));
    }
}
