//! OpenRPC-shaped catalog of every registered operation.
//!
//! The catalog is rebuilt from a registry snapshot on every request, so it
//! always reflects the current set of custom operations.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::config::ServerConfig;
use super::operation::{OperationDescriptor, OperationError, ParameterSpec};
use super::registry::OperationRegistry;

/// Name under which the catalog publishes itself.
pub const CATALOG_METHOD: &str = "openrpc";

pub const OPENRPC_VERSION: &str = "1.2.6";

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub openrpc: String,
    pub info: CatalogInfo,
    pub methods: Vec<CatalogMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMethod {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<CatalogTag>,
    pub params: Vec<CatalogParam>,
    pub result: CatalogResult,
}

/// A tag as published: `name` is the tag label, `summary` its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTag {
    pub name: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiHint {
    pub widget: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogResult {
    pub name: String,
    pub schema: Value,
}

// ---------------------------------------------------------------------------
// CatalogBuilder
// ---------------------------------------------------------------------------

/// Describes the registry it was built for. Holds the registry weakly so it
/// can itself be registered as an operation.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    registry: Weak<OperationRegistry>,
    title: String,
    version: String,
}

impl CatalogBuilder {
    #[must_use]
    pub fn new(registry: &Arc<OperationRegistry>, config: &ServerConfig) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            title: config.catalog_title.clone(),
            version: config.catalog_version.clone(),
        }
    }

    /// Current catalog, one method per registered operation in registration order.
    #[must_use]
    pub fn describe(&self) -> CatalogDocument {
        let methods = self
            .registry
            .upgrade()
            .map(|registry| registry.list().iter().map(|d| describe_operation(d)).collect())
            .unwrap_or_default();
        CatalogDocument {
            openrpc: OPENRPC_VERSION.to_string(),
            info: CatalogInfo {
                title: self.title.clone(),
                version: self.version.clone(),
            },
            methods,
        }
    }

    /// Wraps this builder as the native `openrpc` operation.
    #[must_use]
    pub fn into_descriptor(self) -> OperationDescriptor {
        let builder = Arc::new(self);
        OperationDescriptor::builder(CATALOG_METHOD)
            .documentation("Describes every operation this server can dispatch.")
            .native(move |_| {
                let builder = builder.clone();
                async move {
                    serde_json::to_value(builder.describe())
                        .map_err(|e| OperationError::Internal(e.into()))
                }
            })
    }
}

/// Catalog entry for one operation.
#[must_use]
pub fn describe_operation(descriptor: &OperationDescriptor) -> CatalogMethod {
    CatalogMethod {
        name: descriptor.name().to_string(),
        description: descriptor.documentation().to_string(),
        tags: descriptor
            .tags()
            .iter()
            .map(|tag| CatalogTag {
                name: tag.label.clone(),
                summary: tag.category.clone(),
            })
            .collect(),
        params: descriptor.parameters().iter().map(describe_parameter).collect(),
        result: CatalogResult {
            name: "result".to_string(),
            schema: json!({}),
        },
    }
}

fn describe_parameter(param: &ParameterSpec) -> CatalogParam {
    let mut schema = json!({"type": param.declared_type.schema_type()});
    if !param.allowed_values.is_empty() {
        schema["enum"] = json!(param.allowed_values);
    }
    CatalogParam {
        name: param.name.clone(),
        description: param.documentation.clone(),
        required: param.required,
        schema,
        ui: param.ui_hint.clone().map(|widget| UiHint { widget }),
    }
}
