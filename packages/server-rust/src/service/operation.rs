//! Operation descriptors, argument binding and dispatch errors.
//!
//! A descriptor carries everything the registry and the catalog need: name,
//! documentation, ordered parameters, category tags and the handler. Handlers
//! are either native closures or a logic expression evaluated by the shared
//! [`LogicEngine`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use devtools_core::{LogicEngine, LogicError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Future returned by every operation handler.
pub type BoxedFuture = Pin<Box<dyn Future<Output = Result<Value, OperationError>> + Send>>;

/// Type-erased native handler over bound positional arguments.
pub type NativeHandler = Arc<dyn Fn(Arguments) -> BoxedFuture + Send + Sync>;

/// Tag categories understood by catalog consumers.
pub mod tag_categories {
    /// Top-level menu group an operation is listed under.
    pub const ROOT_LABEL: &str = "root_label";
    /// Name prefix shared by the operations of one group.
    pub const COMMAND_PREFIX: &str = "command_prefix";
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by registration and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("operation already registered: {name}")]
    DuplicateOperation { name: String },
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("missing required parameter `{parameter}` for `{operation}`")]
    MissingRequiredParameter { operation: String, parameter: String },
    #[error("invalid parameter `{parameter}` for `{operation}`: {reason}")]
    InvalidParameter {
        operation: String,
        parameter: String,
        reason: String,
    },
    #[error("invalid params for `{operation}`: {reason}")]
    InvalidParams { operation: String, reason: String },
    #[error(transparent)]
    Logic(#[from] LogicError),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Call envelope
// ---------------------------------------------------------------------------

/// Per-call metadata carried through the dispatch pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub call_id: u64,
    pub call_timeout_ms: u64,
}

/// A single operation call as seen by the dispatch pipeline.
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub ctx: CallContext,
    pub method: String,
    pub params: Value,
}

impl RpcCall {
    #[must_use]
    pub fn new(call_id: u64, method: impl Into<String>, params: Value, call_timeout_ms: u64) -> Self {
        Self {
            ctx: CallContext {
                call_id,
                call_timeout_ms,
            },
            method: method.into(),
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters and tags
// ---------------------------------------------------------------------------

/// Declared type of an operation parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    #[serde(alias = "STRING", alias = "String")]
    String,
    #[serde(alias = "NUMBER", alias = "Number")]
    Number,
    #[serde(alias = "BOOLEAN", alias = "Boolean")]
    Boolean,
}

impl ParamType {
    /// JSON-schema `type` keyword for this parameter type.
    #[must_use]
    pub fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// One parameter of an operation. `position` is assigned by the builder in
/// declaration order and fixed for the lifetime of the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub position: usize,
    pub declared_type: ParamType,
    pub required: bool,
    pub documentation: String,
    /// Opaque rendering hint for UIs (e.g. `"textarea"`).
    pub ui_hint: Option<String>,
    /// Allowed values for string parameters; empty means unrestricted.
    pub allowed_values: Vec<String>,
}

impl ParameterSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: ParamType) -> Self {
        Self {
            name: name.into(),
            position: 0,
            declared_type,
            required: false,
            documentation: String::new(),
            ui_hint: None,
            allowed_values: Vec::new(),
        }
    }

    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    #[must_use]
    pub fn ui_hint(mut self, hint: impl Into<String>) -> Self {
        self.ui_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(ToString::to_string).collect();
        self
    }
}

/// A `(category, label)` pair used to group operations in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub category: String,
    pub label: String,
}

impl Tag {
    #[must_use]
    pub fn new(category: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Positional arguments bound against an operation's parameter list.
/// Absent arguments are `Value::Null`.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    operation: String,
    names: Vec<String>,
    values: Vec<Value>,
}

impl Arguments {
    /// Argument at `position`, or `None` when absent or null.
    #[must_use]
    pub fn value(&self, position: usize) -> Option<&Value> {
        self.values.get(position).filter(|v| !v.is_null())
    }

    /// String argument at `position`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when the argument is present but not a string.
    pub fn string(&self, position: usize) -> Result<Option<&str>, OperationError> {
        match self.value(position) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.invalid(position, format!("expected a string, got {other}"))),
        }
    }

    /// String argument at `position` that must be present.
    ///
    /// # Errors
    ///
    /// Returns `MissingRequiredParameter` when absent and `InvalidParameter`
    /// when not a string.
    pub fn require_string(&self, position: usize) -> Result<&str, OperationError> {
        self.string(position)?
            .ok_or_else(|| OperationError::MissingRequiredParameter {
                operation: self.operation.clone(),
                parameter: self.name(position).to_string(),
            })
    }

    /// Builds an `InvalidParameter` error for the argument at `position`.
    #[must_use]
    pub fn invalid(&self, position: usize, reason: impl Into<String>) -> OperationError {
        OperationError::InvalidParameter {
            operation: self.operation.clone(),
            parameter: self.name(position).to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn name(&self, position: usize) -> &str {
        self.names.get(position).map_or("?", String::as_str)
    }
}

// ---------------------------------------------------------------------------
// OperationDescriptor
// ---------------------------------------------------------------------------

/// Whether an operation is compiled in or defined as a logic expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Native,
    Logic,
}

/// Handler variants. Logic handlers close over their expression and the engine.
#[derive(Clone)]
pub enum OperationHandler {
    Native(NativeHandler),
    Logic {
        expression: Value,
        engine: Arc<LogicEngine>,
    },
}

/// A dispatchable operation and its catalog metadata.
pub struct OperationDescriptor {
    name: String,
    documentation: String,
    parameters: Vec<ParameterSpec>,
    tags: Vec<Tag>,
    handler: OperationHandler,
}

impl OperationDescriptor {
    /// Starts building a descriptor for `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            name: name.into(),
            documentation: String::new(),
            parameters: Vec::new(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    #[must_use]
    pub fn handler(&self) -> &OperationHandler {
        &self.handler
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self.handler {
            OperationHandler::Native(_) => OperationKind::Native,
            OperationHandler::Logic { .. } => OperationKind::Logic,
        }
    }

    /// Binds a JSON-RPC `params` payload to the parameter list.
    ///
    /// Objects bind by name, arrays by position, `null` binds nothing.
    /// Required parameters must be present and non-null.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParams` for scalar payloads or surplus positional
    /// arguments and `MissingRequiredParameter` for absent required ones.
    pub fn bind(&self, payload: Value) -> Result<Arguments, OperationError> {
        let count = self.parameters.len();
        let values = match payload {
            Value::Null => vec![Value::Null; count],
            Value::Object(mut named) => self
                .parameters
                .iter()
                .map(|p| named.remove(&p.name).unwrap_or(Value::Null))
                .collect(),
            Value::Array(mut positional) => {
                if positional.len() > count {
                    return Err(OperationError::InvalidParams {
                        operation: self.name.clone(),
                        reason: format!("expected at most {count} arguments, got {}", positional.len()),
                    });
                }
                positional.resize(count, Value::Null);
                positional
            }
            scalar => {
                return Err(OperationError::InvalidParams {
                    operation: self.name.clone(),
                    reason: format!("params must be an object or an array, got {scalar}"),
                })
            }
        };

        if let Some(missing) = self
            .parameters
            .iter()
            .find(|p| p.required && values[p.position].is_null())
        {
            return Err(OperationError::MissingRequiredParameter {
                operation: self.name.clone(),
                parameter: missing.name.clone(),
            });
        }

        Ok(Arguments {
            operation: self.name.clone(),
            names: self.parameters.iter().map(|p| p.name.clone()).collect(),
            values,
        })
    }

    /// Binds `payload` and runs the handler.
    ///
    /// # Errors
    ///
    /// Returns binding errors, handler errors, or the logic evaluation error.
    pub async fn invoke(&self, payload: Value) -> Result<Value, OperationError> {
        let args = self.bind(payload)?;
        match &self.handler {
            OperationHandler::Native(handler) => handler(args).await,
            OperationHandler::Logic { expression, engine } => {
                let context = self.logic_context(&args)?;
                Ok(engine.apply(expression, &context).await?)
            }
        }
    }

    /// Builds the evaluation context of a logic operation: one field per
    /// present argument, coerced to the declared type.
    fn logic_context(&self, args: &Arguments) -> Result<Value, OperationError> {
        let mut context = Map::new();
        for param in &self.parameters {
            let Some(value) = args.value(param.position) else {
                continue;
            };
            let coerced = match param.declared_type {
                ParamType::String => Value::String(match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
                ParamType::Number => coerce_number(value)
                    .ok_or_else(|| args.invalid(param.position, format!("expected a number, got {value}")))?,
                ParamType::Boolean => Value::Bool(matches!(value, Value::Bool(true))),
            };
            context.insert(param.name.clone(), coerced);
        }
        Ok(Value::Object(context))
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    let widened = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(widened).map(Value::Number)
}

impl std::fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("parameters", &self.parameters)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// OperationBuilder
// ---------------------------------------------------------------------------

/// Registration-time metadata builder. Native operations attach their tags
/// and UI hints here instead of through annotations.
#[derive(Debug)]
pub struct OperationBuilder {
    name: String,
    documentation: String,
    parameters: Vec<ParameterSpec>,
    tags: Vec<Tag>,
}

impl OperationBuilder {
    #[must_use]
    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    /// Appends a parameter; its position is its index in declaration order.
    #[must_use]
    pub fn param(mut self, mut spec: ParameterSpec) -> Self {
        spec.position = self.parameters.len();
        self.parameters.push(spec);
        self
    }

    #[must_use]
    pub fn tag(mut self, category: impl Into<String>, label: impl Into<String>) -> Self {
        self.tags.push(Tag::new(category, label));
        self
    }

    /// Adds the `root_label` / `command_prefix` tag pair.
    #[must_use]
    pub fn ui_metadata(self, root_label: &str, command_prefix: &str) -> Self {
        self.tag(tag_categories::ROOT_LABEL, root_label)
            .tag(tag_categories::COMMAND_PREFIX, command_prefix)
    }

    /// Finishes with a native handler.
    pub fn native<F, Fut>(self, handler: F) -> OperationDescriptor
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
    {
        let handler: NativeHandler = Arc::new(move |args| Box::pin(handler(args)));
        self.finish(OperationHandler::Native(handler))
    }

    /// Finishes with a logic expression evaluated by `engine`.
    #[must_use]
    pub fn logic(self, expression: Value, engine: Arc<LogicEngine>) -> OperationDescriptor {
        self.finish(OperationHandler::Logic { expression, engine })
    }

    fn finish(self, handler: OperationHandler) -> OperationDescriptor {
        OperationDescriptor {
            name: self.name,
            documentation: self.documentation,
            parameters: self.parameters,
            tags: self.tags,
            handler,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn echo() -> OperationDescriptor {
        OperationDescriptor::builder("echo")
            .documentation("Echoes its arguments.")
            .param(ParameterSpec::string("first").required())
            .param(ParameterSpec::new("second", ParamType::Number))
            .native(|args| async move { Ok(Value::Array(args.values().to_vec())) })
    }

    #[test]
    fn builder_assigns_positions_in_order() {
        let op = echo();
        let positions: Vec<usize> = op.parameters().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(op.kind(), OperationKind::Native);
    }

    #[tokio::test]
    async fn binds_named_and_positional_payloads() {
        let op = echo();
        assert_eq!(
            op.invoke(json!({"second": 2, "first": "a"})).await.unwrap(),
            json!(["a", 2])
        );
        assert_eq!(op.invoke(json!(["a"])).await.unwrap(), json!(["a", null]));
    }

    #[tokio::test]
    async fn missing_required_parameter_is_reported() {
        let err = echo().invoke(json!({"second": 1})).await.unwrap_err();
        assert!(matches!(
            err,
            OperationError::MissingRequiredParameter { parameter, .. } if parameter == "first"
        ));
    }

    #[test]
    fn surplus_positional_arguments_are_rejected() {
        let err = echo().bind(json!(["a", 1, true])).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { .. }));
    }

    #[test]
    fn scalar_payload_is_rejected() {
        let err = echo().bind(json!("a")).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { .. }));
    }

    #[test]
    fn string_accessor_rejects_other_types() {
        let args = echo().bind(json!([1])).unwrap();
        assert!(matches!(
            args.string(0),
            Err(OperationError::InvalidParameter { parameter, .. }) if parameter == "first"
        ));
    }

    #[tokio::test]
    async fn logic_context_coerces_and_skips_absent_values() {
        let engine = Arc::new(LogicEngine::new());
        let op = OperationDescriptor::builder("ctx")
            .param(ParameterSpec::string("text"))
            .param(ParameterSpec::new("count", ParamType::Number))
            .param(ParameterSpec::new("flag", ParamType::Boolean))
            .logic(json!({"var": ""}), engine);
        assert_eq!(op.kind(), OperationKind::Logic);

        let ctx = op.invoke(json!({"text": 12, "flag": "true"})).await.unwrap();
        assert_eq!(ctx, json!({"text": "12", "flag": false}));

        let ctx = op.invoke(json!(["x", "2.5", true])).await.unwrap();
        assert_eq!(ctx, json!({"text": "x", "count": 2.5, "flag": true}));
    }

    #[tokio::test]
    async fn logic_number_parameter_rejects_non_numeric() {
        let op = OperationDescriptor::builder("n")
            .param(ParameterSpec::new("count", ParamType::Number))
            .logic(json!({"var": "count"}), Arc::new(LogicEngine::new()));
        let err = op.invoke(json!({"count": "abc"})).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[test]
    fn param_type_accepts_upper_case_tokens() {
        let parsed: Vec<ParamType> = serde_json::from_value(json!(["NUMBER", "boolean", "String"])).unwrap();
        assert_eq!(parsed, vec![ParamType::Number, ParamType::Boolean, ParamType::String]);
    }
}
