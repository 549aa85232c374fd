//! `jsonrpc` operator: calls another registered operation from inside an expression.
//!
//! ```json
//! {"jsonrpc": {"method": "base64-encode", "params": {"value": {"$jsonLogic": {"var": "name"}}}}}
//! ```

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::engine::{BoxedEval, LogicEngine, RawOperator};
use super::error::{LogicError, LogicResult};
use crate::traits::OperationResolver;

pub const INVOKE_OPERATOR: &str = "jsonrpc";

/// Sole key of an object that is a nested expression inside `params`.
pub const EXPRESSION_MARKER: &str = "$jsonLogic";

/// Sole key of an object whose value is passed through without evaluation.
pub const LITERAL_MARKER: &str = "$literal";

/// Nested `jsonrpc` calls allowed within one top-level dispatch.
pub const MAX_INVOKE_DEPTH: usize = 32;

tokio::task_local! {
    static INVOKE_DEPTH: usize;
}

/// Resolves the target through the registry, evaluates `params` and dispatches.
pub struct InvokeOperator {
    resolver: Weak<dyn OperationResolver>,
}

impl InvokeOperator {
    #[must_use]
    pub fn new(resolver: Weak<dyn OperationResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl RawOperator for InvokeOperator {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let spec = match args {
            Value::Object(spec) => spec,
            Value::Array(items) => match items.as_slice() {
                [Value::Object(spec)] => spec,
                _ => return Err(malformed("expected a single object argument")),
            },
            _ => return Err(malformed("expected an object with `method` and `params`")),
        };
        let method = spec
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("`method` must be a string"))?;

        let depth = INVOKE_DEPTH.try_with(|depth| *depth).unwrap_or(0);
        if depth >= MAX_INVOKE_DEPTH {
            return Err(LogicError::RecursionLimit { depth });
        }

        let resolver = self
            .resolver
            .upgrade()
            .ok_or(LogicError::ResolverUnavailable)?;
        if !resolver.contains(method) {
            return Err(LogicError::UnknownOperation {
                name: method.to_string(),
            });
        }

        let params = match spec.get("params") {
            Some(params) => evaluate_parameter(engine, params, data).await?,
            None => Value::Object(Map::new()),
        };
        tracing::trace!(method, depth, "invoking operation from expression");
        INVOKE_DEPTH.scope(depth + 1, resolver.invoke(method, params)).await
    }
}

fn malformed(reason: &str) -> LogicError {
    LogicError::malformed(INVOKE_OPERATOR, reason)
}

/// Turns a parameter template into a concrete value.
///
/// Scalars pass through, arrays and objects are rebuilt element-wise. An
/// object whose only key is `$jsonLogic` is replaced by the result of its
/// expression against the current data; an object whose only key is
/// `$literal` is replaced by its value verbatim.
pub fn evaluate_parameter<'a>(
    engine: &'a LogicEngine,
    template: &'a Value,
    data: &'a Value,
) -> BoxedEval<'a> {
    Box::pin(async move {
        match template {
            Value::Object(fields) if fields.len() == 1 && fields.contains_key(EXPRESSION_MARKER) => {
                engine.apply(&fields[EXPRESSION_MARKER], data).await
            }
            Value::Object(fields) if fields.len() == 1 && fields.contains_key(LITERAL_MARKER) => {
                Ok(fields[LITERAL_MARKER].clone())
            }
            Value::Object(fields) => {
                let mut out = Map::with_capacity(fields.len());
                for (key, value) in fields {
                    out.insert(key.clone(), evaluate_parameter(engine, value, data).await?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(evaluate_parameter(engine, item, data).await?);
                }
                Ok(Value::Array(out))
            }
            scalar => Ok(scalar.clone()),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    /// Resolver knowing a single `echo` operation that records its calls.
    #[derive(Default)]
    struct EchoResolver {
        calls: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl OperationResolver for EchoResolver {
        fn contains(&self, method: &str) -> bool {
            method == "echo"
        }

        async fn invoke(&self, method: &str, params: Value) -> LogicResult {
            if !self.contains(method) {
                return Err(LogicError::UnknownOperation {
                    name: method.to_string(),
                });
            }
            self.calls.lock().unwrap().push(params.clone());
            Ok(json!({"echo": params}))
        }
    }

    fn engine_for(resolver: &Arc<EchoResolver>) -> LogicEngine {
        let resolver: Arc<dyn OperationResolver> = resolver.clone();
        LogicEngine::with_resolver(Arc::downgrade(&resolver))
    }

    #[tokio::test]
    async fn invokes_with_evaluated_params() {
        let resolver = Arc::new(EchoResolver::default());
        let engine = engine_for(&resolver);

        let logic = json!({"jsonrpc": {
            "method": "echo",
            "params": {
                "value": {"$jsonLogic": {"cat": ["Hello ", {"var": "name"}]}},
                "fixed": 1,
                "list": [true, {"$jsonLogic": {"var": "name"}}]
            }
        }});
        let out = engine.apply(&logic, &json!({"name": "world"})).await.unwrap();

        let expected = json!({"value": "Hello world", "fixed": 1, "list": [true, "world"]});
        assert_eq!(out, json!({"echo": expected}));
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_params_become_empty_object() {
        let resolver = Arc::new(EchoResolver::default());
        let engine = engine_for(&resolver);
        let out = engine
            .apply(&json!({"jsonrpc": {"method": "echo"}}), &json!({}))
            .await
            .unwrap();
        assert_eq!(out, json!({"echo": {}}));
    }

    #[tokio::test]
    async fn unknown_method_fails_without_dispatch() {
        let resolver = Arc::new(EchoResolver::default());
        let engine = engine_for(&resolver);
        let err = engine
            .apply(
                &json!({"jsonrpc": {"method": "does-not-exist", "params": {}}}),
                &json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LogicError::UnknownOperation { name } if name == "does-not-exist"));
        assert!(resolver.calls.lock().unwrap().is_empty());
    }

    /// Resolver whose only operation invokes itself again.
    struct LoopResolver {
        engine: LogicEngine,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OperationResolver for LoopResolver {
        fn contains(&self, method: &str) -> bool {
            method == "loop"
        }

        async fn invoke(&self, _method: &str, _params: Value) -> LogicResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.engine
                .apply(&json!({"jsonrpc": {"method": "loop"}}), &Value::Null)
                .await
        }
    }

    #[tokio::test]
    async fn self_invocation_stops_at_depth_limit() {
        let resolver = Arc::new_cyclic(|weak: &Weak<LoopResolver>| {
            let weak: Weak<dyn OperationResolver> = weak.clone();
            LoopResolver {
                engine: LogicEngine::with_resolver(weak),
                calls: AtomicUsize::new(0),
            }
        });

        let err = resolver
            .engine
            .apply(&json!({"jsonrpc": {"method": "loop"}}), &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, LogicError::RecursionLimit { depth } if depth == MAX_INVOKE_DEPTH));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), MAX_INVOKE_DEPTH);
    }

    #[tokio::test]
    async fn sibling_invocations_do_not_accumulate_depth() {
        let resolver = Arc::new(EchoResolver::default());
        let engine = engine_for(&resolver);
        let calls: Vec<Value> = (0..MAX_INVOKE_DEPTH + 1)
            .map(|_| json!({"jsonrpc": {"method": "echo"}}))
            .collect();
        let out = engine.apply(&Value::Array(calls), &json!({})).await.unwrap();
        assert_eq!(out.as_array().unwrap().len(), MAX_INVOKE_DEPTH + 1);
    }

    #[tokio::test]
    async fn marker_with_siblings_is_a_literal_object() {
        let engine = LogicEngine::new();
        let template = json!({"$jsonLogic": {"var": "x"}, "other": 1});
        let out = evaluate_parameter(&engine, &template, &json!({"x": 5}))
            .await
            .unwrap();
        assert_eq!(out, template);
    }

    #[tokio::test]
    async fn literal_marker_escapes_expression_marker() {
        let engine = LogicEngine::new();
        let template = json!({"$literal": {"$jsonLogic": {"var": "x"}}});
        let out = evaluate_parameter(&engine, &template, &json!({"x": 5}))
            .await
            .unwrap();
        assert_eq!(out, json!({"$jsonLogic": {"var": "x"}}));
    }

    #[tokio::test]
    async fn dropped_resolver_is_reported() {
        let resolver = Arc::new(EchoResolver::default());
        let engine = engine_for(&resolver);
        drop(resolver);
        let err = engine
            .apply(&json!({"jsonrpc": {"method": "echo"}}), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LogicError::ResolverUnavailable));
    }

    #[tokio::test]
    async fn non_string_method_is_malformed() {
        let resolver = Arc::new(EchoResolver::default());
        let engine = engine_for(&resolver);
        let err = engine
            .apply(&json!({"jsonrpc": {"method": 1}}), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LogicError::MalformedExpression { .. }));
    }
}
