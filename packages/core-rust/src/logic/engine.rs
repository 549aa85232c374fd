//! Tree evaluator with a string-keyed operator table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use super::error::{LogicError, LogicResult};
use super::invoke::{InvokeOperator, INVOKE_OPERATOR};
use super::operators;
use super::sequence::{SequenceOperator, SEQUENCE_OPERATOR};
use crate::traits::OperationResolver;

/// Boxed evaluation future; boxing lets evaluation recurse through operators.
pub type BoxedEval<'a> = Pin<Box<dyn Future<Output = LogicResult> + Send + 'a>>;

/// Operator over already-evaluated arguments. Receives the current data as well
/// so lookups such as `var` can read from it.
pub type EagerOperator = fn(&[Value], &Value) -> LogicResult;

// ---------------------------------------------------------------------------
// RawOperator trait
// ---------------------------------------------------------------------------

/// Operator that receives its arguments unevaluated.
///
/// Used for short-circuiting operators (`if`, `and`, `or`), iteration
/// (`map`, `filter`) and the composition operators, which decide themselves
/// which sub-expressions to evaluate and against which data.
#[async_trait]
pub trait RawOperator: Send + Sync {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult;
}

/// Entry of the engine's operator table.
#[derive(Clone)]
pub enum Operator {
    Eager(EagerOperator),
    Raw(Arc<dyn RawOperator>),
}

// ---------------------------------------------------------------------------
// LogicEngine
// ---------------------------------------------------------------------------

/// Evaluates logic expressions against a JSON context.
///
/// A single-key object `{"<op>": <args>}` is an operator call, an array is
/// evaluated element-wise and every other value is a literal. The operator
/// table is fixed once the engine is built and shared read-only afterwards.
pub struct LogicEngine {
    operators: HashMap<String, Operator>,
}

impl LogicEngine {
    /// Creates an engine with the baseline operators (`var`, `cat`, arithmetic,
    /// comparison, `if`, `and`, `or`, `map`, ...).
    #[must_use]
    pub fn new() -> Self {
        Self {
            operators: operators::baseline(),
        }
    }

    /// Creates an engine with the baseline operators plus `jsonrpc` (invoke a
    /// registered operation) and `sequence` (ordered pipeline of expressions).
    ///
    /// The resolver is held weakly so operations whose handlers own this
    /// engine do not keep their registry alive.
    #[must_use]
    pub fn with_resolver(resolver: Weak<dyn OperationResolver>) -> Self {
        Self::new()
            .with_operator(
                INVOKE_OPERATOR,
                Operator::Raw(Arc::new(InvokeOperator::new(resolver))),
            )
            .with_operator(SEQUENCE_OPERATOR, Operator::Raw(Arc::new(SequenceOperator)))
    }

    /// Adds or replaces an operator. Only available while building the engine.
    #[must_use]
    pub fn with_operator(mut self, name: impl Into<String>, operator: Operator) -> Self {
        self.operators.insert(name.into(), operator);
        self
    }

    #[must_use]
    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Evaluates `expression` against `data`.
    pub fn apply<'a>(&'a self, expression: &'a Value, data: &'a Value) -> BoxedEval<'a> {
        Box::pin(async move {
            match expression {
                Value::Object(fields) if fields.len() == 1 => {
                    let Some((name, args)) = fields.iter().next() else {
                        return Ok(expression.clone());
                    };
                    self.apply_operator(name, args, data).await
                }
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.apply(item, data).await?);
                    }
                    Ok(Value::Array(out))
                }
                other => Ok(other.clone()),
            }
        })
    }

    /// Evaluates operator arguments: an array yields one value per element,
    /// anything else is a single argument.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an argument expression.
    pub async fn evaluate_args(&self, args: &Value, data: &Value) -> Result<Vec<Value>, LogicError> {
        match args {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.apply(item, data).await?);
                }
                Ok(out)
            }
            single => Ok(vec![self.apply(single, data).await?]),
        }
    }

    async fn apply_operator(&self, name: &str, args: &Value, data: &Value) -> LogicResult {
        let Some(operator) = self.operators.get(name) else {
            return Err(LogicError::UnknownOperator {
                name: name.to_string(),
            });
        };
        match operator {
            Operator::Eager(apply) => {
                let evaluated = self.evaluate_args(args, data).await?;
                apply(&evaluated, data)
            }
            Operator::Raw(raw) => raw.apply(self, args, data).await,
        }
    }
}

impl Default for LogicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogicEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("LogicEngine").field("operators", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
