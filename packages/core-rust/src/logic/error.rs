use serde_json::Value;

/// Result of evaluating an expression.
pub type LogicResult = Result<Value, LogicError>;

/// Failures raised while evaluating a logic expression.
///
/// Evaluation never recovers partially: the first error aborts the whole
/// expression and is returned to the outermost caller.
#[derive(Debug, thiserror::Error)]
pub enum LogicError {
    #[error("unknown operator: {name}")]
    UnknownOperator { name: String },
    #[error("malformed expression for `{operator}`: {reason}")]
    MalformedExpression { operator: String, reason: String },
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("operation `{method}` failed: {source}")]
    Invocation {
        method: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("operation calls nested deeper than {depth} levels")]
    RecursionLimit { depth: usize },
    #[error("operation registry is no longer available")]
    ResolverUnavailable,
}

impl LogicError {
    pub(crate) fn malformed(operator: &str, reason: impl Into<String>) -> Self {
        Self::MalformedExpression {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}
