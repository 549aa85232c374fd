//! `sequence` operator: ordered pipeline of expressions sharing a growing context.
//!
//! ```json
//! {"sequence": {"operations": [
//!     {"resultName": "greeting", "logic": {"cat": ["Hello ", {"var": "name"}]}},
//!     {"resultName": "encoded", "logic": {"jsonrpc": {"method": "base64-encode",
//!         "params": {"value": {"$jsonLogic": {"var": "greeting"}}}}}}
//! ]}}
//! ```

use async_trait::async_trait;
use serde_json::Value;

use super::engine::{LogicEngine, RawOperator};
use super::error::{LogicError, LogicResult};
use crate::context::merge_result;

pub const SEQUENCE_OPERATOR: &str = "sequence";

/// Runs each step against the context grown by the previous steps and
/// returns the raw output of the last one. Steps never run concurrently.
pub struct SequenceOperator;

#[async_trait]
impl RawOperator for SequenceOperator {
    async fn apply(&self, engine: &LogicEngine, args: &Value, data: &Value) -> LogicResult {
        let operations = args
            .get("operations")
            .ok_or_else(|| malformed("missing `operations`"))?
            .as_array()
            .ok_or_else(|| malformed("`operations` must be an array"))?;

        let mut context = data.clone();
        let mut output = data.clone();
        for (index, step) in operations.iter().enumerate() {
            let result_name = step
                .get("resultName")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(&format!("step {index} has no string `resultName`")))?;
            let logic = step
                .get("logic")
                .or_else(|| step.get("jsonLogic"))
                .ok_or_else(|| malformed(&format!("step {index} has no `logic`")))?;

            output = engine.apply(logic, &context).await?;
            context = merge_result(context, result_name, output.clone());
        }
        Ok(output)
    }
}

fn malformed(reason: &str) -> LogicError {
    LogicError::malformed(SEQUENCE_OPERATOR, reason)
}
