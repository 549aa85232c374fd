//! Logic expression engine.
//!
//! Expressions are JSON trees where a single-key object names an operator.
//! The engine ships a baseline operator library and two composition
//! operators: [`invoke`] (call a registered operation) and [`sequence`]
//! (ordered pipeline over a growing context).

pub mod engine;
pub mod error;
pub mod invoke;
mod operators;
pub mod sequence;

pub use engine::{BoxedEval, EagerOperator, LogicEngine, Operator, RawOperator};
pub use error::{LogicError, LogicResult};
pub use invoke::{
    evaluate_parameter, InvokeOperator, EXPRESSION_MARKER, INVOKE_OPERATOR, LITERAL_MARKER, MAX_INVOKE_DEPTH,
};
pub use sequence::{SequenceOperator, SEQUENCE_OPERATOR};
