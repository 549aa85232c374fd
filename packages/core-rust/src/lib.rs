//! Dev tools core — logic expression engine, evaluation context and the
//! operation resolver contract shared with the server.

pub mod context;
pub mod logic;
pub mod traits;

pub use context::{lookup_path, merge_result, SOURCE_KEY};
pub use logic::{LogicEngine, LogicError, LogicResult, Operator, RawOperator};
pub use traits::OperationResolver;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
