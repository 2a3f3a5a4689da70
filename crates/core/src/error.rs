use crate::invariant::Operator;

/// Errors raised while loading an invariant set into a registry.
///
/// Schema errors are never swallowed: a bad invariant set fails at
/// construction time, before anything is evaluated.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two invariants share an id.
    #[error("duplicate invariant id: {id}")]
    DuplicateId { id: String },

    /// The operator compares against a value, but none was given.
    #[error("invariant {invariant_id}: operator {operator} requires a comparison value")]
    MissingOperand {
        invariant_id: String,
        operator: Operator,
    },

    /// The operator takes no operand, but one was given.
    #[error("invariant {invariant_id}: operator {operator} does not take a comparison value")]
    UnexpectedOperand {
        invariant_id: String,
        operator: Operator,
    },

    /// The `requires` graph contains a cycle.
    #[error("dependency cycle through invariants: {}", .chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },
}
