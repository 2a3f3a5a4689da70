//! Akari data model -- values, state events, and the declarative invariant
//! schema.
//!
//! This crate defines what the rest of the system talks about: the dynamic
//! [`Value`] type carried in field diffs, the [`StateEvent`] record an
//! ingester produces for every observed resource revision, the invariant
//! schema ([`Invariant`], [`Predicate`], [`Requirement`], ...), and the
//! [`InvariantRegistry`] that validates a set of invariants at load time.
//!
//! Nothing here evaluates anything. Evaluation semantics live in
//! `akari-engine`; storage lives in `akari-storage`.

pub mod catalog;
mod error;
mod event;
mod invariant;
mod registry;
mod value;

pub use error::SchemaError;
pub use event::{EvaluationContext, FieldDiff, StateEvent};
pub use invariant::{
    Invariant, Operator, Predicate, Relation, Requirement, Responsibility, Scope, Severity,
    Subject,
};
pub use registry::InvariantRegistry;
pub use value::Value;
