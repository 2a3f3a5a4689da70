//! The declarative invariant schema.
//!
//! An invariant names the resources it applies to (subject), an optional
//! predicate over a single field path, dependency edges to other invariants,
//! and the actor metadata used for responsibility attribution. Operators,
//! relations, and severities are closed sets: an unknown token is a
//! deserialization error, not a runtime branch.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Predicate operators over `value_at(field)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Exists,
    NotExists,
    Gt,
    Lt,
    Contains,
    AnyTrue,
    AllTrue,
}

impl Operator {
    /// Whether the operator takes a comparison operand.
    pub fn requires_operand(&self) -> bool {
        matches!(
            self,
            Operator::Equals | Operator::NotEquals | Operator::Gt | Operator::Lt | Operator::Contains
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Contains => "contains",
            Operator::AnyTrue => "any_true",
            Operator::AllTrue => "all_true",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a `requires` edge scopes the dependent invariant's subject.
///
/// Only `same` is resolvable by the base store contract; `owner`,
/// `selector`, and `node` are declared so a richer store can implement
/// them, and evaluate to a deterministic "unsupported" violation until one
/// does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Same,
    Owner,
    Selector,
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Degraded,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Degraded => "degraded",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single boolean check over one field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub relation: Relation,
}

/// A dependency edge: this invariant requires another to hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Target invariant id.
    pub invariant: String,
    pub scope: Scope,
}

/// The resources an invariant applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Label-equality selector. Omitted means all resources of the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,
}

impl Subject {
    pub fn kind(kind: &str) -> Self {
        Subject {
            kind: kind.to_string(),
            namespace: None,
            selector: None,
        }
    }
}

/// Actor identifiers associated with an invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responsibility {
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl Responsibility {
    pub fn primary(actor: &str) -> Self {
        Responsibility {
            primary: actor.to_string(),
            secondary: None,
            team: None,
        }
    }
}

/// A declarative rule over cluster state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invariant {
    pub id: String,
    /// Schema version of this invariant, for cache invalidation.
    pub version: u32,
    pub description: String,
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    /// Ordered dependency edges, evaluated after the predicate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Requirement>,
    /// Invariants whose failure is expected when this one fails.
    /// Documentary only; used by explanation, never by evaluation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<String>,
    pub responsibility: Responsibility,
    pub severity: Severity,
}
