//! State events -- one observed revision of a cluster resource.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Mapping from field path to observed value.
///
/// Field paths are dotted strings with bracketed keys
/// (`status.conditions[Ready].status`, `status.containerStatuses[*].state.running`)
/// and are treated as opaque map keys: the engine never parses or traverses
/// them. Ingesters materialise the paths that invariants reference,
/// pre-aggregating `[*]` wildcards into sequences.
pub type FieldDiff = BTreeMap<String, Value>;

/// One observed version of a cluster resource.
///
/// `(uid, version)` is unique within a store. The latest event for a uid is
/// the one with the greatest observed timestamp, ties broken by insertion
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    /// Opaque unique identifier, stable across versions of the resource.
    pub uid: String,
    /// Resource kind, e.g. `Pod`, `Node`, `Service`.
    pub kind: String,
    /// Namespace; empty for cluster-scoped kinds.
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    /// Per-uid revision token. Compared only for equality.
    #[serde(default)]
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub field_diff: FieldDiff,
    /// Controller that produced this revision, e.g. `kubelet/node-1`.
    #[serde(default)]
    pub actor: String,
    /// Opaque full resource, preserved for audit. Never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_state: Option<serde_json::Value>,
}

impl StateEvent {
    /// `"{namespace}/{name}"` -- the resource identifier used in violation
    /// output.
    pub fn resource_path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Context for evaluating one invariant against one subject.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// The subject resource.
    pub resource: StateEvent,
    /// Related resource states, keyed by uid. Reserved for dependency
    /// relations richer than `same`.
    pub related_states: BTreeMap<String, StateEvent>,
    /// Evaluation timestamp, copied into violation results.
    pub timestamp: DateTime<Utc>,
}

impl EvaluationContext {
    pub fn new(resource: StateEvent) -> Self {
        EvaluationContext {
            resource,
            related_states: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }
}
