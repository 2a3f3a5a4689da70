//! The built-in invariant catalog.
//!
//! The minimum viable set for a Kubernetes-shaped cluster: pod lifecycle,
//! scheduling, node health, container state, and service endpoints.
//! Deployments register additional invariants on top by loading their own
//! set through [`crate::InvariantRegistry::load`].

use crate::invariant::{
    Invariant, Operator, Predicate, Relation, Requirement, Responsibility, Scope, Severity,
    Subject,
};
use crate::value::Value;

/// The built-in invariant set. Guaranteed to load cleanly.
pub fn builtin_invariants() -> Vec<Invariant> {
    vec![
        Invariant {
            id: "pod_exists".to_string(),
            version: 1,
            description: "Pod should not be deleted".to_string(),
            subject: Subject::kind("Pod"),
            predicate: Some(Predicate {
                field: "metadata.deletionTimestamp".to_string(),
                operator: Operator::NotExists,
                value: None,
            }),
            requires: Vec::new(),
            blocks: Vec::new(),
            responsibility: Responsibility {
                primary: "garbage-collector".to_string(),
                secondary: None,
                team: Some("platform".to_string()),
            },
            severity: Severity::Critical,
        },
        Invariant {
            id: "pod_scheduled".to_string(),
            version: 1,
            description: "Pod should be assigned to a node".to_string(),
            subject: Subject::kind("Pod"),
            predicate: Some(Predicate {
                field: "spec.nodeName".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
            requires: Vec::new(),
            blocks: Vec::new(),
            responsibility: Responsibility {
                primary: "kube-scheduler".to_string(),
                secondary: None,
                team: Some("platform".to_string()),
            },
            severity: Severity::Critical,
        },
        Invariant {
            id: "node_ready".to_string(),
            version: 1,
            description: "Node should be in Ready state".to_string(),
            subject: Subject::kind("Node"),
            predicate: Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some(Value::String("True".to_string())),
            }),
            requires: Vec::new(),
            blocks: Vec::new(),
            responsibility: Responsibility {
                primary: "node-controller".to_string(),
                secondary: Some("kubelet".to_string()),
                team: Some("infrastructure".to_string()),
            },
            severity: Severity::Critical,
        },
        Invariant {
            id: "containers_running".to_string(),
            version: 1,
            description: "All containers in pod should be running".to_string(),
            subject: Subject::kind("Pod"),
            predicate: Some(Predicate {
                field: "status.containerStatuses[*].state.running".to_string(),
                operator: Operator::AllTrue,
                value: None,
            }),
            requires: Vec::new(),
            blocks: vec!["pod_ready".to_string()],
            responsibility: Responsibility {
                primary: "kubelet".to_string(),
                secondary: None,
                team: Some("platform-node".to_string()),
            },
            severity: Severity::Critical,
        },
        Invariant {
            id: "pod_ready".to_string(),
            version: 1,
            description: "Pod should be in Ready state".to_string(),
            subject: Subject::kind("Pod"),
            predicate: Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some(Value::String("True".to_string())),
            }),
            // node_ready is scoped to the pod's node; the base store
            // contract cannot resolve that relation, so it evaluates to a
            // deterministic unsupported-relation failure until a richer
            // store implements it.
            requires: vec![
                Requirement {
                    invariant: "containers_running".to_string(),
                    scope: Scope {
                        relation: Relation::Same,
                    },
                },
                Requirement {
                    invariant: "node_ready".to_string(),
                    scope: Scope {
                        relation: Relation::Node,
                    },
                },
            ],
            blocks: vec!["service_has_endpoints".to_string()],
            responsibility: Responsibility {
                primary: "kubelet".to_string(),
                secondary: None,
                team: Some("platform-node".to_string()),
            },
            severity: Severity::Critical,
        },
        Invariant {
            id: "service_has_endpoints".to_string(),
            version: 1,
            description: "Service should have ready endpoints".to_string(),
            subject: Subject::kind("Service"),
            predicate: Some(Predicate {
                field: "endpoints[*].addresses".to_string(),
                operator: Operator::AnyTrue,
                value: None,
            }),
            // pod_ready on the selected pods; unresolvable by the base
            // store contract, surfaced as an unsupported-relation failure.
            requires: vec![Requirement {
                invariant: "pod_ready".to_string(),
                scope: Scope {
                    relation: Relation::Selector,
                },
            }],
            blocks: Vec::new(),
            responsibility: Responsibility {
                primary: "kubelet".to_string(),
                secondary: Some("service-controller".to_string()),
                team: Some("platform".to_string()),
            },
            severity: Severity::Critical,
        },
    ]
}
