//! The evaluation engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use akari_core::{
    catalog, EvaluationContext, Invariant, InvariantRegistry, Relation, Requirement, SchemaError,
    Severity,
};
use akari_storage::StateStore;

use crate::authority::AuthorityMap;
use crate::log::{EvaluationLog, EvaluationLogEntry, EvaluationStats};
use crate::predicate;

/// The outcome of evaluating one invariant against one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationResult {
    pub invariant_id: String,
    pub violated: bool,
    /// Human-readable cause. Stable templates; callers match substrings.
    pub reason: String,
    pub responsible_actor: String,
    /// Actors provably not at fault: they lack authority over the
    /// offending field. Ordered by the authority map's actor order.
    pub eliminated_actors: Vec<String>,
    /// `"{namespace}/{name}"` of the subject.
    pub affected_resource: String,
    pub detected_at: DateTime<Utc>,
    pub severity: Severity,
}

/// Cooperative cancellation handle for bulk evaluation. Checked between
/// invariants and between subjects, never mid-predicate.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// What a failing dependency propagates to its parent.
struct DependencyFailure {
    reason: String,
    responsible_actor: String,
    eliminated_actors: Vec<String>,
}

/// The invariant evaluation engine.
///
/// Holds no per-call mutable state beyond the bounded evaluation log, so
/// concurrent callers of the `evaluate_*` family are safe. Two overlapping
/// bulk evaluations may observe different snapshots per subject; each
/// result is individually valid for the snapshot it saw.
pub struct Engine {
    registry: InvariantRegistry,
    store: Arc<dyn StateStore>,
    authority: AuthorityMap,
    log: EvaluationLog,
}

impl Engine {
    /// Build an engine over a store, an authority map, and an invariant
    /// set. The set is validated on load; a bad set never constructs an
    /// engine.
    pub fn new(
        store: Arc<dyn StateStore>,
        authority: AuthorityMap,
        invariants: Vec<Invariant>,
    ) -> Result<Self, SchemaError> {
        let registry = InvariantRegistry::load(invariants)?;
        info!(invariants = registry.len(), "loaded invariant registry");
        Ok(Engine {
            registry,
            store,
            authority,
            log: EvaluationLog::new(),
        })
    }

    /// An engine over the built-in catalog and default authority map.
    pub fn with_builtin_invariants(store: Arc<dyn StateStore>) -> Self {
        Engine::new(store, AuthorityMap::new(), catalog::builtin_invariants())
            .expect("built-in invariant catalog must load")
    }

    pub fn invariants(&self) -> Vec<Invariant> {
        self.registry.all()
    }

    pub fn invariant(&self, id: &str) -> Option<Invariant> {
        self.registry.get(id)
    }

    pub fn authority(&self) -> &AuthorityMap {
        &self.authority
    }

    /// Evaluate every registered invariant against every subject of its
    /// kind. One result per (invariant, subject) pair, satisfied results
    /// included with `violated = false`. Never fails.
    pub fn evaluate_all(&self) -> Vec<ViolationResult> {
        self.evaluate_all_with_cancel(&CancelToken::default())
    }

    /// As [`Engine::evaluate_all`], abandoning remaining work once the
    /// token is cancelled.
    pub fn evaluate_all_with_cancel(&self, cancel: &CancelToken) -> Vec<ViolationResult> {
        let mut results = Vec::new();
        for inv in self.registry.all() {
            if cancel.is_cancelled() {
                debug!(completed = results.len(), "bulk evaluation cancelled");
                break;
            }
            results.extend(self.evaluate_with_cancel(&inv, cancel));
        }
        debug!(
            results = results.len(),
            violated = results.iter().filter(|r| r.violated).count(),
            "evaluated all invariants"
        );
        results
    }

    /// Evaluate one invariant against every subject of its kind.
    pub fn evaluate(&self, inv: &Invariant) -> Vec<ViolationResult> {
        self.evaluate_with_cancel(inv, &CancelToken::default())
    }

    fn evaluate_with_cancel(&self, inv: &Invariant, cancel: &CancelToken) -> Vec<ViolationResult> {
        let mut results = Vec::new();
        for subject in self.store.get_latest_by_kind(&inv.subject.kind) {
            if cancel.is_cancelled() {
                break;
            }
            let ctx = EvaluationContext::new(subject);
            let result = self
                .evaluate_with_context(inv, &ctx)
                .unwrap_or_else(|| satisfied_result(inv, &ctx));
            results.push(result);
        }
        results
    }

    /// Evaluate every invariant whose subject kind matches the context's
    /// resource, against that resource alone. One result per invariant.
    pub fn evaluate_resource(&self, ctx: &EvaluationContext) -> Vec<ViolationResult> {
        self.registry
            .all()
            .into_iter()
            .filter(|inv| inv.subject.kind == ctx.resource.kind)
            .map(|inv| {
                self.evaluate_with_context(&inv, ctx)
                    .unwrap_or_else(|| satisfied_result(&inv, ctx))
            })
            .collect()
    }

    /// Evaluate one (invariant, subject) pair. Returns a result iff the
    /// invariant is violated; `None` means satisfied.
    pub fn evaluate_with_context(
        &self,
        inv: &Invariant,
        ctx: &EvaluationContext,
    ) -> Option<ViolationResult> {
        let mut memo = HashMap::new();
        self.evaluate_subject(inv, ctx, &mut memo)
    }

    /// Recent audit entries, oldest first. At most the ring capacity.
    pub fn recent_evaluations(&self) -> Vec<EvaluationLogEntry> {
        self.log.snapshot()
    }

    /// Aggregates over the evaluation log.
    pub fn stats(&self) -> EvaluationStats {
        let entries = self.log.snapshot();
        let total = entries.len();
        let violations = entries.iter().filter(|e| !e.satisfied).count();
        let avg_duration_ms = if total > 0 {
            let sum: std::time::Duration = entries.iter().map(|e| e.duration).sum();
            (sum / total as u32).as_millis() as u64
        } else {
            0
        };
        EvaluationStats {
            total_evaluations: total,
            violations_found: violations,
            avg_duration_ms,
            total_invariants: self.registry.len(),
        }
    }

    /// Single-subject evaluation with per-call memoisation keyed on
    /// `(invariant id, subject uid)` -- shared dependencies are evaluated
    /// once per top-level call.
    fn evaluate_subject(
        &self,
        inv: &Invariant,
        ctx: &EvaluationContext,
        memo: &mut HashMap<(String, String), Option<ViolationResult>>,
    ) -> Option<ViolationResult> {
        let key = (inv.id.clone(), ctx.resource.uid.clone());
        if let Some(cached) = memo.get(&key) {
            return cached.clone();
        }

        let started = Instant::now();

        // A failing predicate masks dependency failures.
        if let Some(pred) = &inv.predicate {
            if let Some(reason) = predicate::check(pred, &ctx.resource.field_diff) {
                let responsible_actor = self.determine_responsibility(inv);
                let eliminated_actors = self.eliminate_actors(&pred.field, &responsible_actor);
                let result = ViolationResult {
                    invariant_id: inv.id.clone(),
                    violated: true,
                    reason: reason.clone(),
                    responsible_actor,
                    eliminated_actors,
                    affected_resource: ctx.resource.resource_path(),
                    detected_at: ctx.timestamp,
                    severity: inv.severity,
                };
                self.log_evaluation(inv, ctx, false, reason, started);
                memo.insert(key, Some(result.clone()));
                return Some(result);
            }
        }

        for req in &inv.requires {
            if let Some(failure) = self.evaluate_dependency(req, ctx, memo) {
                let reason = format!("Dependency {} failed: {}", req.invariant, failure.reason);
                let result = ViolationResult {
                    invariant_id: inv.id.clone(),
                    violated: true,
                    reason: reason.clone(),
                    responsible_actor: failure.responsible_actor,
                    eliminated_actors: failure.eliminated_actors,
                    affected_resource: ctx.resource.resource_path(),
                    detected_at: ctx.timestamp,
                    severity: inv.severity,
                };
                self.log_evaluation(inv, ctx, false, reason, started);
                memo.insert(key, Some(result.clone()));
                return Some(result);
            }
        }

        self.log_evaluation(inv, ctx, true, "satisfied".to_string(), started);
        memo.insert(key, None);
        None
    }

    /// Resolve one `requires` edge. `same` recurses on the same subject;
    /// the other relations cannot be resolved by the store contract and
    /// fail deterministically.
    fn evaluate_dependency(
        &self,
        req: &Requirement,
        ctx: &EvaluationContext,
        memo: &mut HashMap<(String, String), Option<ViolationResult>>,
    ) -> Option<DependencyFailure> {
        let Some(target) = self.registry.get(&req.invariant) else {
            return Some(DependencyFailure {
                reason: "Required invariant not registered".to_string(),
                responsible_actor: String::new(),
                eliminated_actors: Vec::new(),
            });
        };

        match req.scope.relation {
            Relation::Same => {
                self.evaluate_subject(&target, ctx, memo)
                    .map(|child| DependencyFailure {
                        reason: child.reason,
                        responsible_actor: child.responsible_actor,
                        eliminated_actors: child.eliminated_actors,
                    })
            }
            Relation::Owner | Relation::Selector | Relation::Node => Some(DependencyFailure {
                reason: "Dependency relation not supported by StateStore".to_string(),
                responsible_actor: String::new(),
                eliminated_actors: Vec::new(),
            }),
        }
    }

    /// Single responsible actor for a predicate violation: the sole
    /// authorised controller if there is exactly one; the invariant's
    /// primary if it is among the authorised set; the primary otherwise.
    fn determine_responsibility(&self, inv: &Invariant) -> String {
        if let Some(pred) = &inv.predicate {
            let authorized = self.authority.authorized_controllers(&pred.field);
            if authorized.len() == 1 {
                return authorized[0].clone();
            }
            if authorized
                .iter()
                .any(|actor| *actor == inv.responsibility.primary)
            {
                return inv.responsibility.primary.clone();
            }
        }
        inv.responsibility.primary.clone()
    }

    /// Actors provably not at fault: everyone who is neither responsible
    /// nor authorised to mutate the offending field. Iteration order
    /// follows the authority map's stable actor order.
    fn eliminate_actors(&self, field: &str, responsible: &str) -> Vec<String> {
        let authorized = self.authority.authorized_controllers(field);
        self.authority
            .all_controllers()
            .into_iter()
            .filter(|actor| actor != responsible && !authorized.contains(actor))
            .collect()
    }

    fn log_evaluation(
        &self,
        inv: &Invariant,
        ctx: &EvaluationContext,
        satisfied: bool,
        reason: String,
        started: Instant,
    ) {
        self.log.append(EvaluationLogEntry {
            invariant_id: inv.id.clone(),
            subject_uid: ctx.resource.uid.clone(),
            satisfied,
            reason,
            timestamp: Utc::now(),
            duration: started.elapsed(),
        });
    }
}

fn satisfied_result(inv: &Invariant, ctx: &EvaluationContext) -> ViolationResult {
    ViolationResult {
        invariant_id: inv.id.clone(),
        violated: false,
        reason: String::new(),
        responsible_actor: String::new(),
        eliminated_actors: Vec::new(),
        affected_resource: ctx.resource.resource_path(),
        detected_at: ctx.timestamp,
        severity: inv.severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akari_core::{
        FieldDiff, Operator, Predicate, Responsibility, Scope, StateEvent, Subject, Value,
    };
    use akari_storage::MemoryStore;

    fn subject(uid: &str, kind: &str, diff: &[(&str, Value)]) -> StateEvent {
        StateEvent {
            uid: uid.to_string(),
            kind: kind.to_string(),
            namespace: "default".to_string(),
            name: uid.to_string(),
            version: String::new(),
            timestamp: Utc::now(),
            field_diff: diff
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            actor: "test".to_string(),
            full_state: None,
        }
    }

    fn invariant(id: &str, kind: &str, predicate: Option<Predicate>) -> Invariant {
        Invariant {
            id: id.to_string(),
            version: 1,
            description: format!("{id} holds"),
            subject: Subject::kind(kind),
            predicate,
            requires: Vec::new(),
            blocks: Vec::new(),
            responsibility: Responsibility::primary("kubelet"),
            severity: Severity::Critical,
        }
    }

    fn requirement(target: &str, relation: Relation) -> Requirement {
        Requirement {
            invariant: target.to_string(),
            scope: Scope { relation },
        }
    }

    fn engine(invariants: Vec<Invariant>) -> Engine {
        Engine::new(Arc::new(MemoryStore::new()), AuthorityMap::new(), invariants).unwrap()
    }

    fn engine_with_store(store: Arc<MemoryStore>, invariants: Vec<Invariant>) -> Engine {
        Engine::new(store, AuthorityMap::new(), invariants).unwrap()
    }

    #[test]
    fn not_exists_satisfied_when_field_absent() {
        let inv = invariant(
            "pod_exists",
            "Pod",
            Some(Predicate {
                field: "metadata.deletionTimestamp".to_string(),
                operator: Operator::NotExists,
                value: None,
            }),
        );
        let eng = engine(vec![inv.clone()]);
        let ctx = EvaluationContext::new(subject("pod-1", "Pod", &[]));
        assert!(eng.evaluate_with_context(&inv, &ctx).is_none());
    }

    #[test]
    fn equals_violation_attributes_responsibility() {
        let inv = invariant(
            "pod_ready",
            "Pod",
            Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some("True".into()),
            }),
        );
        let eng = engine(vec![inv.clone()]);
        let ctx = EvaluationContext::new(subject(
            "pod-1",
            "Pod",
            &[("status.conditions[Ready].status", "False".into())],
        ));

        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
        assert!(violation.violated);
        assert!(violation.reason.contains("status.conditions[Ready].status"));
        assert!(violation.reason.contains("False"));
        assert_eq!(violation.responsible_actor, "kubelet");
        assert_eq!(violation.severity, Severity::Critical);
        assert_eq!(violation.affected_resource, "default/pod-1");
    }

    #[test]
    fn same_relation_dependency_propagates() {
        let containers = invariant(
            "containers_running",
            "Pod",
            Some(Predicate {
                field: "status.containerStatuses[*].state.running".to_string(),
                operator: Operator::AllTrue,
                value: None,
            }),
        );
        let mut pod_ready = invariant(
            "pod_ready",
            "Pod",
            Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some("True".into()),
            }),
        );
        pod_ready.requires = vec![requirement("containers_running", Relation::Same)];

        let eng = engine(vec![containers, pod_ready.clone()]);
        let ctx = EvaluationContext::new(subject(
            "pod-1",
            "Pod",
            &[
                ("status.conditions[Ready].status", "True".into()),
                (
                    "status.containerStatuses[*].state.running",
                    vec![true, false].into(),
                ),
            ],
        ));

        let violation = eng.evaluate_with_context(&pod_ready, &ctx).unwrap();
        assert!(violation
            .reason
            .starts_with("Dependency containers_running failed:"));
        assert_eq!(violation.invariant_id, "pod_ready");
        // Responsibility is inherited from the failing child.
        assert_eq!(violation.responsible_actor, "kubelet");
    }

    #[test]
    fn failing_predicate_masks_dependencies() {
        let ghost = invariant("ghost_dep", "Pod", None);
        let mut inv = invariant(
            "pod_ready",
            "Pod",
            Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some("True".into()),
            }),
        );
        // The dependency would fail too (unsupported relation), but the
        // predicate reason must win.
        inv.requires = vec![requirement("ghost_dep", Relation::Node)];

        let eng = engine(vec![ghost, inv.clone()]);
        let ctx = EvaluationContext::new(subject(
            "pod-1",
            "Pod",
            &[("status.conditions[Ready].status", "False".into())],
        ));
        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
        assert!(!violation.reason.starts_with("Dependency"));
        assert!(violation.reason.contains("expected: True"));
    }

    #[test]
    fn unsupported_relations_fail_deterministically() {
        for relation in [Relation::Owner, Relation::Selector, Relation::Node] {
            let target = invariant("node_ready", "Node", None);
            let mut inv = invariant("pod_ready", "Pod", None);
            inv.requires = vec![requirement("node_ready", relation)];

            let eng = engine(vec![target, inv.clone()]);
            let ctx = EvaluationContext::new(subject("pod-1", "Pod", &[]));
            let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
            assert!(
                violation
                    .reason
                    .contains("Dependency relation not supported by StateStore"),
                "relation {relation:?}: {}",
                violation.reason
            );
        }
    }

    #[test]
    fn missing_dependency_target_is_a_violation() {
        let mut inv = invariant("pod_ready", "Pod", None);
        inv.requires = vec![requirement("not_registered", Relation::Same)];

        let eng = engine(vec![inv.clone()]);
        let ctx = EvaluationContext::new(subject("pod-1", "Pod", &[]));
        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
        assert_eq!(
            violation.reason,
            "Dependency not_registered failed: Required invariant not registered"
        );
    }

    #[test]
    fn elimination_excludes_responsible_and_authorized() {
        let mut authority = AuthorityMap::empty();
        authority.insert("spec.nodeName", &["scheduler"]);
        authority.insert("status.phase", &["kubelet"]);
        authority.insert("spec.replicas", &["deployment-controller"]);
        authority.insert("status.conditions", &["node-controller"]);

        let mut inv = invariant(
            "pod_scheduled",
            "Pod",
            Some(Predicate {
                field: "spec.nodeName".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
        );
        inv.responsibility = Responsibility::primary("scheduler");

        let eng = Engine::new(Arc::new(MemoryStore::new()), authority, vec![inv.clone()]).unwrap();
        let ctx = EvaluationContext::new(subject("pod-1", "Pod", &[]));
        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();

        assert_eq!(violation.responsible_actor, "scheduler");
        assert_eq!(
            violation.eliminated_actors,
            vec!["kubelet", "deployment-controller", "node-controller"]
        );
        assert!(!violation.eliminated_actors.contains(&"scheduler".to_string()));
    }

    #[test]
    fn responsibility_prefers_sole_authorized_controller() {
        let mut authority = AuthorityMap::empty();
        authority.insert("spec.nodeName", &["kube-scheduler"]);

        let inv = invariant(
            "pod_scheduled",
            "Pod",
            Some(Predicate {
                field: "spec.nodeName".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
        );
        // The invariant's primary is kubelet, but spec.nodeName has a
        // single authorised controller, which wins.
        let eng = Engine::new(Arc::new(MemoryStore::new()), authority, vec![inv.clone()]).unwrap();
        let ctx = EvaluationContext::new(subject("pod-1", "Pod", &[]));
        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
        assert_eq!(violation.responsible_actor, "kube-scheduler");
    }

    #[test]
    fn responsibility_falls_back_to_primary_among_many() {
        let mut authority = AuthorityMap::empty();
        authority.insert("status.replicas", &["replicaset-controller", "deployment-controller"]);

        let mut inv = invariant(
            "replicas_reported",
            "Deployment",
            Some(Predicate {
                field: "status.replicas".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
        );
        inv.responsibility = Responsibility::primary("deployment-controller");

        let eng = Engine::new(Arc::new(MemoryStore::new()), authority, vec![inv.clone()]).unwrap();
        let ctx = EvaluationContext::new(subject("deploy-1", "Deployment", &[]));
        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
        assert_eq!(violation.responsible_actor, "deployment-controller");
    }

    #[test]
    fn bulk_evaluation_reports_satisfied_and_violated() {
        let store = Arc::new(MemoryStore::new());
        store
            .record(subject(
                "pod-ok",
                "Pod",
                &[("status.conditions[Ready].status", "True".into())],
            ))
            .unwrap();
        store
            .record(subject(
                "pod-bad",
                "Pod",
                &[("status.conditions[Ready].status", "False".into())],
            ))
            .unwrap();

        let inv = invariant(
            "pod_ready",
            "Pod",
            Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some("True".into()),
            }),
        );
        let eng = engine_with_store(store, vec![inv.clone()]);

        let results = eng.evaluate(&inv);
        assert_eq!(results.len(), 2);
        let violated: Vec<_> = results.iter().filter(|r| r.violated).collect();
        assert_eq!(violated.len(), 1);
        assert_eq!(violated[0].affected_resource, "default/pod-bad");
    }

    #[test]
    fn evaluate_all_is_deterministic() {
        let store = Arc::new(MemoryStore::new());
        store
            .record(subject(
                "pod-1",
                "Pod",
                &[("status.conditions[Ready].status", "False".into())],
            ))
            .unwrap();
        store.record(subject("node-1", "Node", &[])).unwrap();

        let make_engine = || {
            Engine::new(
                store.clone(),
                AuthorityMap::new(),
                akari_core::catalog::builtin_invariants(),
            )
            .unwrap()
        };

        let summarise = |results: Vec<ViolationResult>| {
            let mut rows: Vec<(String, String, bool, String, String, Vec<String>)> = results
                .into_iter()
                .map(|r| {
                    (
                        r.invariant_id,
                        r.affected_resource,
                        r.violated,
                        r.reason,
                        r.responsible_actor,
                        r.eliminated_actors,
                    )
                })
                .collect();
            rows.sort();
            rows
        };

        let first = summarise(make_engine().evaluate_all());
        let second = summarise(make_engine().evaluate_all());
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn elimination_soundness_and_authority() {
        let store = Arc::new(MemoryStore::new());
        store
            .record(subject(
                "pod-1",
                "Pod",
                &[("status.conditions[Ready].status", "False".into())],
            ))
            .unwrap();
        store.record(subject("svc-1", "Service", &[])).unwrap();

        let eng = Engine::new(
            store,
            AuthorityMap::new(),
            akari_core::catalog::builtin_invariants(),
        )
        .unwrap();

        for result in eng.evaluate_all() {
            if !result.violated {
                continue;
            }
            assert!(
                !result
                    .eliminated_actors
                    .contains(&result.responsible_actor),
                "{}: responsible actor eliminated",
                result.invariant_id
            );
            if let Some(pred) = eng
                .invariant(&result.invariant_id)
                .and_then(|inv| inv.predicate)
            {
                if result.reason.starts_with("Dependency") {
                    continue;
                }
                let authorized = eng.authority().authorized_controllers(&pred.field);
                for actor in &result.eliminated_actors {
                    assert!(
                        !authorized.contains(actor),
                        "{}: eliminated actor {} has authority over {}",
                        result.invariant_id,
                        actor,
                        pred.field
                    );
                }
            }
        }
    }

    #[test]
    fn log_is_bounded_with_fifo_eviction() {
        let inv = invariant(
            "pod_ready",
            "Pod",
            Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some("True".into()),
            }),
        );
        let eng = engine(vec![inv.clone()]);

        for n in 0..1100 {
            let ctx = EvaluationContext::new(subject(
                &format!("pod-{n}"),
                "Pod",
                &[("status.conditions[Ready].status", "True".into())],
            ));
            eng.evaluate_with_context(&inv, &ctx);
        }

        let entries = eng.recent_evaluations();
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].subject_uid, "pod-100");
        assert_eq!(eng.stats().total_evaluations, 1000);
    }

    #[test]
    fn stats_counts_violations() {
        let inv = invariant(
            "pod_ready",
            "Pod",
            Some(Predicate {
                field: "status.conditions[Ready].status".to_string(),
                operator: Operator::Equals,
                value: Some("True".into()),
            }),
        );
        let eng = engine(vec![inv.clone()]);

        let ok = EvaluationContext::new(subject(
            "pod-ok",
            "Pod",
            &[("status.conditions[Ready].status", "True".into())],
        ));
        let bad = EvaluationContext::new(subject(
            "pod-bad",
            "Pod",
            &[("status.conditions[Ready].status", "False".into())],
        ));
        eng.evaluate_with_context(&inv, &ok);
        eng.evaluate_with_context(&inv, &bad);

        let stats = eng.stats();
        assert_eq!(stats.total_evaluations, 2);
        assert_eq!(stats.violations_found, 1);
        assert_eq!(stats.total_invariants, 1);
    }

    #[test]
    fn cancellation_stops_between_subjects() {
        let store = Arc::new(MemoryStore::new());
        for n in 0..10 {
            store
                .record(subject(&format!("pod-{n}"), "Pod", &[]))
                .unwrap();
        }
        let inv = invariant(
            "pod_scheduled",
            "Pod",
            Some(Predicate {
                field: "spec.nodeName".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
        );
        let eng = engine_with_store(store, vec![inv]);

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(eng.evaluate_all_with_cancel(&cancel).is_empty());
    }

    #[test]
    fn memoisation_evaluates_shared_dependencies_once() {
        // root requires left and right; both require leaf. Without
        // memoisation leaf is evaluated twice per call.
        let leaf = invariant("leaf", "Pod", None);
        let mut left = invariant("left", "Pod", None);
        left.requires = vec![requirement("leaf", Relation::Same)];
        let mut right = invariant("right", "Pod", None);
        right.requires = vec![requirement("leaf", Relation::Same)];
        let mut root = invariant("root", "Pod", None);
        root.requires = vec![
            requirement("left", Relation::Same),
            requirement("right", Relation::Same),
        ];

        let eng = engine(vec![leaf, left, right, root.clone()]);
        let ctx = EvaluationContext::new(subject("pod-1", "Pod", &[]));
        assert!(eng.evaluate_with_context(&root, &ctx).is_none());

        let leaf_evals = eng
            .recent_evaluations()
            .iter()
            .filter(|e| e.invariant_id == "leaf")
            .count();
        assert_eq!(leaf_evals, 1);
    }

    #[test]
    fn satisfied_subject_produces_no_single_subject_result() {
        let inv = invariant(
            "pod_scheduled",
            "Pod",
            Some(Predicate {
                field: "spec.nodeName".to_string(),
                operator: Operator::Exists,
                value: None,
            }),
        );
        let eng = engine(vec![inv.clone()]);
        let ctx =
            EvaluationContext::new(subject("pod-1", "Pod", &[("spec.nodeName", "node-1".into())]));
        assert!(eng.evaluate_with_context(&inv, &ctx).is_none());
    }

    #[test]
    fn field_diff_type_matches_engine_expectations() {
        // Field paths are opaque keys; a diff containing a wildcard path
        // is matched verbatim, never expanded.
        let inv = invariant(
            "containers_running",
            "Pod",
            Some(Predicate {
                field: "status.containerStatuses[*].state.running".to_string(),
                operator: Operator::AllTrue,
                value: None,
            }),
        );
        let eng = engine(vec![inv.clone()]);

        let mut diff = FieldDiff::new();
        diff.insert(
            "status.containerStatuses[0].state.running".to_string(),
            Value::Bool(true),
        );
        let mut event = subject("pod-1", "Pod", &[]);
        event.field_diff = diff;
        let ctx = EvaluationContext::new(event);

        let violation = eng.evaluate_with_context(&inv, &ctx).unwrap();
        assert!(violation.reason.contains("does not exist"));
    }
}
