//! Conformance checks for `StateStore` implementations.
//!
//! A backend-agnostic suite any implementation can run to verify the
//! storage contract: record/read-back, latest-wins timestamp semantics,
//! tie-breaking by insertion order, one-event-per-uid kind listing, kind
//! isolation, and absence semantics.
//!
//! Backend crates call [`run_conformance_suite`] with a factory that
//! produces a fresh, empty store per check:
//!
//! ```
//! use akari_storage::conformance::run_conformance_suite;
//! use akari_storage::MemoryStore;
//!
//! let report = run_conformance_suite(MemoryStore::new);
//! assert_eq!(report.failed(), 0, "{report}");
//! ```

use std::fmt;

use akari_core::StateEvent;
use chrono::{DateTime, TimeZone, Utc};

use crate::traits::StateStore;

/// Result of a single conformance check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub message: Option<String>,
}

/// Outcome of a full suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<CheckResult>,
}

impl ConformanceReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    pub fn passed(&self) -> usize {
        self.results.len() - self.failed()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "state store conformance: {} passed, {} failed",
            self.passed(),
            self.failed()
        )?;
        for result in &self.results {
            if !result.passed {
                writeln!(
                    f,
                    "  FAIL {}: {}",
                    result.name,
                    result.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

type Check<S> = (&'static str, fn(&S) -> Result<(), String>);

/// Run every conformance check, each against a fresh store from `factory`.
pub fn run_conformance_suite<S, F>(factory: F) -> ConformanceReport
where
    S: StateStore,
    F: Fn() -> S,
{
    let checks: Vec<Check<S>> = vec![
        ("record_then_get_by_uid", record_then_get_by_uid),
        ("absent_uid_is_none", absent_uid_is_none),
        ("unknown_kind_is_empty", unknown_kind_is_empty),
        ("one_event_per_uid_per_kind", one_event_per_uid_per_kind),
        ("kind_isolation", kind_isolation),
        ("latest_wins_greater_timestamp", latest_wins_greater_timestamp),
        ("equal_timestamp_later_insert_wins", equal_timestamp_later_insert_wins),
        ("older_timestamp_does_not_replace", older_timestamp_does_not_replace),
    ];

    let results = checks
        .into_iter()
        .map(|(name, check)| {
            let store = factory();
            match check(&store) {
                Ok(()) => CheckResult {
                    name,
                    passed: true,
                    message: None,
                },
                Err(message) => CheckResult {
                    name,
                    passed: false,
                    message: Some(message),
                },
            }
        })
        .collect();

    ConformanceReport { results }
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn fixture(uid: &str, kind: &str, version: &str, secs: i64) -> StateEvent {
    StateEvent {
        uid: uid.to_string(),
        kind: kind.to_string(),
        namespace: "default".to_string(),
        name: uid.to_string(),
        version: version.to_string(),
        timestamp: ts(secs),
        field_diff: Default::default(),
        actor: "conformance".to_string(),
        full_state: None,
    }
}

fn record<S: StateStore>(store: &S, event: StateEvent) -> Result<(), String> {
    store
        .record(event)
        .map_err(|e| format!("record failed: {e}"))
}

fn record_then_get_by_uid<S: StateStore>(store: &S) -> Result<(), String> {
    record(store, fixture("pod-1", "Pod", "1", 100))?;
    let back = store
        .get_by_uid("pod-1")
        .ok_or("recorded event not found by uid")?;
    if back.kind != "Pod" || back.version != "1" {
        return Err(format!("wrong event returned: {}/{}", back.kind, back.version));
    }
    Ok(())
}

fn absent_uid_is_none<S: StateStore>(store: &S) -> Result<(), String> {
    match store.get_by_uid("no-such-uid") {
        None => Ok(()),
        Some(event) => Err(format!("expected absence, got {}", event.uid)),
    }
}

fn unknown_kind_is_empty<S: StateStore>(store: &S) -> Result<(), String> {
    if store.get_latest_by_kind("Ghost").is_empty() {
        Ok(())
    } else {
        Err("expected empty vec for unknown kind".to_string())
    }
}

fn one_event_per_uid_per_kind<S: StateStore>(store: &S) -> Result<(), String> {
    record(store, fixture("pod-1", "Pod", "1", 100))?;
    record(store, fixture("pod-1", "Pod", "2", 200))?;
    record(store, fixture("pod-2", "Pod", "1", 100))?;

    let pods = store.get_latest_by_kind("Pod");
    if pods.len() != 2 {
        return Err(format!("expected 2 pods, got {}", pods.len()));
    }
    let mut uids: Vec<&str> = pods.iter().map(|e| e.uid.as_str()).collect();
    uids.sort_unstable();
    if uids != ["pod-1", "pod-2"] {
        return Err(format!("unexpected uids: {uids:?}"));
    }
    Ok(())
}

fn kind_isolation<S: StateStore>(store: &S) -> Result<(), String> {
    record(store, fixture("pod-1", "Pod", "1", 100))?;
    record(store, fixture("node-1", "Node", "1", 100))?;

    let nodes = store.get_latest_by_kind("Node");
    if nodes.len() != 1 || nodes[0].uid != "node-1" {
        return Err(format!("Node listing leaked other kinds: {nodes:?}"));
    }
    Ok(())
}

fn latest_wins_greater_timestamp<S: StateStore>(store: &S) -> Result<(), String> {
    record(store, fixture("pod-1", "Pod", "1", 100))?;
    record(store, fixture("pod-1", "Pod", "2", 200))?;

    let latest = store.get_by_uid("pod-1").ok_or("uid missing")?;
    if latest.version != "2" {
        return Err(format!("expected version 2 latest, got {}", latest.version));
    }
    Ok(())
}

fn equal_timestamp_later_insert_wins<S: StateStore>(store: &S) -> Result<(), String> {
    record(store, fixture("pod-1", "Pod", "1", 100))?;
    record(store, fixture("pod-1", "Pod", "2", 100))?;

    let latest = store.get_by_uid("pod-1").ok_or("uid missing")?;
    if latest.version != "2" {
        return Err(format!(
            "timestamp tie should break by insertion order, got version {}",
            latest.version
        ));
    }
    Ok(())
}

fn older_timestamp_does_not_replace<S: StateStore>(store: &S) -> Result<(), String> {
    record(store, fixture("pod-1", "Pod", "2", 200))?;
    record(store, fixture("pod-1", "Pod", "1", 100))?;

    let latest = store.get_by_uid("pod-1").ok_or("uid missing")?;
    if latest.version != "2" {
        return Err(format!(
            "older observation replaced the latest pointer (version {})",
            latest.version
        ));
    }
    Ok(())
}
