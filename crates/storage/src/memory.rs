//! In-memory state store.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use akari_core::StateEvent;

use crate::error::StorageError;
use crate::traits::StateStore;

/// In-memory `StateStore`: append-only event history plus a latest-by-uid
/// pointer and a per-kind uid index, all behind one lock. `record` takes
/// the lock exclusively; reads take it shared.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Append-only history, insertion order.
    events: Vec<StateEvent>,
    latest_by_uid: HashMap<String, StateEvent>,
    /// Uids in first-recorded order, per kind.
    uids_by_kind: HashMap<String, Vec<String>>,
    /// `(uid, version)` pairs already recorded; empty versions are
    /// untracked revisions and skip the uniqueness check.
    seen_versions: HashSet<(String, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Every recorded event for a uid, oldest first.
    pub fn history(&self, uid: &str) -> Vec<StateEvent> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .events
            .iter()
            .filter(|event| event.uid == uid)
            .cloned()
            .collect()
    }

    /// Number of events recorded, across all uids.
    pub fn event_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.events.len()
    }
}

impl StateStore for MemoryStore {
    fn record(&self, event: StateEvent) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if !event.version.is_empty() {
            let key = (event.uid.clone(), event.version.clone());
            if !inner.seen_versions.insert(key) {
                return Err(StorageError::DuplicateVersion {
                    uid: event.uid,
                    version: event.version,
                });
            }
        }

        inner.events.push(event.clone());

        let current = inner.latest_by_uid.get(&event.uid);
        let first_seen = current.is_none();
        // Out-of-order observations stay in history without moving the
        // latest pointer; equal timestamps break the tie by insertion
        // order, so the newer insert wins.
        let becomes_latest = current
            .map(|latest| event.timestamp >= latest.timestamp)
            .unwrap_or(true);

        if first_seen {
            inner
                .uids_by_kind
                .entry(event.kind.clone())
                .or_default()
                .push(event.uid.clone());
        }
        if becomes_latest {
            inner.latest_by_uid.insert(event.uid.clone(), event);
        }
        Ok(())
    }

    fn get_latest_by_kind(&self, kind: &str) -> Vec<StateEvent> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let Some(uids) = inner.uids_by_kind.get(kind) else {
            return Vec::new();
        };
        uids.iter()
            .filter_map(|uid| inner.latest_by_uid.get(uid).cloned())
            .collect()
    }

    fn get_by_uid(&self, uid: &str) -> Option<StateEvent> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.latest_by_uid.get(uid).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;
    use chrono::{TimeZone, Utc};

    fn event(uid: &str, kind: &str, version: &str, secs: i64) -> StateEvent {
        StateEvent {
            uid: uid.to_string(),
            kind: kind.to_string(),
            namespace: "default".to_string(),
            name: uid.to_string(),
            version: version.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            field_diff: Default::default(),
            actor: "test".to_string(),
            full_state: None,
        }
    }

    #[test]
    fn conformance() {
        let report = run_conformance_suite(MemoryStore::new);
        assert_eq!(report.failed(), 0, "{report}");
    }

    #[test]
    fn duplicate_version_rejected() {
        let store = MemoryStore::new();
        store.record(event("pod-1", "Pod", "7", 100)).unwrap();
        let err = store.record(event("pod-1", "Pod", "7", 101)).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateVersion { .. }));
        // Same version on a different uid is fine.
        store.record(event("pod-2", "Pod", "7", 100)).unwrap();
    }

    #[test]
    fn empty_versions_are_untracked() {
        let store = MemoryStore::new();
        store.record(event("pod-1", "Pod", "", 100)).unwrap();
        store.record(event("pod-1", "Pod", "", 101)).unwrap();
        assert_eq!(store.history("pod-1").len(), 2);
    }

    #[test]
    fn history_is_append_only_and_ordered() {
        let store = MemoryStore::new();
        store.record(event("pod-1", "Pod", "1", 100)).unwrap();
        store.record(event("pod-1", "Pod", "2", 200)).unwrap();
        store.record(event("pod-1", "Pod", "3", 150)).unwrap();

        let history = store.history("pod-1");
        let versions: Vec<&str> = history.iter().map(|e| e.version.as_str()).collect();
        assert_eq!(versions, vec!["1", "2", "3"]);
        // Latest pointer ignores the out-of-order revision.
        assert_eq!(store.get_by_uid("pod-1").unwrap().version, "2");
        assert_eq!(store.event_count(), 3);
    }
}
