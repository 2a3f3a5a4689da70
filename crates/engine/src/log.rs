//! The bounded evaluation audit log.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ring capacity. Oldest entries are evicted first.
pub(crate) const EVALUATION_LOG_CAPACITY: usize = 1000;

/// One single-subject evaluation, satisfied or not.
#[derive(Debug, Clone)]
pub struct EvaluationLogEntry {
    pub invariant_id: String,
    pub subject_uid: String,
    pub satisfied: bool,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

/// Aggregates over the current log contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationStats {
    pub total_evaluations: usize,
    pub violations_found: usize,
    pub avg_duration_ms: u64,
    pub total_invariants: usize,
}

/// Fixed-capacity ring of evaluation entries. Appends take an exclusive
/// lock; the buffer is allocated once at capacity so the hot path never
/// reallocates.
#[derive(Debug)]
pub(crate) struct EvaluationLog {
    entries: Mutex<VecDeque<EvaluationLogEntry>>,
}

impl EvaluationLog {
    pub(crate) fn new() -> Self {
        EvaluationLog {
            entries: Mutex::new(VecDeque::with_capacity(EVALUATION_LOG_CAPACITY)),
        }
    }

    pub(crate) fn append(&self, entry: EvaluationLogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == EVALUATION_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub(crate) fn snapshot(&self) -> Vec<EvaluationLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }
}
