//! Human-readable explanations and summaries of violation results.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use akari_core::Severity;

use crate::engine::ViolationResult;

const RULE: &str = "────────────────────────";

/// Aggregate view over a batch of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub violated: usize,
    pub satisfied: usize,
    pub critical: usize,
    /// Violation counts per responsible actor.
    pub responsible: BTreeMap<String, usize>,
}

/// Summarise a batch of results (satisfied and violated).
pub fn summarize(results: &[ViolationResult]) -> Summary {
    let mut summary = Summary {
        total: results.len(),
        violated: 0,
        satisfied: 0,
        critical: 0,
        responsible: BTreeMap::new(),
    };

    for result in results {
        if result.violated {
            summary.violated += 1;
            if result.severity == Severity::Critical {
                summary.critical += 1;
            }
            *summary
                .responsible
                .entry(result.responsible_actor.clone())
                .or_insert(0) += 1;
        } else {
            summary.satisfied += 1;
        }
    }

    summary
}

/// Render the sectioned explanation for one violation.
pub fn format_explanation(violation: &ViolationResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nISSUE");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "{}: {}",
        violation.invariant_id, violation.affected_resource
    );
    let _ = writeln!(out, "Severity: {}\n", violation.severity);

    let _ = writeln!(out, "CAUSE");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{}\n", violation.reason);

    let _ = writeln!(out, "RESPONSIBILITY");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{}\n", violation.responsible_actor);

    if !violation.eliminated_actors.is_empty() {
        let _ = writeln!(out, "ELIMINATED");
        let _ = writeln!(out, "{RULE}");
        for actor in &violation.eliminated_actors {
            let _ = writeln!(out, "✓ {actor}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "NEXT ACTION");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Inspect {} and related components",
        violation.responsible_actor
    );

    out
}

/// Explanations for the violated results in a batch, in batch order.
pub fn format_explanations(results: &[ViolationResult]) -> Vec<String> {
    results
        .iter()
        .filter(|result| result.violated)
        .map(format_explanation)
        .collect()
}
