//! Offline subcommands: evaluate a fixture, explain a resource, list the
//! catalog.

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use akari_core::{EvaluationContext, StateEvent};
use akari_engine::{explain as explanation, Engine};
use akari_storage::{MemoryStore, StateStore};

use crate::OutputFormat;

/// Load a JSON array of state events into a fresh in-memory store.
pub(crate) fn load_store(events_path: &Path) -> Result<Arc<MemoryStore>, Box<dyn Error>> {
    let raw = fs::read_to_string(events_path)?;
    let events: Vec<StateEvent> = serde_json::from_str(&raw)?;
    let store = Arc::new(MemoryStore::new());
    for event in events {
        store.record(event)?;
    }
    Ok(store)
}

pub(crate) fn evaluate(
    events_path: &Path,
    severity: Option<&str>,
    output: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let store = load_store(events_path)?;
    let engine = Engine::with_builtin_invariants(store);

    let mut violations: Vec<_> = engine
        .evaluate_all()
        .into_iter()
        .filter(|result| result.violated)
        .collect();
    if let Some(severity) = severity {
        violations.retain(|result| result.severity.as_str() == severity);
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&violations)?),
        OutputFormat::Text => {
            if violations.is_empty() {
                println!("no violations");
                return Ok(());
            }
            for violation in &violations {
                println!(
                    "{:<24} {:<9} {:<28} {}",
                    violation.invariant_id,
                    violation.severity.as_str(),
                    violation.affected_resource,
                    violation.reason
                );
            }
            println!("\n{} violation(s)", violations.len());
        }
    }
    Ok(())
}

pub(crate) fn explain(
    events_path: &Path,
    kind: &str,
    namespace: &str,
    name: &str,
    output: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let store = load_store(events_path)?;
    let target = store
        .get_latest_by_kind(kind)
        .into_iter()
        .find(|event| event.namespace == namespace && event.name == name)
        .ok_or_else(|| format!("resource {kind} {namespace}/{name} not found in events"))?;

    let engine = Engine::with_builtin_invariants(store);
    let ctx = EvaluationContext::new(target);
    let results = engine.evaluate_resource(&ctx);

    match output {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "resource": {
                    "kind": kind,
                    "namespace": namespace,
                    "name": name,
                    "uid": ctx.resource.uid,
                },
                "violations": results,
                "summary": explanation::summarize(&results),
            });
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            let texts = explanation::format_explanations(&results);
            if texts.is_empty() {
                println!("no violations for {namespace}/{name}");
                return Ok(());
            }
            for text in texts {
                println!("{text}");
            }
        }
    }
    Ok(())
}

pub(crate) fn invariants(output: OutputFormat) -> Result<(), Box<dyn Error>> {
    let engine = Engine::with_builtin_invariants(Arc::new(MemoryStore::new()));
    let invariants = engine.invariants();

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&invariants)?),
        OutputFormat::Text => {
            for inv in &invariants {
                println!(
                    "{:<24} {:<9} {:<10} {}",
                    inv.id,
                    inv.severity.as_str(),
                    inv.subject.kind,
                    inv.description
                );
            }
        }
    }
    Ok(())
}
