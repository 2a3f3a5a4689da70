//! The invariant registry.
//!
//! An id -> invariant mapping loaded once at construction. Loading
//! validates the set: duplicate ids, operand arity, and cycles in the
//! `requires` graph are all schema errors. A `requires` edge whose target
//! is not registered is *not* a load error -- it surfaces at evaluation
//! time as a dependency failure.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::error::SchemaError;
use crate::invariant::Invariant;

/// Read-mostly registry of invariants, keyed by id.
#[derive(Debug)]
pub struct InvariantRegistry {
    inner: RwLock<HashMap<String, Invariant>>,
}

impl InvariantRegistry {
    /// Validate and load an invariant set.
    pub fn load(invariants: Vec<Invariant>) -> Result<Self, SchemaError> {
        let mut by_id: HashMap<String, Invariant> = HashMap::with_capacity(invariants.len());
        for inv in invariants {
            validate_predicate(&inv)?;
            let id = inv.id.clone();
            if by_id.insert(id.clone(), inv).is_some() {
                return Err(SchemaError::DuplicateId { id });
            }
        }
        reject_cycles(&by_id)?;
        Ok(InvariantRegistry {
            inner: RwLock::new(by_id),
        })
    }

    /// All registered invariants, sorted by id for deterministic iteration.
    pub fn all(&self) -> Vec<Invariant> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut invariants: Vec<Invariant> = inner.values().cloned().collect();
        invariants.sort_by(|a, b| a.id.cmp(&b.id));
        invariants
    }

    pub fn get(&self, id: &str) -> Option<Invariant> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_predicate(inv: &Invariant) -> Result<(), SchemaError> {
    let Some(pred) = &inv.predicate else {
        return Ok(());
    };
    if pred.operator.requires_operand() && pred.value.is_none() {
        return Err(SchemaError::MissingOperand {
            invariant_id: inv.id.clone(),
            operator: pred.operator,
        });
    }
    if !pred.operator.requires_operand() && pred.value.is_some() {
        return Err(SchemaError::UnexpectedOperand {
            invariant_id: inv.id.clone(),
            operator: pred.operator,
        });
    }
    Ok(())
}

/// Depth-first cycle check over `requires` edges whose target is
/// registered. Ids are visited in sorted order so a given invariant set
/// always reports the same cycle.
fn reject_cycles(by_id: &HashMap<String, Invariant>) -> Result<(), SchemaError> {
    let mut done: HashSet<&str> = HashSet::new();
    let mut ids: Vec<&str> = by_id.keys().map(String::as_str).collect();
    ids.sort_unstable();

    for id in ids {
        if !done.contains(id) {
            let mut path = Vec::new();
            visit(id, by_id, &mut path, &mut done)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    by_id: &'a HashMap<String, Invariant>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), SchemaError> {
    if let Some(pos) = path.iter().position(|p| *p == id) {
        let mut chain: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
        chain.push(id.to_string());
        return Err(SchemaError::DependencyCycle { chain });
    }
    if done.contains(id) {
        return Ok(());
    }
    path.push(id);
    if let Some(inv) = by_id.get(id) {
        for req in &inv.requires {
            if let Some((target, _)) = by_id.get_key_value(req.invariant.as_str()) {
                visit(target.as_str(), by_id, path, done)?;
            }
        }
    }
    path.pop();
    done.insert(id);
    Ok(())
}
