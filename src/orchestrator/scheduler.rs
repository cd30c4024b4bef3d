//! Pure DAG-scheduling helpers used by `Orchestrator::execute_workflow`:
//! which steps are eligible to dispatch right now, and which pending steps
//! are blocked by a terminally-failed dependency. Kept free of async and
//! orchestrator state so they can be unit-tested directly.

use crate::model::{TaskOutcome, TaskStatus, WorkflowDefinition};
use std::collections::{HashMap, HashSet};

/// Every step id that appears in some other step's failure-handler list.
/// Such steps are dispatched only when that predecessor fails, never
/// through ordinary dependency satisfaction.
pub fn handler_step_ids(def: &WorkflowDefinition) -> HashSet<String> {
    def.steps
        .iter()
        .flat_map(|s| s.failure_handlers.iter().cloned())
        .collect()
}

/// Pending, non-handler-only steps whose dependencies are all satisfied
/// with a success result, in definition order (the tie-break: the earliest
/// step in the workflow definition wins).
pub fn eligible_steps(
    def: &WorkflowDefinition,
    pending: &HashSet<String>,
    results: &HashMap<String, TaskOutcome>,
    handler_ids: &HashSet<String>,
) -> Vec<String> {
    def.steps
        .iter()
        .filter(|s| pending.contains(&s.id) && !handler_ids.contains(&s.id))
        .filter(|s| {
            s.dependencies.iter().all(|dep| {
                results
                    .get(dep)
                    .map(|r| r.status == TaskStatus::Success)
                    .unwrap_or(false)
            })
        })
        .map(|s| s.id.clone())
        .collect()
}

/// `(step_id, failed_dependency_id)` pairs: a pending, non-handler step
/// blocked by a dependency that finished non-successfully.
pub fn blocked_by_failed_dependency(
    def: &WorkflowDefinition,
    pending: &HashSet<String>,
    results: &HashMap<String, TaskOutcome>,
    handler_ids: &HashSet<String>,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for step in &def.steps {
        if !pending.contains(&step.id) || handler_ids.contains(&step.id) {
            continue;
        }
        for dep in &step.dependencies {
            if let Some(outcome) = results.get(dep) {
                if outcome.status != TaskStatus::Success {
                    out.push((step.id.clone(), dep.clone()));
                    break;
                }
            }
        }
    }
    out
}
