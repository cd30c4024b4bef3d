//! DAG validation: non-empty id/name, non-empty steps, unique step ids,
//! dependency referential integrity, acyclicity (Kahn's algorithm), and
//! registered agent types.

use crate::model::WorkflowDefinition;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    fn failed(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn validate(def: &WorkflowDefinition, registered_agent_types: &HashSet<String>) -> ValidationReport {
        let mut errors = Vec::new();

        if def.id.trim().is_empty() {
            errors.push("workflow id must not be empty".to_string());
        }
        if def.name.trim().is_empty() {
            errors.push("workflow name must not be empty".to_string());
        }
        if def.steps.is_empty() {
            errors.push("workflow must declare at least one step".to_string());
        }

        let mut seen_ids = HashSet::new();
        for step in &def.steps {
            if !seen_ids.insert(step.id.clone()) {
                errors.push(format!("duplicate step id: {}", step.id));
            }
        }

        let step_ids: HashSet<&str> = def.steps.iter().map(|s| s.id.as_str()).collect();
        for step in &def.steps {
            for dep in &step.dependencies {
                if !step_ids.contains(dep.as_str()) {
                    errors.push(format!("step '{}' depends on undefined step '{}'", step.id, dep));
                }
            }
            for handler in &step.failure_handlers {
                if !step_ids.contains(handler.as_str()) {
                    errors.push(format!(
                        "step '{}' declares undefined failure handler '{}'",
                        step.id, handler
                    ));
                }
            }
        }

        if errors.is_empty() {
            if let Some(cycle) = find_cycle(def) {
                errors.push(format!("cycle: {}", cycle.join(" <-> ")));
            }
        }

        for step in &def.steps {
            if !registered_agent_types.contains(&step.agent_type) {
                errors.push(format!(
                    "step '{}' declares unregistered agent type '{}'",
                    step.id, step.agent_type
                ));
            }
        }

        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::failed(errors)
        }
    }
}

/// Kahn's algorithm: repeatedly remove nodes with in-degree zero. Any node
/// left over once no more can be removed lies on a cycle.
fn find_cycle(def: &WorkflowDefinition) -> Option<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = def.steps.iter().map(|s| (s.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for step in &def.steps {
        for dep in &step.dependencies {
            *in_degree.get_mut(step.id.as_str()).unwrap() += 1;
            dependents.entry(dep.as_str()).or_default().push(step.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node) = queue.pop_front() {
        visited += 1;
        if let Some(children) = dependents.get(node) {
            for &child in children {
                let deg = in_degree.get_mut(child).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    if visited == def.steps.len() {
        None
    } else {
        let remaining: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, deg)| *deg > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        Some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowStep;

    fn registered(types: &[&str]) -> HashSet<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn accepts_a_well_formed_linear_workflow() {
        let def = WorkflowDefinition::new(
            "wf1",
            "demo",
            vec![
                WorkflowStep::new("find", "sourcing", "candidate_search"),
                WorkflowStep::new("enrich", "enrichment", "enrichment").with_dependencies(vec!["find"]),
            ],
        );
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing", "enrichment"]));
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn rejects_empty_id_and_name() {
        let def = WorkflowDefinition::new("", "", vec![WorkflowStep::new("a", "sourcing", "candidate_search")]);
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing"]));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("id")));
        assert!(report.errors.iter().any(|e| e.contains("name")));
    }

    #[test]
    fn rejects_empty_step_list() {
        let def = WorkflowDefinition::new("wf1", "demo", vec![]);
        let report = WorkflowValidator::validate(&def, &registered(&[]));
        assert!(!report.valid);
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let def = WorkflowDefinition::new(
            "wf1",
            "demo",
            vec![
                WorkflowStep::new("a", "sourcing", "candidate_search"),
                WorkflowStep::new("a", "sourcing", "candidate_search"),
            ],
        );
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing"]));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn rejects_dangling_dependency() {
        let def = WorkflowDefinition::new(
            "wf1",
            "demo",
            vec![WorkflowStep::new("a", "sourcing", "candidate_search").with_dependencies(vec!["missing"])],
        );
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing"]));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("undefined step")));
    }

    #[test]
    fn rejects_unregistered_agent_type() {
        let def = WorkflowDefinition::new("wf1", "demo", vec![WorkflowStep::new("a", "mystery", "x")]);
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing"]));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("unregistered agent type")));
    }

    #[test]
    fn detects_two_step_cycle() {
        let def = WorkflowDefinition::new(
            "wf1",
            "demo",
            vec![
                WorkflowStep::new("a", "sourcing", "x").with_dependencies(vec!["b"]),
                WorkflowStep::new("b", "sourcing", "x").with_dependencies(vec!["a"]),
            ],
        );
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing"]));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.starts_with("cycle:")));
    }

    #[test]
    fn accepts_diamond_shaped_dag() {
        let def = WorkflowDefinition::new(
            "wf1",
            "demo",
            vec![
                WorkflowStep::new("a", "sourcing", "x"),
                WorkflowStep::new("b", "sourcing", "x").with_dependencies(vec!["a"]),
                WorkflowStep::new("c", "sourcing", "x").with_dependencies(vec!["a"]),
                WorkflowStep::new("d", "sourcing", "x").with_dependencies(vec!["b", "c"]),
            ],
        );
        let report = WorkflowValidator::validate(&def, &registered(&["sourcing"]));
        assert!(report.valid, "{:?}", report.errors);
    }
}
