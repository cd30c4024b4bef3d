//! Workflow definitions (templates) and workflow instances (in-flight runs).

use super::task::{AgentTask, TaskPriority};
use super::TaskOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single node in a workflow's dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub agent_type: String,
    pub task_type: String,
    #[serde(default)]
    pub task_priority: TaskPriorityOrDefault,
    #[serde(default)]
    pub task_input: serde_json::Value,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub failure_handlers: Vec<String>,
}

/// Wrapper so a step's TOML/JSON can omit `task_priority` entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriorityOrDefault {
    Low,
    Medium,
    High,
}

impl Default for TaskPriorityOrDefault {
    fn default() -> Self {
        Self::Medium
    }
}

impl From<TaskPriorityOrDefault> for TaskPriority {
    fn from(value: TaskPriorityOrDefault) -> Self {
        match value {
            TaskPriorityOrDefault::Low => TaskPriority::Low,
            TaskPriorityOrDefault::Medium => TaskPriority::Medium,
            TaskPriorityOrDefault::High => TaskPriority::High,
        }
    }
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, agent_type: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            agent_type: agent_type.into(),
            task_type: task_type.into(),
            task_priority: TaskPriorityOrDefault::Medium,
            task_input: serde_json::Value::Null,
            dependencies: Vec::new(),
            parallel: false,
            failure_handlers: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.task_input = input;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Builds the `AgentTask` template carried by this step.
    pub fn build_task(&self) -> AgentTask {
        AgentTask::new(
            self.task_type.clone(),
            self.task_priority.into(),
            self.task_input.clone(),
        )
    }
}

/// An ordered, named template for a DAG of steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1".to_string(),
            steps,
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

/// Status of a running workflow. `Paused` is the only non-terminal state
/// reachable from `Running` other than forward progress; `transition_to`
/// otherwise moves terminal-only-forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A single in-flight (or finished) execution of a `WorkflowDefinition`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowInstance {
    pub id: String,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub context: super::AgentContext,
    pub results: HashMap<String, TaskOutcome>,
    pub current_step_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WorkflowInstance {
    pub fn new(id: impl Into<String>, workflow_id: impl Into<String>, context: super::AgentContext) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Pending,
            context,
            results: HashMap::new(),
            current_step_id: None,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
        }
    }

    /// Transitions to a terminal state, stamping `ended_at` and failing
    /// closed if a forward transition from an already-terminal state is
    /// attempted (workflows move terminal-only-forward).
    pub fn transition_to(&mut self, status: WorkflowStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        if status.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }
}
