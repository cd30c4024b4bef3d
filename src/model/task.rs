//! Task and result records: the immutable unit of work dispatched to an
//! agent, and the single outcome it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Caller identity, immutable per workflow instance and passed by value into
/// every agent and task it spawns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContext {
    pub user_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub overrides: HashMap<String, serde_json::Value>,
}

impl AgentContext {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            project_id: None,
            overrides: HashMap::new(),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// Priority tag carried by a task; does not itself affect scheduling order
/// (the Orchestrator schedules by dependency satisfaction, not priority),
/// but concrete agents and external services may use it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// A single unit of work dispatched to an agent; consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTask {
    pub task_id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: TaskPriority,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_override: Option<u32>,
}

impl AgentTask {
    pub fn new(task_type: impl Into<String>, priority: TaskPriority, input: serde_json::Value) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_type: task_type.into(),
            priority,
            input,
            timeout_ms: None,
            retry_override: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Terminal status of a completed task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failure,
    Cancelled,
}

/// Produced exactly once per task. Named `TaskOutcome` rather than `Result`
/// to avoid shadowing `std::result::Result`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub agent_id: String,
    pub status: TaskStatus,
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl TaskOutcome {
    pub fn success(
        task_id: Uuid,
        agent_id: impl Into<String>,
        output: serde_json::Value,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            agent_id: agent_id.into(),
            status: TaskStatus::Success,
            output,
            error: None,
            started_at,
            ended_at,
        }
    }

    pub fn failure(
        task_id: Uuid,
        agent_id: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            agent_id: agent_id.into(),
            status: TaskStatus::Failure,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            started_at,
            ended_at,
        }
    }

    pub fn cancelled(
        task_id: Uuid,
        agent_id: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            agent_id: agent_id.into(),
            status: TaskStatus::Cancelled,
            output: serde_json::Value::Null,
            error: None,
            started_at,
            ended_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_have_no_project_id() {
        let ctx = AgentContext::new("u1", "s1");
        assert!(ctx.project_id.is_none());
        assert!(ctx.overrides.is_empty());
    }

    #[test]
    fn task_new_generates_unique_ids() {
        let a = AgentTask::new("sourcing", TaskPriority::Medium, serde_json::json!({}));
        let b = AgentTask::new("sourcing", TaskPriority::Medium, serde_json::json!({}));
        assert_ne!(a.task_id, b.task_id);
    }

    #[test]
    fn outcome_success_round_trips_json() {
        let now = Utc::now();
        let outcome = TaskOutcome::success(Uuid::new_v4(), "agent-1", serde_json::json!({"ok": true}), now, now);
        let json = serde_json::to_string(&outcome).unwrap();
        let back: TaskOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, back);
        assert!(back.is_success());
    }

    #[test]
    fn priority_serializes_lowercase() {
        let json = serde_json::to_string(&TaskPriority::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
