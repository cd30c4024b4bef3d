//! Agent capability declarations, runtime descriptors, and per-agent
//! metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, schema-described operation an agent claims to perform. Static
/// per agent type, used for introspection and future pattern-based
/// matching; the orchestration core does not interpret `input_schema`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCapability {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl AgentCapability {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Lifecycle state of a runtime agent instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
    Paused,
    Stopped,
}

/// A snapshot of a live agent, exclusively owned by the Orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDescriptor {
    pub id: String,
    pub agent_type: String,
    pub status: AgentStatus,
    pub capabilities: Vec<AgentCapability>,
    pub current_task_id: Option<uuid::Uuid>,
    pub metrics: AgentMetrics,
}

/// Monotonic per-agent counters plus a running-average response time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMetrics {
    pub agent_id: String,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub cancelled_tasks: u64,
    pub avg_response_time_ms: f64,
    pub last_active: Option<DateTime<Utc>>,
    pub capability_names: Vec<String>,
}

impl AgentMetrics {
    pub fn new(agent_id: impl Into<String>, capability_names: Vec<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            cancelled_tasks: 0,
            avg_response_time_ms: 0.0,
            last_active: None,
            capability_names,
        }
    }

    /// Running average: `avg <- (avg*(n-1) + t) / n` where `n` is the
    /// post-increment `total_tasks`.
    pub fn record_task(&mut self, status: crate::model::TaskStatus, duration_ms: f64, at: DateTime<Utc>) {
        self.total_tasks += 1;
        let n = self.total_tasks as f64;
        self.avg_response_time_ms = (self.avg_response_time_ms * (n - 1.0) + duration_ms) / n;
        self.last_active = Some(at);

        match status {
            crate::model::TaskStatus::Success => self.successful_tasks += 1,
            crate::model::TaskStatus::Failure => self.failed_tasks += 1,
            crate::model::TaskStatus::Cancelled => self.cancelled_tasks += 1,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.successful_tasks + self.failed_tasks + self.cancelled_tasks == self.total_tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    #[test]
    fn running_average_matches_formula() {
        let mut metrics = AgentMetrics::new("agent-1", vec!["sourcing".to_string()]);
        let now = Utc::now();

        metrics.record_task(TaskStatus::Success, 100.0, now);
        assert_eq!(metrics.avg_response_time_ms, 100.0);

        metrics.record_task(TaskStatus::Success, 200.0, now);
        assert_eq!(metrics.avg_response_time_ms, 150.0);

        metrics.record_task(TaskStatus::Failure, 300.0, now);
        assert_eq!(metrics.avg_response_time_ms, 200.0);
    }

    #[test]
    fn counters_stay_consistent() {
        let mut metrics = AgentMetrics::new("agent-1", vec![]);
        let now = Utc::now();
        metrics.record_task(TaskStatus::Success, 10.0, now);
        metrics.record_task(TaskStatus::Failure, 10.0, now);
        metrics.record_task(TaskStatus::Cancelled, 10.0, now);
        assert!(metrics.is_consistent());
        assert_eq!(metrics.total_tasks, 3);
    }
}
