//! The Metrics Sink: an append-only destination for agent activity,
//! workflow-instance, and orchestrator-snapshot records, plus the
//! orchestrator's own in-process counters that feed the periodic pump.

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};

use crate::error::OrchestratorError;
use crate::model::{AgentMetrics, WorkflowInstance};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent's activity, written after every completed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentActivityRecord {
    pub agent_id: String,
    pub agent_type: String,
    pub metrics: AgentMetrics,
    pub recorded_at: DateTime<Utc>,
}

/// Three append operations. The sink must accept concurrent writers and
/// must never block the calling agent for more than a bounded time — hence
/// `&self`, not `&mut self`, and implementations are expected to use
/// internal synchronization (a mutex, a channel, or a lock-free structure)
/// rather than requiring external serialization.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_agent_activity(&self, record: AgentActivityRecord) -> Result<(), OrchestratorError>;
    async fn write_workflow_instance(&self, instance: WorkflowInstance) -> Result<(), OrchestratorError>;
    async fn write_orchestrator_metrics(&self, snapshot: MetricsSnapshot) -> Result<(), OrchestratorError>;
}
