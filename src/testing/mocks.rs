//! Mock implementations of `ModelGateway`, `ExternalServices`, and
//! `MetricsSink` for use in agent and orchestrator tests.

use crate::error::OrchestratorError;
use crate::llm::ModelGateway;
use crate::metrics::{AgentActivityRecord, MetricsSink, MetricsSnapshot};
use crate::model::{AgentContext, WorkflowInstance};
use crate::services::{CandidateRecord, EnrichmentRecord, ExternalServices};
use async_trait::async_trait;
use std::sync::Mutex;

/// A model gateway stub. `passthrough()` echoes back the payload it was
/// given (useful when the caller post-processes whatever the gateway
/// returns); `returning(value)` always answers with a fixed value;
/// `failing(message)` always fails.
pub struct MockModelGateway {
    mode: MockGatewayMode,
    pub calls: Mutex<Vec<String>>,
}

enum MockGatewayMode {
    Passthrough,
    Fixed(serde_json::Value),
    Failing(String),
}

impl MockModelGateway {
    pub fn passthrough() -> Self {
        Self {
            mode: MockGatewayMode::Passthrough,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(value: serde_json::Value) -> Self {
        Self {
            mode: MockGatewayMode::Fixed(value),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            mode: MockGatewayMode::Failing(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelGateway for MockModelGateway {
    async fn call(
        &self,
        prompt: &str,
        payload: serde_json::Value,
        _context: &AgentContext,
    ) -> Result<serde_json::Value, OrchestratorError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        match &self.mode {
            MockGatewayMode::Passthrough => Ok(payload),
            MockGatewayMode::Fixed(value) => Ok(value.clone()),
            MockGatewayMode::Failing(message) => Err(OrchestratorError::upstream_failure(message.clone())),
        }
    }
}

/// External services stub. Each constructor fixes the behaviour of all
/// three operations for the scenario it names.
pub struct MockExternalServices {
    candidates: Vec<CandidateRecord>,
    enrichment: EnrichmentRecord,
    verify_result: bool,
    should_fail: bool,
}

impl MockExternalServices {
    pub fn with_candidates(candidates: Vec<CandidateRecord>) -> Self {
        Self {
            candidates,
            enrichment: EnrichmentRecord::default(),
            verify_result: true,
            should_fail: false,
        }
    }

    pub fn with_enrichment(enrichment: EnrichmentRecord) -> Self {
        Self {
            candidates: Vec::new(),
            enrichment,
            verify_result: true,
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            enrichment: EnrichmentRecord::default(),
            verify_result: true,
            should_fail: true,
        }
    }
}

#[async_trait]
impl ExternalServices for MockExternalServices {
    async fn find_candidates(
        &self,
        _query: &str,
        _criteria: serde_json::Value,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, OrchestratorError> {
        if self.should_fail {
            return Err(OrchestratorError::upstream_failure("stub search provider unavailable"));
        }
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }

    async fn enrich_person(
        &self,
        _name: &str,
        _company: &str,
        _domain: &str,
    ) -> Result<EnrichmentRecord, OrchestratorError> {
        if self.should_fail {
            return Err(OrchestratorError::upstream_failure("stub enrichment provider unavailable"));
        }
        Ok(self.enrichment.clone())
    }

    async fn verify_email(&self, _addr: &str) -> Result<bool, OrchestratorError> {
        if self.should_fail {
            return Err(OrchestratorError::upstream_failure("stub verification provider unavailable"));
        }
        Ok(self.verify_result)
    }
}

/// In-memory metrics sink recording every write, for assertions in
/// orchestrator tests.
#[derive(Default)]
pub struct MockMetricsSink {
    pub agent_activity: Mutex<Vec<AgentActivityRecord>>,
    pub workflow_instances: Mutex<Vec<WorkflowInstance>>,
    pub orchestrator_snapshots: Mutex<Vec<MetricsSnapshot>>,
    should_fail: bool,
}

impl MockMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MetricsSink for MockMetricsSink {
    async fn write_agent_activity(&self, record: AgentActivityRecord) -> Result<(), OrchestratorError> {
        if self.should_fail {
            return Err(OrchestratorError::internal("mock sink configured to fail"));
        }
        self.agent_activity.lock().unwrap().push(record);
        Ok(())
    }

    async fn write_workflow_instance(&self, instance: WorkflowInstance) -> Result<(), OrchestratorError> {
        if self.should_fail {
            return Err(OrchestratorError::internal("mock sink configured to fail"));
        }
        self.workflow_instances.lock().unwrap().push(instance);
        Ok(())
    }

    async fn write_orchestrator_metrics(&self, snapshot: MetricsSnapshot) -> Result<(), OrchestratorError> {
        if self.should_fail {
            return Err(OrchestratorError::internal("mock sink configured to fail"));
        }
        self.orchestrator_snapshots.lock().unwrap().push(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_gateway_echoes_payload() {
        let gateway = MockModelGateway::passthrough();
        let ctx = AgentContext::new("u", "s");
        let result = gateway.call("prompt", serde_json::json!({"a": 1}), &ctx).await.unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn failing_gateway_returns_upstream_failure() {
        let gateway = MockModelGateway::failing("boom");
        let ctx = AgentContext::new("u", "s");
        let err = gateway.call("prompt", serde_json::json!(null), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_failure");
    }

    #[tokio::test]
    async fn mock_metrics_sink_records_writes() {
        let sink = MockMetricsSink::new();
        let instance = WorkflowInstance::new("wi1", "wf1", AgentContext::new("u", "s"));
        sink.write_workflow_instance(instance).await.unwrap();
        assert_eq!(sink.workflow_instances.lock().unwrap().len(), 1);
    }
}
