//! Planning agent: produces a structured recruitment plan (phases,
//! timeline, risks, metrics, resources). Falls back to deterministic
//! defaults when the model gateway returns no suggestion.

use super::base::AgentBehavior;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::llm::ModelGateway;
use crate::model::{AgentCapability, AgentContext, AgentTask};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const TASK_TYPES: &[&str] = &["planning", "recruitment_plan", "strategy_generation"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanningInput {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub phases: Vec<String>,
    pub timeline_days: u32,
    pub risks: Vec<String>,
    pub metrics: Vec<String>,
    pub resources: Vec<String>,
}

impl Plan {
    fn default_for(role: &str) -> Self {
        Self {
            phases: vec![
                "sourcing".to_string(),
                "screening".to_string(),
                "interviewing".to_string(),
                "offer".to_string(),
            ],
            timeline_days: 30,
            risks: vec![format!("limited candidate pool for {role}")],
            metrics: vec!["time to fill".to_string(), "candidates per phase".to_string()],
            resources: vec!["recruiter".to_string(), "hiring manager".to_string()],
        }
    }
}

pub struct PlanningAgent {
    gateway: Arc<dyn ModelGateway>,
}

impl PlanningAgent {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl AgentBehavior for PlanningAgent {
    fn agent_type(&self) -> &str {
        "planning"
    }

    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new(
            "recruitment_plan",
            "produces a structured recruitment plan with phases, timeline, risks, metrics, and resources",
            serde_json::json!({"type": "object"}),
        )]
    }

    fn can_handle(&self, task_type: &str) -> bool {
        TASK_TYPES.contains(&task_type)
    }

    async fn run_task(
        &self,
        task: &AgentTask,
        context: &AgentContext,
        cancellation: &CancellationToken,
    ) -> OrchestratorResult<serde_json::Value> {
        if cancellation.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let input: PlanningInput = serde_json::from_value(task.input.clone())
            .map_err(|e| OrchestratorError::internal(format!("invalid planning input: {e}")))?;
        let role = input.role.clone().unwrap_or_else(|| "unspecified role".to_string());

        let suggestion = self
            .gateway
            .call(
                "produce a recruitment plan",
                serde_json::json!({"role": role, "urgency": input.urgency}),
                context,
            )
            .await
            .map_err(|e| OrchestratorError::upstream_failure(e.to_string()))?;

        let plan = serde_json::from_value::<Plan>(suggestion).unwrap_or_else(|_| Plan::default_for(&role));

        Ok(serde_json::to_value(plan).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskPriority;
    use crate::testing::mocks::MockModelGateway;

    #[tokio::test]
    async fn falls_back_to_deterministic_plan_when_gateway_returns_nothing_usable() {
        let gateway = Arc::new(MockModelGateway::returning(serde_json::json!(null)));
        let agent = PlanningAgent::new(gateway);
        let task = AgentTask::new("planning", TaskPriority::Medium, serde_json::json!({"role": "engineer"}));
        let ctx = AgentContext::new("u", "s");

        let output = agent.run_task(&task, &ctx, &CancellationToken::new()).await.unwrap();
        let plan: Plan = serde_json::from_value(output).unwrap();
        assert_eq!(plan.phases.len(), 4);
        assert!(plan.risks[0].contains("engineer"));
    }

    #[tokio::test]
    async fn uses_gateway_suggestion_when_well_formed() {
        let suggested = Plan {
            phases: vec!["fast-track".to_string()],
            timeline_days: 7,
            risks: vec![],
            metrics: vec![],
            resources: vec![],
        };
        let gateway = Arc::new(MockModelGateway::returning(serde_json::to_value(&suggested).unwrap()));
        let agent = PlanningAgent::new(gateway);
        let task = AgentTask::new("recruitment_plan", TaskPriority::High, serde_json::json!({}));
        let ctx = AgentContext::new("u", "s");

        let output = agent.run_task(&task, &ctx, &CancellationToken::new()).await.unwrap();
        let plan: Plan = serde_json::from_value(output).unwrap();
        assert_eq!(plan.timeline_days, 7);
    }
}
