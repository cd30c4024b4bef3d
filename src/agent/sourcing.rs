//! Sourcing agent: parses an optional job description, merges search
//! criteria, builds a boolean query, fans out candidate search across a
//! configurable platform set, ranks via the model gateway, and returns the
//! top N candidates.

use super::base::AgentBehavior;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::llm::ModelGateway;
use crate::model::{AgentCapability, AgentContext, AgentTask};
use crate::services::ExternalServices;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const TASK_TYPES: &[&str] = &["sourcing", "candidate_search", "boolean_generation"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourcingInput {
    #[serde(default)]
    job_description: Option<String>,
    #[serde(default)]
    criteria: serde_json::Value,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default)]
    search_platforms: Vec<String>,
}

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct SourcingOutput {
    query: String,
    candidates: Vec<crate::services::CandidateRecord>,
}

pub struct SourcingAgent {
    gateway: Arc<dyn ModelGateway>,
    services: Arc<dyn ExternalServices>,
}

impl SourcingAgent {
    pub fn new(gateway: Arc<dyn ModelGateway>, services: Arc<dyn ExternalServices>) -> Self {
        Self { gateway, services }
    }

    fn build_boolean_query(input: &SourcingInput) -> String {
        let base = input.job_description.as_deref().unwrap_or("").trim();
        if base.is_empty() {
            "*".to_string()
        } else {
            format!("({base})")
        }
    }
}

#[async_trait]
impl AgentBehavior for SourcingAgent {
    fn agent_type(&self) -> &str {
        "sourcing"
    }

    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new(
            "candidate_search",
            "finds candidates matching a boolean query across configured platforms",
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
        let input: SourcingInput = serde_json::from_value(task.input.clone())
            .map_err(|e| OrchestratorError::internal(format!("invalid sourcing input: {e}")))?;

        let query = Self::build_boolean_query(&input);

        let platforms = if input.search_platforms.is_empty() {
            vec!["default".to_string()]
        } else {
            input.search_platforms.clone()
        };

        let mut candidates = Vec::new();
        for platform in &platforms {
            if cancellation.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            let per_platform_limit = input.max_results.max(1);
            let found = self
                .services
                .find_candidates(&query, input.criteria.clone(), per_platform_limit)
                .await
                .map_err(|e| OrchestratorError::upstream_failure(format!("{platform}: {e}")))?;
            candidates.extend(found);
        }

        let ranked = self
            .gateway
            .call(
                "rank candidates by relevance to the boolean query",
                serde_json::json!({"query": query, "candidates": candidates}),
                context,
            )
            .await
            .map_err(|e| OrchestratorError::upstream_failure(e.to_string()))?;

        let ranked_candidates: Vec<crate::services::CandidateRecord> =
            serde_json::from_value(ranked).unwrap_or(candidates);

        let top_n = ranked_candidates.into_iter().take(input.max_results).collect();

        Ok(serde_json::to_value(SourcingOutput { query, candidates: top_n }).unwrap())
    }
}
