//! Enrichment agent: per-candidate enrichment (contact discovery, profile
//! enrichment, email verification) guarded by a per-type flag set and
//! batched internally in groups of ten.

use super::base::AgentBehavior;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::llm::ModelGateway;
use crate::model::{AgentCapability, AgentContext, AgentTask};
use crate::services::ExternalServices;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const TASK_TYPES: &[&str] = &["enrichment", "contact_discovery", "profile_enrichment"];
const BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateInput {
    name: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    domain: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichmentInput {
    candidates: Vec<CandidateInput>,
    #[serde(default)]
    verify_emails: bool,
}

#[derive(Debug, Clone, Serialize)]
struct EnrichedCandidate {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    title: Option<String>,
    email_verified: Option<bool>,
}

#[derive(Debug, Serialize)]
struct EnrichmentOutput {
    enriched: Vec<EnrichedCandidate>,
}

pub struct EnrichmentAgent {
    #[allow(dead_code)]
    gateway: Arc<dyn ModelGateway>,
    services: Arc<dyn ExternalServices>,
}

impl EnrichmentAgent {
    pub fn new(gateway: Arc<dyn ModelGateway>, services: Arc<dyn ExternalServices>) -> Self {
        Self { gateway, services }
    }
}

#[async_trait]
impl AgentBehavior for EnrichmentAgent {
    fn agent_type(&self) -> &str {
        "enrichment"
    }

    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new(
            "profile_enrichment",
            "enriches candidate contact details, optionally verifying email addresses",
            serde_json::json!({"type": "object"}),
        )]
    }

    fn can_handle(&self, task_type: &str) -> bool {
        TASK_TYPES.contains(&task_type)
    }

    async fn run_task(
        &self,
        task: &AgentTask,
        _context: &AgentContext,
        cancellation: &CancellationToken,
    ) -> OrchestratorResult<serde_json::Value> {
        let input: EnrichmentInput = serde_json::from_value(task.input.clone())
            .map_err(|e| OrchestratorError::internal(format!("invalid enrichment input: {e}")))?;

        let mut enriched = Vec::with_capacity(input.candidates.len());

        for batch in input.candidates.chunks(BATCH_SIZE) {
            if cancellation.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            for candidate in batch {
                let record = self
                    .services
                    .enrich_person(&candidate.name, &candidate.company, &candidate.domain)
                    .await
                    .map_err(|e| OrchestratorError::upstream_failure(e.to_string()))?;

                let email_verified = if input.verify_emails {
                    match &record.email {
                        Some(addr) => Some(
                            self.services
                                .verify_email(addr)
                                .await
                                .map_err(|e| OrchestratorError::upstream_failure(e.to_string()))?,
                        ),
                        None => None,
                    }
                } else {
                    None
                };

                enriched.push(EnrichedCandidate {
                    name: candidate.name.clone(),
                    email: record.email,
                    phone: record.phone,
                    title: record.title,
                    email_verified,
                });
            }
        }

        Ok(serde_json::to_value(EnrichmentOutput { enriched }).unwrap())
    }
}
