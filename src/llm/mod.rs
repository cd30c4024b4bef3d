//! The Model Gateway: an opaque call to an LLM backend. A black box from
//! the orchestrator's perspective — agents invoke it, the orchestrator
//! never does.

use crate::error::OrchestratorError;
use crate::model::AgentContext;
use async_trait::async_trait;

/// A single opaque operation: `call(prompt, payload, context) -> response`.
/// Implementations may fail with a transport or upstream error; concrete
/// agents surface those as `OrchestratorError::UpstreamFailure` inside a
/// failed task outcome — the error never reaches the orchestrator directly.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn call(
        &self,
        prompt: &str,
        payload: serde_json::Value,
        context: &AgentContext,
    ) -> Result<serde_json::Value, OrchestratorError>;
}
