//! The message envelope exchanged between agents and the orchestrator
//! through the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved `to` value denoting a broadcast message.
pub const BROADCAST: &str = "*";

/// Reserved `from`/`to` value denoting the orchestrator itself.
pub const ORCHESTRATOR: &str = "orchestrator";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Status,
    Error,
}

/// Immutable envelope exchanged between agents and the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub action: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl AgentMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message_type: MessageType,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            message_type,
            action: action.into(),
            payload,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn in_response_to(mut self, request: &AgentMessage) -> Self {
        self.correlation_id = Some(request.id);
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }

    /// `from != to` is required except for broadcasts.
    pub fn satisfies_addressing_invariant(&self) -> bool {
        self.is_broadcast() || self.from != self.to
    }
}
