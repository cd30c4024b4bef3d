//! Error taxonomy for the orchestration engine.
//!
//! `OrchestratorError` enumerates every kind of failure the engine itself can
//! raise. Agent handler failures and upstream (model gateway / external
//! service) failures are captured into [`crate::model::TaskOutcome::Failure`]
//! and never escape as a Rust `Result::Err` across the agent boundary; the
//! variants here cover everything that *can* propagate synchronously
//! (`createAgent`, `executeWorkflow`'s validation stage) as well as the
//! taxonomy recorded inside a failed task outcome.

use regex::Regex;
use std::sync::OnceLock;

/// The complete error taxonomy for the orchestration engine.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("agent cannot handle task type '{task_type}'")]
    NotSupported { task_type: String },

    #[error("agent '{agent_id}' is already processing a task")]
    Busy { agent_id: String },

    #[error("agent capacity exceeded: {current}/{max} live agents")]
    CapacityExceeded { current: usize, max: usize },

    #[error("no factory registered for agent type '{agent_type}'")]
    UnknownAgentType { agent_type: String },

    #[error("dependency '{step_id}' did not complete successfully")]
    DependencyUnsatisfied { step_id: String },

    #[error("task exceeded its deadline of {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error("operation was cancelled")]
    Cancelled,

    #[error("upstream failure: {message}")]
    UpstreamFailure { message: String },

    #[error("workflow definition rejected: {}", errors.join("; "))]
    ValidationError { errors: Vec<String> },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OrchestratorError {
    pub fn not_supported(task_type: impl Into<String>) -> Self {
        Self::NotSupported {
            task_type: task_type.into(),
        }
    }

    pub fn busy(agent_id: impl Into<String>) -> Self {
        Self::Busy {
            agent_id: agent_id.into(),
        }
    }

    pub fn capacity_exceeded(current: usize, max: usize) -> Self {
        Self::CapacityExceeded { current, max }
    }

    pub fn unknown_agent_type(agent_type: impl Into<String>) -> Self {
        Self::UnknownAgentType {
            agent_type: agent_type.into(),
        }
    }

    pub fn dependency_unsatisfied(step_id: impl Into<String>) -> Self {
        Self::DependencyUnsatisfied {
            step_id: step_id.into(),
        }
    }

    pub fn timeout(deadline_ms: u64) -> Self {
        Self::Timeout { deadline_ms }
    }

    pub fn upstream_failure(message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            message: sanitize_error_message(&message.into()),
        }
    }

    pub fn validation_error(errors: Vec<String>) -> Self {
        Self::ValidationError { errors }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: sanitize_error_message(&message.into()),
        }
    }

    /// Stable kind tag, used by tests that assert on the error category
    /// without matching the full message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotSupported { .. } => "not_supported",
            Self::Busy { .. } => "busy",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::UnknownAgentType { .. } => "unknown_agent_type",
            Self::DependencyUnsatisfied { .. } => "dependency_unsatisfied",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::UpstreamFailure { .. } => "upstream_failure",
            Self::ValidationError { .. } => "validation_error",
            Self::Internal { .. } => "internal",
        }
    }

    /// `kind: display` — used wherever a failure that never touched an
    /// agent (dependency cascade, capacity rejection) is flattened into a
    /// `TaskOutcome`'s plain `error: String` field, so the kind survives.
    pub fn to_tagged_string(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

fn secret_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(password|token|api[_-]?key|secret)\s*[:=]\s*\S+"#).unwrap()
    })
}

/// Redacts obvious secret-shaped substrings and caps message length, the way
/// upstream failures surfaced from a Model Gateway or External Service may
/// otherwise leak credentials embedded in a transport error string.
pub fn sanitize_error_message(message: &str) -> String {
    let redacted = secret_pattern()
        .replace_all(message, |caps: &regex::Captures| {
            format!("{}=[REDACTED]", &caps[1])
        })
        .to_string();

    if redacted.len() > 500 {
        let mut truncated: String = redacted.chars().take(500).collect();
        truncated.push_str("...[truncated]");
        truncated
    } else {
        redacted
    }
}
