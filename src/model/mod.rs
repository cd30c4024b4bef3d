//! Immutable data model shared by every component: tasks, results,
//! messages, workflow definitions and instances.

mod agent;
mod message;
mod task;
mod workflow;

pub use agent::{AgentCapability, AgentDescriptor, AgentMetrics, AgentStatus};
pub use message::{AgentMessage, MessageType, BROADCAST, ORCHESTRATOR};
pub use task::{AgentContext, AgentTask, TaskOutcome, TaskPriority, TaskStatus};
pub use workflow::{WorkflowDefinition, WorkflowInstance, WorkflowStatus, WorkflowStep};
