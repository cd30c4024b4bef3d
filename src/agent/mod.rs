//! Base Agent contract and the three reference concrete agents.

pub mod base;
pub mod enrichment;
pub mod planning;
pub mod sourcing;

pub use base::{AgentBehavior, AgentOutbound, AgentRuntime, DynAgent, LifecycleEvent};
pub use enrichment::EnrichmentAgent;
pub use planning::PlanningAgent;
pub use sourcing::SourcingAgent;
