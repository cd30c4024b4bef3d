//! agent-orchestrator
//!
//! A multi-agent orchestration engine: bounded pools of heterogeneous AI
//! agents, a pub/sub message bus with pattern-based routing, and a DAG
//! workflow executor with dependency gating, retries, failure handlers,
//! and cooperative cancellation.
//!
//! # Overview
//!
//! - [`agent`] — the Agent contract (`AgentBehavior`) and the runtime
//!   wrapper (`AgentRuntime`) that gives every concrete agent its lifecycle,
//!   single-flight task dispatch, and metrics. Three reference agents
//!   (`SourcingAgent`, `EnrichmentAgent`, `PlanningAgent`) ship as examples.
//! - [`bus`] — the Message Bus: literal/regex pattern subscriptions,
//!   `from`-scoped routing rules, and a bounded FIFO log.
//! - [`workflow`] — the Workflow Registry and Validator: template storage
//!   and DAG well-formedness checks (unknown agent types, missing
//!   dependencies, cycles).
//! - [`orchestrator`] — [`Orchestrator`], the coordinator that owns agent
//!   pools, drives workflow execution, and pumps agent output onto the bus
//!   and metrics sink.
//! - [`llm`] and [`services`] — the Model Gateway and External Service Set:
//!   the two trait boundaries concrete agents call through, implemented
//!   by callers (no concrete network clients ship in this crate).
//! - [`metrics`] — the `MetricsSink` trait, in-process counters, and the
//!   periodic snapshot pushed to it.
//! - [`config`] — `OrchestratorConfig` and its TOML loading.
//! - [`error`] — the `OrchestratorError` taxonomy shared across every
//!   module.
//! - [`testing`] — mock `ModelGateway`/`ExternalServices`/`MetricsSink`
//!   implementations used by this crate's own tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use agent_orchestrator::config::OrchestratorConfig;
//! use agent_orchestrator::model::{AgentContext, WorkflowDefinition, WorkflowStep};
//! use agent_orchestrator::orchestrator::Orchestrator;
//! use agent_orchestrator::testing::mocks::{MockExternalServices, MockMetricsSink, MockModelGateway};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), Arc::new(MockMetricsSink::new()));
//! orchestrator.register_reference_agents(
//!     Arc::new(MockModelGateway::passthrough()),
//!     Arc::new(MockExternalServices::with_candidates(vec![])),
//! );
//! orchestrator.initialize().await?;
//!
//! let workflow = WorkflowDefinition::new(
//!     "sourcing-pipeline",
//!     "source and enrich",
//!     vec![
//!         WorkflowStep::new("find", "sourcing", "candidate_search").with_input(serde_json::json!({})),
//!         WorkflowStep::new("enrich", "enrichment", "enrichment")
//!             .with_dependencies(vec!["find"])
//!             .with_input(serde_json::json!({"candidates": []})),
//!     ],
//! );
//! let instance = orchestrator.execute_workflow(workflow, AgentContext::new("user-1", "session-1")).await?;
//! println!("workflow finished: {:?}", instance.status);
//!
//! orchestrator.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod bus;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod services;
pub mod testing;
pub mod workflow;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::Orchestrator;
