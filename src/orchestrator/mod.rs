//! The Orchestrator: bounded agent pools, DAG workflow execution, and the
//! message/metrics pumps that connect agents to the bus and the metrics
//! sink. This is the seam the rest of the engine is built around — it owns
//! the only long-lived background tasks in the process.
//!
//! Grounded in the pipeline orchestrator's shape (a struct that owns its
//! collaborators by `Arc`, drives a scheduling loop, and logs densely at
//! each state transition) generalized from a single linear pipeline to an
//! arbitrary DAG with admission control and failure handlers.

mod registry;
mod scheduler;

use crate::agent::{AgentOutbound, AgentRuntime, DynAgent, EnrichmentAgent, LifecycleEvent, PlanningAgent, SourcingAgent};
use crate::bus::{MessageBus, MessageHandler, Pattern};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::llm::ModelGateway;
use crate::metrics::{AgentActivityRecord, MetricsCollector, MetricsSink, MetricsSnapshot};
use crate::model::{
    AgentContext, AgentDescriptor, AgentMessage, MessageType, TaskOutcome, TaskStatus, WorkflowDefinition,
    WorkflowInstance, WorkflowStatus, BROADCAST, ORCHESTRATOR,
};
use crate::services::ExternalServices;
use crate::workflow::{WorkflowRegistry, WorkflowValidator};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use registry::LiveAgentRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Builds a fresh `Arc<dyn DynAgent>` given the id the orchestrator
/// assigned it and the outbound channel it should emit lifecycle events
/// and messages on.
pub type AgentFactory = Arc<dyn Fn(String, mpsc::Sender<AgentOutbound>) -> Arc<dyn DynAgent> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrchestratorState {
    Created,
    Running,
    ShutDown,
}

/// Bounded agent pools, DAG workflow execution, pub/sub routing, and
/// periodic metrics — the single top-level coordinator of the engine.
pub struct Orchestrator {
    config: OrchestratorConfig,
    agent_factories: Mutex<HashMap<String, AgentFactory>>,
    live_agents: Arc<LiveAgentRegistry>,
    workflows: Arc<WorkflowRegistry>,
    bus: Arc<MessageBus>,
    metrics_sink: Arc<dyn MetricsSink>,
    metrics: Arc<MetricsCollector>,
    outbound_tx: mpsc::Sender<AgentOutbound>,
    outbound_rx: Mutex<Option<mpsc::Receiver<AgentOutbound>>>,
    cancellation_tokens: Mutex<HashMap<String, CancellationToken>>,
    state: Mutex<OrchestratorState>,
    pump_handles: Mutex<Vec<JoinHandle<()>>>,
    router_handler_id: Mutex<Option<u64>>,
    agent_nonce: AtomicU64,
}

/// Routes published messages to the live agent they address, drops
/// messages addressed to an agent that is no longer (or never was) live,
/// and fans broadcasts out to every currently live agent.
struct MessageRouter {
    live_agents: Arc<LiveAgentRegistry>,
    bus: Arc<MessageBus>,
    metrics: Arc<MetricsCollector>,
}

#[async_trait]
impl MessageHandler for MessageRouter {
    async fn handle(&self, msg: &AgentMessage) -> Result<(), OrchestratorError> {
        if msg.to == BROADCAST {
            for agent in self.live_agents.all() {
                agent.handle_message(msg).await;
            }
            return Ok(());
        }
        if msg.to == ORCHESTRATOR {
            debug!(from = %msg.from, action = %msg.action, "message delivered to orchestrator");
            return Ok(());
        }
        match self.live_agents.get(&msg.to) {
            Some(agent) => agent.handle_message(msg).await,
            None => {
                self.bus.record_dropped();
                self.metrics.message_dropped();
                warn!(to = %msg.to, "message addressed to unknown recipient dropped");
            }
        }
        Ok(())
    }
}

fn duration_ms(outcome: &TaskOutcome) -> u64 {
    (outcome.ended_at - outcome.started_at).num_milliseconds().max(0) as u64
}

/// Turns a failed or cancelled dependency outcome into the outcome recorded
/// against a dependent step that never ran.
fn cascade_outcome(dep_outcome: &TaskOutcome, dep_id: &str) -> TaskOutcome {
    let now = Utc::now();
    if dep_outcome.status == TaskStatus::Cancelled {
        TaskOutcome::cancelled(Uuid::new_v4(), ORCHESTRATOR, now, now)
    } else {
        TaskOutcome::failure(
            Uuid::new_v4(),
            ORCHESTRATOR,
            OrchestratorError::dependency_unsatisfied(dep_id).to_tagged_string(),
            now,
            now,
        )
    }
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, metrics_sink: Arc<dyn MetricsSink>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(1024);
        Self {
            bus: Arc::new(MessageBus::new(config.message_bus.max_log_size)),
            config,
            agent_factories: Mutex::new(HashMap::new()),
            live_agents: Arc::new(LiveAgentRegistry::new()),
            workflows: Arc::new(WorkflowRegistry::new()),
            metrics_sink,
            metrics: Arc::new(MetricsCollector::new()),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            cancellation_tokens: Mutex::new(HashMap::new()),
            state: Mutex::new(OrchestratorState::Created),
            pump_handles: Mutex::new(Vec::new()),
            router_handler_id: Mutex::new(None),
            agent_nonce: AtomicU64::new(1),
        }
    }

    pub fn register_agent_factory(&self, agent_type: impl Into<String>, factory: AgentFactory) {
        self.agent_factories.lock().unwrap().insert(agent_type.into(), factory);
    }

    /// Registers the three reference agents under their canonical type
    /// names, sharing the gateway and external services across them.
    pub fn register_reference_agents(&self, gateway: Arc<dyn ModelGateway>, services: Arc<dyn ExternalServices>) {
        let sourcing_gateway = gateway.clone();
        let sourcing_services = services.clone();
        self.register_agent_factory(
            "sourcing",
            Arc::new(move |id, outbound| {
                let behavior = SourcingAgent::new(sourcing_gateway.clone(), sourcing_services.clone());
                Arc::new(AgentRuntime::new(id, behavior, outbound)) as Arc<dyn DynAgent>
            }),
        );

        let enrichment_gateway = gateway.clone();
        let enrichment_services = services;
        self.register_agent_factory(
            "enrichment",
            Arc::new(move |id, outbound| {
                let behavior = EnrichmentAgent::new(enrichment_gateway.clone(), enrichment_services.clone());
                Arc::new(AgentRuntime::new(id, behavior, outbound)) as Arc<dyn DynAgent>
            }),
        );

        self.register_agent_factory(
            "planning",
            Arc::new(move |id, outbound| {
                let behavior = PlanningAgent::new(gateway.clone());
                Arc::new(AgentRuntime::new(id, behavior, outbound)) as Arc<dyn DynAgent>
            }),
        );
    }

    pub fn registered_agent_types(&self) -> HashSet<String> {
        self.agent_factories.lock().unwrap().keys().cloned().collect()
    }

    pub fn bus(&self) -> Arc<MessageBus> {
        self.bus.clone()
    }

    pub fn live_agent_count(&self) -> usize {
        self.live_agents.len()
    }

    /// An introspection snapshot of a single live agent, for callers that
    /// need to report on it rather than drive it.
    pub fn describe_agent(&self, agent_id: &str) -> Option<AgentDescriptor> {
        self.live_agents.get(agent_id).map(|agent| agent.describe())
    }

    /// Introspection snapshots of every currently live agent.
    pub fn live_agent_descriptors(&self) -> Vec<AgentDescriptor> {
        self.live_agents.all().iter().map(|agent| agent.describe()).collect()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.live_agents.len(), self.workflows.instance_count())
    }

    /// Spawns the message pump (draining agent outbound events onto the
    /// bus) and, if enabled, the periodic metrics pump. Idempotent: calling
    /// this more than once is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> OrchestratorResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(*state, OrchestratorState::Created) {
                return Ok(());
            }
            *state = OrchestratorState::Running;
        }

        let router = Arc::new(MessageRouter {
            live_agents: self.live_agents.clone(),
            bus: self.bus.clone(),
            metrics: self.metrics.clone(),
        });
        let handler_id = self.bus.subscribe(Pattern::literal("message"), router);
        *self.router_handler_id.lock().unwrap() = Some(handler_id);

        let mut outbound_rx = self
            .outbound_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| OrchestratorError::internal("outbound channel already consumed"))?;
        let bus = self.bus.clone();
        let metrics = self.metrics.clone();
        let message_pump = tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                match event {
                    AgentOutbound::Lifecycle(event) => {
                        debug!(?event, "lifecycle event");
                    }
                    AgentOutbound::Message(msg) => {
                        metrics.message_published();
                        bus.publish(msg).await;
                    }
                }
            }
        });
        self.pump_handles.lock().unwrap().push(message_pump);

        if self.config.monitoring.enabled {
            let interval_secs = self.config.monitoring.metrics_interval_secs.max(1);
            let metrics = self.metrics.clone();
            let sink = self.metrics_sink.clone();
            let live_agents = self.live_agents.clone();
            let workflows = self.workflows.clone();
            let metrics_pump = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                loop {
                    ticker.tick().await;
                    let snapshot = metrics.snapshot(live_agents.len(), workflows.instance_count());
                    if let Err(err) = sink.write_orchestrator_metrics(snapshot).await {
                        warn!(error = %err, "failed to write metrics snapshot");
                    }
                }
            });
            self.pump_handles.lock().unwrap().push(metrics_pump);
        }

        info!("orchestrator initialized");
        Ok(())
    }

    #[tracing::instrument(skip(self, _context), fields(agent_type = %agent_type))]
    pub async fn create_agent(&self, agent_type: &str, _context: &AgentContext) -> OrchestratorResult<Arc<dyn DynAgent>> {
        if self.live_agents.len() >= self.config.max_concurrent_agents {
            self.metrics.capacity_rejected();
            return Err(OrchestratorError::capacity_exceeded(
                self.live_agents.len(),
                self.config.max_concurrent_agents,
            ));
        }

        let factory = self
            .agent_factories
            .lock()
            .unwrap()
            .get(agent_type)
            .cloned()
            .ok_or_else(|| OrchestratorError::unknown_agent_type(agent_type))?;

        let nonce = self.agent_nonce.fetch_add(1, Ordering::Relaxed);
        let id = format!("{agent_type}-{nonce}");
        let agent = factory(id.clone(), self.outbound_tx.clone());
        self.live_agents.insert(agent.clone());
        self.metrics.agent_created();
        info!(agent_id = %id, "agent created");
        Ok(agent)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_agent(&self, agent_id: &str) -> OrchestratorResult<()> {
        match self.live_agents.remove(agent_id) {
            Some(agent) => {
                agent.shutdown().await;
                self.metrics.agent_removed();
                Ok(())
            }
            None => Err(OrchestratorError::internal(format!("unknown agent id '{agent_id}'"))),
        }
    }

    pub async fn send_message(&self, msg: AgentMessage) {
        self.metrics.message_published();
        self.bus.publish(msg).await;
    }

    pub fn pause_workflow(&self, id: &str) -> OrchestratorResult<()> {
        let mut instance = self
            .workflows
            .get_instance(id)
            .ok_or_else(|| OrchestratorError::internal(format!("unknown workflow instance '{id}'")))?;
        instance.transition_to(WorkflowStatus::Paused, None);
        self.workflows.upsert_instance(instance);
        Ok(())
    }

    pub fn resume_workflow(&self, id: &str) -> OrchestratorResult<()> {
        let mut instance = self
            .workflows
            .get_instance(id)
            .ok_or_else(|| OrchestratorError::internal(format!("unknown workflow instance '{id}'")))?;
        instance.transition_to(WorkflowStatus::Running, None);
        self.workflows.upsert_instance(instance);
        Ok(())
    }

    /// Instance ids currently mid-flight, i.e. holding a live cancellation
    /// token. Used by callers that need to address a just-started workflow
    /// before its instance id has been reported back to them any other way.
    pub fn active_instance_ids(&self) -> Vec<String> {
        self.cancellation_tokens.lock().unwrap().keys().cloned().collect()
    }

    pub fn cancel_workflow(&self, id: &str) -> OrchestratorResult<()> {
        let token = self
            .cancellation_tokens
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::internal(format!("unknown workflow instance '{id}'")))?;
        token.cancel();
        Ok(())
    }

    /// Runs a single attempt (with retry-with-backoff) of one workflow step
    /// from agent creation through agent removal, returning the step id
    /// paired with its final outcome. Creation failures (an admission race
    /// against `max_concurrent_agents`) are folded into a synthetic failure
    /// outcome rather than propagated, so the caller's scheduling loop never
    /// has to special-case them.
    async fn run_step(
        &self,
        step: crate::model::WorkflowStep,
        context: AgentContext,
        cancellation: CancellationToken,
    ) -> (String, TaskOutcome) {
        let step_id = step.id.clone();
        let agent = match self.create_agent(&step.agent_type, &context).await {
            Ok(agent) => agent,
            Err(err) => {
                let now = Utc::now();
                return (step_id, TaskOutcome::failure(Uuid::new_v4(), ORCHESTRATOR, err.to_string(), now, now));
            }
        };

        let max_attempts = self.config.retry.max_attempts.max(1);
        let backoff_ms = self.config.retry.backoff_ms;
        let timeout_ms = self.config.default_timeout_ms;

        self.metrics.task_received();
        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            let task = step.build_task();
            let attempt_outcome = match agent.process_task(task, &context, cancellation.clone(), timeout_ms).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let now = Utc::now();
                    break TaskOutcome::failure(Uuid::new_v4(), agent.id().to_string(), err.to_string(), now, now);
                }
            };

            let should_retry =
                attempt_outcome.status == TaskStatus::Failure && attempt < max_attempts && !cancellation.is_cancelled();
            if !should_retry {
                break attempt_outcome;
            }
            warn!(step_id = %step_id, attempt, "step failed, retrying after backoff");
            sleep(Duration::from_millis(backoff_ms.saturating_mul(attempt as u64))).await;
        };

        let activity = AgentActivityRecord {
            agent_id: agent.id().to_string(),
            agent_type: agent.agent_type().to_string(),
            metrics: agent.metrics(),
            recorded_at: Utc::now(),
        };
        if let Err(err) = self.metrics_sink.write_agent_activity(activity).await {
            warn!(error = %err, "failed to write agent activity");
        }

        match outcome.status {
            TaskStatus::Success => self.metrics.task_completed(duration_ms(&outcome)),
            TaskStatus::Failure => self.metrics.task_failed(duration_ms(&outcome)),
            TaskStatus::Cancelled => self.metrics.task_cancelled(),
        }

        if let Err(err) = self.remove_agent(agent.id()).await {
            warn!(error = %err, "failed to remove agent after step completion");
        }

        (step_id, outcome)
    }

    /// Validates, then drives a workflow's DAG to completion: dependency
    /// gating, admission-controlled dispatch (bounded by
    /// `max_concurrent_agents`), parallel execution of simultaneously
    /// eligible steps, failure-handler substitution in place of cascading
    /// failure, and cooperative cancellation.
    #[tracing::instrument(skip(self, context), fields(workflow_id = %def.id))]
    pub async fn execute_workflow(&self, def: WorkflowDefinition, context: AgentContext) -> OrchestratorResult<WorkflowInstance> {
        let registered = self.registered_agent_types();
        let report = WorkflowValidator::validate(&def, &registered);
        if !report.valid {
            return Err(OrchestratorError::validation_error(report.errors));
        }

        let instance_id = format!("{}-{}", def.id, Uuid::new_v4());
        let mut instance = WorkflowInstance::new(instance_id.clone(), def.id.clone(), context.clone());
        instance.status = WorkflowStatus::Running;
        self.workflows.register_definition(def.clone());
        self.workflows.upsert_instance(instance.clone());

        let token = CancellationToken::new();
        self.cancellation_tokens.lock().unwrap().insert(instance_id.clone(), token.clone());

        let handler_ids = scheduler::handler_step_ids(&def);
        let mut pending: HashSet<String> = def.steps.iter().map(|s| s.id.clone()).collect();
        let mut force_eligible: HashSet<String> = HashSet::new();
        let mut handler_triggered: HashSet<String> = HashSet::new();
        let mut in_flight: FuturesUnordered<BoxFuture<'_, (String, TaskOutcome)>> = FuturesUnordered::new();

        loop {
            // (1) resolve cascading dependency failures to a fixed point,
            // triggering each failed step's handlers exactly once.
            loop {
                let blocked = scheduler::blocked_by_failed_dependency(&def, &pending, &instance.results, &handler_ids);
                if blocked.is_empty() {
                    break;
                }
                let mut progressed = false;
                for (step_id, failed_dep) in blocked {
                    if !pending.contains(&step_id) {
                        continue;
                    }
                    let dep_step = def.step(&failed_dep).expect("validator guarantees dependency exists");

                    if dep_step.failure_handlers.is_empty() {
                        let dep_outcome = instance.results.get(&failed_dep).cloned().unwrap();
                        instance
                            .results
                            .insert(step_id.clone(), cascade_outcome(&dep_outcome, &failed_dep));
                        pending.remove(&step_id);
                        progressed = true;
                        continue;
                    }

                    let all_handlers_resolved = dep_step
                        .failure_handlers
                        .iter()
                        .all(|h| instance.results.contains_key(h));

                    if !all_handlers_resolved {
                        // A success among the handlers overwrites `failed_dep`'s
                        // result directly (see the dispatch-completion handling
                        // below), so reaching here with `all_handlers_resolved`
                        // false means at least one handler is still running.
                        // Dependents stay pending rather than cascade early.
                        if !handler_triggered.contains(&failed_dep) {
                            handler_triggered.insert(failed_dep.clone());
                            for handler_id in &dep_step.failure_handlers {
                                if pending.contains(handler_id) {
                                    force_eligible.insert(handler_id.clone());
                                }
                            }
                            progressed = true;
                        }
                        continue;
                    }

                    // Every handler has resolved and none of them turned
                    // `failed_dep` back into a success (that would have kept
                    // this pair out of `blocked` entirely) — cascade now.
                    let dep_outcome = instance.results.get(&failed_dep).cloned().unwrap();
                    instance
                        .results
                        .insert(step_id.clone(), cascade_outcome(&dep_outcome, &failed_dep));
                    pending.remove(&step_id);
                    progressed = true;
                }
                if !progressed {
                    break;
                }
            }

            // (2) cancellation cascades to every step that has not started.
            if token.is_cancelled() && !pending.is_empty() {
                let now = Utc::now();
                for step_id in pending.drain() {
                    instance
                        .results
                        .insert(step_id, TaskOutcome::cancelled(Uuid::new_v4(), ORCHESTRATOR, now, now));
                }
                force_eligible.clear();
            }

            // (3) failure-handler steps that were never triggered (their
            // guarded predecessor succeeded) have nothing left to gate them
            // into eligibility once every ordinary step has resolved; drop
            // them from `pending` without producing a result.
            if in_flight.is_empty() {
                let all_non_handlers_resolved = def
                    .steps
                    .iter()
                    .filter(|s| !handler_ids.contains(&s.id))
                    .all(|s| instance.results.contains_key(&s.id));
                if all_non_handlers_resolved {
                    pending.retain(|id| !handler_ids.contains(id));
                }
            }

            // (4) compute this tick's eligible set and dispatch within the
            // admission limit.
            let mut eligible = scheduler::eligible_steps(&def, &pending, &instance.results, &handler_ids);
            for step_id in &force_eligible {
                if pending.contains(step_id) && !eligible.contains(step_id) {
                    eligible.push(step_id.clone());
                }
            }
            eligible.sort_by_key(|id| def.steps.iter().position(|s| &s.id == id).unwrap_or(usize::MAX));

            let paused = self
                .workflows
                .get_instance(&instance_id)
                .map(|i| i.status == WorkflowStatus::Paused)
                .unwrap_or(false);
            instance.status = if paused { WorkflowStatus::Paused } else { WorkflowStatus::Running };

            if !paused {
                for step_id in eligible {
                    if self.live_agents.len() >= self.config.max_concurrent_agents {
                        break;
                    }
                    pending.remove(&step_id);
                    force_eligible.remove(&step_id);
                    let step = def.step(&step_id).expect("eligible step exists in definition").clone();
                    instance.current_step_id = Some(step_id.clone());
                    let step_context = context.clone();
                    let child_token = token.child_token();
                    in_flight.push(Box::pin(self.run_step(step, step_context, child_token)));
                }
            }

            self.workflows.upsert_instance(instance.clone());

            if pending.is_empty() && in_flight.is_empty() {
                break;
            }

            if in_flight.is_empty() {
                // Paused with nothing running: wait briefly and re-check
                // rather than busy-spinning on the registry.
                sleep(Duration::from_millis(20)).await;
                continue;
            }

            if let Some((step_id, outcome)) = in_flight.next().await {
                if handler_ids.contains(&step_id) && outcome.is_success() {
                    for s in &def.steps {
                        if s.failure_handlers.contains(&step_id) {
                            instance.results.insert(s.id.clone(), outcome.clone());
                        }
                    }
                }
                instance.results.insert(step_id, outcome);
            }
        }

        let all_steps_resolved = def
            .steps
            .iter()
            .filter(|s| !handler_ids.contains(&s.id))
            .all(|s| instance.results.contains_key(&s.id));
        let any_failure = instance.results.values().any(|r| !r.is_success());

        let final_status = if token.is_cancelled() {
            WorkflowStatus::Cancelled
        } else if all_steps_resolved && !any_failure {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        let error = if final_status == WorkflowStatus::Failed {
            Some("one or more steps did not complete successfully".to_string())
        } else {
            None
        };
        instance.transition_to(final_status, error);
        instance.current_step_id = None;
        self.workflows.upsert_instance(instance.clone());
        self.cancellation_tokens.lock().unwrap().remove(&instance_id);

        if let Err(err) = self.metrics_sink.write_workflow_instance(instance.clone()).await {
            warn!(error = %err, "failed to persist workflow instance");
        }

        Ok(instance)
    }

    /// Aborts the pumps, shuts down every live agent, clears both
    /// registries, and emits a final broadcast so any still-attached
    /// subscriber observes the shutdown in the bus log. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) -> OrchestratorResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, OrchestratorState::ShutDown) {
                return Ok(());
            }
            *state = OrchestratorState::ShutDown;
        }

        for handle in self.pump_handles.lock().unwrap().drain(..) {
            handle.abort();
        }

        if let Some(handler_id) = self.router_handler_id.lock().unwrap().take() {
            self.bus.unsubscribe(handler_id);
        }

        for agent in self.live_agents.clear() {
            agent.shutdown().await;
            self.metrics.agent_removed();
        }

        self.workflows.clear();
        self.cancellation_tokens.lock().unwrap().clear();

        self.bus
            .publish(AgentMessage::new(
                ORCHESTRATOR,
                BROADCAST,
                MessageType::Status,
                "orchestrator:shutdown",
                serde_json::Value::Null,
            ))
            .await;

        info!("orchestrator shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowStep;
    use crate::testing::mocks::{MockExternalServices, MockMetricsSink, MockModelGateway};

    fn test_orchestrator() -> Orchestrator {
        let orchestrator = Orchestrator::new(OrchestratorConfig::test_config(), Arc::new(MockMetricsSink::new()));
        orchestrator.register_reference_agents(
            Arc::new(MockModelGateway::passthrough()),
            Arc::new(MockExternalServices::with_candidates(vec![])),
        );
        orchestrator
    }

    #[tokio::test]
    async fn single_step_workflow_completes_successfully() {
        let orchestrator = test_orchestrator();
        orchestrator.initialize().await.unwrap();

        let def = WorkflowDefinition::new(
            "wf-single",
            "demo",
            vec![WorkflowStep::new("find", "sourcing", "candidate_search")
                .with_input(serde_json::json!({}))],
        );
        let instance = orchestrator
            .execute_workflow(def, AgentContext::new("u", "s"))
            .await
            .unwrap();

        assert_eq!(instance.status, WorkflowStatus::Completed);
        assert!(instance.results["find"].is_success());
        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn two_step_dependency_runs_in_order() {
        let orchestrator = test_orchestrator();
        orchestrator.initialize().await.unwrap();

        let def = WorkflowDefinition::new(
            "wf-dep",
            "demo",
            vec![
                WorkflowStep::new("find", "sourcing", "candidate_search").with_input(serde_json::json!({})),
                WorkflowStep::new("enrich", "enrichment", "enrichment")
                    .with_dependencies(vec!["find"])
                    .with_input(serde_json::json!({"candidates": []})),
            ],
        );
        let instance = orchestrator
            .execute_workflow(def, AgentContext::new("u", "s"))
            .await
            .unwrap();

        assert_eq!(instance.status, WorkflowStatus::Completed);
        assert!(instance.results["find"].is_success());
        assert!(instance.results["enrich"].is_success());
        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dependency_failure_cascades_without_handler() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::test_config(), Arc::new(MockMetricsSink::new()));
        orchestrator.register_reference_agents(
            Arc::new(MockModelGateway::failing("search down")),
            Arc::new(MockExternalServices::failing()),
        );
        orchestrator.initialize().await.unwrap();

        let def = WorkflowDefinition::new(
            "wf-cascade",
            "demo",
            vec![
                WorkflowStep::new("find", "sourcing", "candidate_search").with_input(serde_json::json!({})),
                WorkflowStep::new("enrich", "enrichment", "enrichment")
                    .with_dependencies(vec!["find"])
                    .with_input(serde_json::json!({"candidates": []})),
            ],
        );
        let instance = orchestrator
            .execute_workflow(def, AgentContext::new("u", "s"))
            .await
            .unwrap();

        assert_eq!(instance.status, WorkflowStatus::Failed);
        assert_eq!(instance.results["find"].status, TaskStatus::Failure);
        assert_eq!(instance.results["enrich"].status, TaskStatus::Failure);
        assert_eq!(instance.results["enrich"].error.as_deref(), Some("dependency_unsatisfied: dependency 'find' did not complete successfully"));
        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failure_handler_step_runs_instead_of_cascading() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::test_config(), Arc::new(MockMetricsSink::new()));
        orchestrator.register_reference_agents(
            Arc::new(MockModelGateway::failing("search down")),
            Arc::new(MockExternalServices::failing()),
        );
        orchestrator.initialize().await.unwrap();

        let def = WorkflowDefinition::new(
            "wf-handler",
            "demo",
            vec![
                WorkflowStep {
                    failure_handlers: vec!["recover".to_string()],
                    ..WorkflowStep::new("find", "sourcing", "candidate_search").with_input(serde_json::json!({}))
                },
                WorkflowStep::new("recover", "planning", "planning").with_input(serde_json::json!({"role": "x"})),
                WorkflowStep::new("finish", "planning", "planning")
                    .with_dependencies(vec!["find"])
                    .with_input(serde_json::json!({"role": "y"})),
            ],
        );
        let instance = orchestrator
            .execute_workflow(def, AgentContext::new("u", "s"))
            .await
            .unwrap();

        assert!(instance.results["recover"].is_success());
        // The handler's success is copied onto the guarded step's slot, so
        // `finish` (which depends on `find`) becomes eligible and succeeds.
        assert!(instance.results["find"].is_success());
        assert!(instance.results["finish"].is_success());
        assert_eq!(instance.status, WorkflowStatus::Completed);
        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn describe_agent_reports_a_live_agent_snapshot() {
        let orchestrator = test_orchestrator();
        let ctx = AgentContext::new("u", "s");
        let agent = orchestrator.create_agent("sourcing", &ctx).await.unwrap();

        let descriptor = orchestrator.describe_agent(agent.id()).unwrap();
        assert_eq!(descriptor.id, agent.id());
        assert_eq!(descriptor.agent_type, "sourcing");
        assert_eq!(orchestrator.live_agent_descriptors().len(), 1);

        orchestrator.remove_agent(agent.id()).await.unwrap();
        assert!(orchestrator.describe_agent(agent.id()).is_none());
    }

    #[tokio::test]
    async fn capacity_exceeded_is_reported_by_create_agent() {
        let orchestrator = test_orchestrator();
        let ctx = AgentContext::new("u", "s");
        let mut held = Vec::new();
        for _ in 0..5 {
            held.push(orchestrator.create_agent("sourcing", &ctx).await.unwrap());
        }
        let err = orchestrator.create_agent("sourcing", &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "capacity_exceeded");
    }

    #[tokio::test]
    async fn cancel_workflow_mid_flight_cancels_pending_steps() {
        let orchestrator = test_orchestrator();
        orchestrator.initialize().await.unwrap();

        let def = WorkflowDefinition::new(
            "wf-cancel",
            "demo",
            vec![
                WorkflowStep::new("find", "sourcing", "candidate_search"),
                WorkflowStep::new("plan", "planning", "planning")
                    .with_dependencies(vec!["find"])
                    .with_input(serde_json::json!({"role": "x"})),
            ],
        );
        orchestrator.register_agent_factory(
            "sourcing",
            Arc::new(|id, outbound| {
                struct NeverHandles;
                #[async_trait::async_trait]
                impl crate::agent::AgentBehavior for NeverHandles {
                    fn agent_type(&self) -> &str {
                        "sourcing"
                    }
                    fn capabilities(&self) -> Vec<crate::model::AgentCapability> {
                        vec![]
                    }
                    fn can_handle(&self, _task_type: &str) -> bool {
                        true
                    }
                    async fn run_task(
                        &self,
                        _task: &crate::model::AgentTask,
                        _context: &AgentContext,
                        _cancellation: &CancellationToken,
                    ) -> OrchestratorResult<serde_json::Value> {
                        // Never resolves on its own; only the outer
                        // cancellation race in `process_task` can end this,
                        // so the outcome is deterministically `Cancelled`.
                        futures::future::pending::<()>().await;
                        unreachable!()
                    }
                }
                Arc::new(AgentRuntime::new(id, NeverHandles, outbound)) as Arc<dyn DynAgent>
            }),
        );

        let orchestrator = Arc::new(orchestrator);
        let bg = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute_workflow(def, AgentContext::new("u", "s")).await })
        };

        // Give the workflow a moment to dispatch `find`, then cancel it via
        // its live cancellation token.
        let instance_id = loop {
            if let Some(id) = orchestrator.active_instance_ids().into_iter().next() {
                break id;
            }
            sleep(Duration::from_millis(5)).await;
        };
        orchestrator.cancel_workflow(&instance_id).unwrap();

        let instance = bg.await.unwrap().unwrap();
        assert_eq!(instance.status, WorkflowStatus::Cancelled);
        assert_eq!(instance.results["find"].status, TaskStatus::Cancelled);
        assert_eq!(instance.results["plan"].status, TaskStatus::Cancelled);
        orchestrator.shutdown().await.unwrap();
    }
}
