//! The orchestrator's exclusively-owned map of running agent instances,
//! mirroring `workflow::registry`'s storage-by-id shape but over live
//! `DynAgent` handles instead of serializable records.

use crate::agent::DynAgent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct LiveAgentRegistry {
    agents: Mutex<HashMap<String, Arc<dyn DynAgent>>>,
}

impl LiveAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Arc<dyn DynAgent>) {
        self.agents.lock().unwrap().insert(agent.id().to_string(), agent);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn DynAgent>> {
        self.agents.lock().unwrap().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn DynAgent>> {
        self.agents.lock().unwrap().remove(id)
    }

    pub fn len(&self) -> usize {
        self.agents.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<dyn DynAgent>> {
        self.agents.lock().unwrap().values().cloned().collect()
    }

    /// Drains the registry, returning every agent that was live so the
    /// caller can shut each one down.
    pub fn clear(&self) -> Vec<Arc<dyn DynAgent>> {
        self.agents.lock().unwrap().drain().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentOutbound, AgentRuntime};
    use crate::testing::mocks::MockModelGateway;
    use crate::agent::SourcingAgent;
    use crate::testing::mocks::MockExternalServices;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn dummy_agent(id: &str) -> Arc<dyn DynAgent> {
        let (tx, _rx): (mpsc::Sender<AgentOutbound>, mpsc::Receiver<AgentOutbound>) = mpsc::channel(8);
        let behavior = SourcingAgent::new(
            Arc::new(MockModelGateway::passthrough()),
            Arc::new(MockExternalServices::with_candidates(vec![])),
        );
        Arc::new(AgentRuntime::new(id, behavior, tx))
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let registry = LiveAgentRegistry::new();
        registry.insert(dummy_agent("a-1"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("a-1").is_some());
        assert!(registry.remove("a-1").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_drains_all_agents() {
        let registry = LiveAgentRegistry::new();
        registry.insert(dummy_agent("a-1"));
        registry.insert(dummy_agent("a-2"));
        let drained = registry.clear();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }
}
