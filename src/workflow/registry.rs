//! Template storage for workflow definitions and the last known instance
//! per workflow id, so `pauseWorkflow`/`resumeWorkflow`/`cancelWorkflow`
//! can be addressed by a bare id.

use crate::model::{WorkflowDefinition, WorkflowInstance};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct WorkflowRegistry {
    definitions: Mutex<HashMap<String, WorkflowDefinition>>,
    instances: Mutex<HashMap<String, WorkflowInstance>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_definition(&self, def: WorkflowDefinition) {
        self.definitions.lock().unwrap().insert(def.id.clone(), def);
    }

    pub fn get_definition(&self, id: &str) -> Option<WorkflowDefinition> {
        self.definitions.lock().unwrap().get(id).cloned()
    }

    pub fn upsert_instance(&self, instance: WorkflowInstance) {
        self.instances.lock().unwrap().insert(instance.id.clone(), instance);
    }

    pub fn get_instance(&self, id: &str) -> Option<WorkflowInstance> {
        self.instances.lock().unwrap().get(id).cloned()
    }

    pub fn remove_instance(&self, id: &str) -> Option<WorkflowInstance> {
        self.instances.lock().unwrap().remove(id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.definitions.lock().unwrap().clear();
        self.instances.lock().unwrap().clear();
    }
}
