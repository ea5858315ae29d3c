//! In-memory container runtime for tests.

use super::runtime::{ContainerRuntime, InstanceId, InstanceRecord, LaunchSpec, LifecycleState};
use crate::utils::error_handling::{ControllerError, ControllerResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    instances: BTreeMap<String, InstanceRecord>,
    launches: Vec<LaunchSpec>,
    calls: Vec<String>,
    next_id: u32,
    fail_launch: bool,
}

/// Records every call and keeps instances in a map keyed by name.
///
/// Clones share state, so a test can keep a handle while the manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_launches(&self, fail: bool) {
        self.state.lock().unwrap().fail_launch = fail;
    }

    /// Insert an instance that was not launched through the controller
    pub fn insert_foreign(&self, name: &str, state: LifecycleState) {
        let record = InstanceRecord {
            id: format!("foreign-{}", name),
            name: name.to_string(),
            state,
            labels: BTreeMap::new(),
            started_at: Some(Utc::now()),
        };
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(name.to_string(), record);
    }

    /// Simulate the server process exiting on its own
    pub fn mark_exited(&self, name: &str) {
        if let Some(record) = self.state.lock().unwrap().instances.get_mut(name) {
            record.state = LifecycleState::Exited;
        }
    }

    pub fn instance_count(&self) -> usize {
        self.state.lock().unwrap().instances.len()
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> ControllerResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("launch {}", spec.name));

        if state.fail_launch {
            return Err(ControllerError::launch(spec.name.as_str(), "mock launch failure"));
        }
        if state.instances.contains_key(spec.name.as_str()) {
            return Err(ControllerError::launch(
                spec.name.as_str(),
                "container name is already in use",
            ));
        }

        state.next_id += 1;
        let id = format!("mock-{}", state.next_id);
        state.instances.insert(
            spec.name.to_string(),
            InstanceRecord {
                id: id.clone(),
                name: spec.name.to_string(),
                state: LifecycleState::Running,
                labels: spec.labels.clone(),
                started_at: Some(Utc::now()),
            },
        );
        state.launches.push(spec.clone());
        Ok(id)
    }

    async fn stop(&self, name: &InstanceId, _timeout: Duration) -> ControllerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("stop {}", name));
        if let Some(record) = state.instances.get_mut(name.as_str()) {
            record.state = LifecycleState::Exited;
        }
        Ok(())
    }

    async fn remove(&self, name: &InstanceId) -> ControllerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("remove {}", name));
        state.instances.remove(name.as_str());
        Ok(())
    }

    async fn inspect(&self, name: &InstanceId) -> ControllerResult<Option<InstanceRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.instances.get(name.as_str()).cloned())
    }

    async fn logs(&self, name: &InstanceId, _tail: Option<u32>) -> ControllerResult<String> {
        let state = self.state.lock().unwrap();
        match state.instances.get(name.as_str()) {
            Some(record) => Ok(format!("server {} listening\n", record.id)),
            None => Err(ControllerError::runtime(&format!("No such container: {}", name))),
        }
    }
}
