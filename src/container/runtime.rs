use crate::utils::error_handling::{ControllerError, ControllerResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Marks instances launched by this controller
pub const MANAGED_LABEL: &str = "inferctl.managed";
/// Model identity the instance was launched with
pub const MODEL_LABEL: &str = "inferctl.model";
/// Artifact file name the instance was launched with
pub const ARTIFACT_LABEL: &str = "inferctl.artifact";

/// Name of a managed instance, threaded through every lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    pub const DEFAULT: &'static str = "inferctl-server";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of the managed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No instance record exists
    Absent,
    /// Instance is running
    Running,
    /// Instance record exists but the process has exited
    Exited,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Absent => "absent",
            LifecycleState::Running => "running",
            LifecycleState::Exited => "exited",
        };
        f.write_str(label)
    }
}

/// Everything the runtime needs to launch the instance
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub name: InstanceId,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub cpus: f64,
    pub memory_mb: u32,
    /// Host directory mounted read-only into the instance
    pub mount_source: PathBuf,
    pub mount_point: String,
    pub labels: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
    pub args: Vec<String>,
}

/// What the runtime reports about an existing instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub id: String,
    pub name: String,
    pub state: LifecycleState,
    pub labels: BTreeMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// The external container runtime boundary
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Launch a detached instance, returning its runtime id
    async fn launch(&self, spec: &LaunchSpec) -> ControllerResult<String>;

    /// Gracefully stop the instance, waiting at most `timeout` before it is killed
    async fn stop(&self, name: &InstanceId, timeout: Duration) -> ControllerResult<()>;

    /// Remove the instance record so the name can be reused
    async fn remove(&self, name: &InstanceId) -> ControllerResult<()>;

    /// Look up the instance; `None` when no record exists
    async fn inspect(&self, name: &InstanceId) -> ControllerResult<Option<InstanceRecord>>;

    /// Recent log output of the instance
    async fn logs(&self, name: &InstanceId, _tail: Option<u32>) -> ControllerResult<String> {
        Err(ControllerError::runtime(&format!(
            "Reading logs of '{}' is not supported by this runtime",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id() {
        assert_eq!(InstanceId::default().as_str(), "inferctl-server");
        assert_eq!(InstanceId::new("custom").to_string(), "custom");
    }

    #[test]
    fn test_lifecycle_state_serialization() {
        let json = serde_json::to_string(&LifecycleState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(LifecycleState::Exited.to_string(), "exited");
    }
}
