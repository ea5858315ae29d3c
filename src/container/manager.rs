use super::runtime::{
    ContainerRuntime, InstanceId, LaunchSpec, LifecycleState, ARTIFACT_LABEL, MANAGED_LABEL,
    MODEL_LABEL,
};
use crate::config::settings::{InstanceSettings, Settings};
use crate::model::assets::{AssetPath, ModelAssetResolver};
use crate::utils::error_handling::ControllerResult;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;

/// What is actually running, read back from the instance's labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObservedState {
    /// No instance record exists
    Absent,
    /// Instance launched by this controller
    Present {
        state: LifecycleState,
        model: String,
    },
    /// Instance exists but carries no model identity
    Unknown {
        state: LifecycleState,
        reason: String,
    },
}

impl ObservedState {
    pub fn lifecycle(&self) -> LifecycleState {
        match self {
            ObservedState::Absent => LifecycleState::Absent,
            ObservedState::Present { state, .. } | ObservedState::Unknown { state, .. } => *state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == LifecycleState::Running
    }

    /// Model identity, if known
    pub fn model(&self) -> Option<&str> {
        match self {
            ObservedState::Present { model, .. } => Some(model),
            _ => None,
        }
    }
}

/// Result of a successful launch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedInstance {
    pub instance: String,
    pub container_id: String,
    pub model: String,
    pub artifact: String,
}

/// Starts, stops and inspects the managed instance through a container runtime
pub struct ContainerManager<R: ContainerRuntime> {
    runtime: R,
    config: InstanceSettings,
    resolver: ModelAssetResolver,
    settle_delay: Duration,
}

impl<R: ContainerRuntime> ContainerManager<R> {
    pub fn new(
        runtime: R,
        config: InstanceSettings,
        resolver: ModelAssetResolver,
        settle_delay: Duration,
    ) -> Self {
        Self {
            runtime,
            config,
            resolver,
            settle_delay,
        }
    }

    pub fn from_settings(runtime: R, settings: &Settings) -> Self {
        Self::new(
            runtime,
            settings.instance.clone(),
            ModelAssetResolver::from_settings(settings),
            settings.settle_delay(),
        )
    }

    pub fn resolver(&self) -> &ModelAssetResolver {
        &self.resolver
    }

    /// Current lifecycle state of the instance
    pub async fn state(&self, instance: &InstanceId) -> ControllerResult<LifecycleState> {
        Ok(self
            .runtime
            .inspect(instance)
            .await?
            .map(|record| record.state)
            .unwrap_or(LifecycleState::Absent))
    }

    /// When the instance was last started, if the runtime knows
    pub async fn started_at(&self, instance: &InstanceId) -> ControllerResult<Option<DateTime<Utc>>> {
        Ok(self
            .runtime
            .inspect(instance)
            .await?
            .and_then(|record| record.started_at))
    }

    /// Launch `model`, replacing whatever instance currently holds the name.
    ///
    /// The asset and launch spec are resolved before the existing instance is touched. Returns as soon
    /// as the runtime accepts the launch; readiness is the prober's concern.
    pub async fn start(&self, instance: &InstanceId, model: &str) -> ControllerResult<StartedInstance> {
        let asset = self.resolver.resolve_asset(model)?;
        let spec = self.launch_spec(instance, &asset)?;

        match self.state(instance).await? {
            LifecycleState::Running => {
                info!("Instance {} is already running, replacing it", instance);
                self.stop(instance).await?;
            }
            LifecycleState::Exited => {
                debug!("Removing exited instance {}", instance);
                self.runtime.remove(instance).await?;
            }
            LifecycleState::Absent => {}
        }

        info!(
            "Starting instance {} with model {} ({})",
            instance, asset.model, asset.instance_path
        );
        let container_id = self.runtime.launch(&spec).await?;

        Ok(StartedInstance {
            instance: instance.to_string(),
            container_id,
            model: asset.model,
            artifact: asset.file_name,
        })
    }

    /// Stop and remove the instance. Returns `false` if there was nothing to remove.
    pub async fn stop(&self, instance: &InstanceId) -> ControllerResult<bool> {
        match self.state(instance).await? {
            LifecycleState::Absent => {
                debug!("Instance {} is not present, nothing to stop", instance);
                return Ok(false);
            }
            LifecycleState::Running => {
                info!("Stopping instance {}", instance);
                let timeout = Duration::from_secs(self.config.stop_timeout_secs);
                self.runtime.stop(instance, timeout).await?;
            }
            LifecycleState::Exited => {}
        }

        self.runtime.remove(instance).await?;
        info!("Instance {} removed", instance);
        Ok(true)
    }

    /// Stop, wait the settle delay, then start. Not atomic: a failure in between leaves
    /// the instance absent, which a later `start` recovers from.
    pub async fn restart(&self, instance: &InstanceId, model: &str) -> ControllerResult<StartedInstance> {
        self.stop(instance).await?;
        if !self.settle_delay.is_zero() {
            debug!("Waiting {:?} before starting {}", self.settle_delay, instance);
            sleep(self.settle_delay).await;
        }
        self.start(instance, model).await
    }

    /// Read back the model identity the instance was launched with
    pub async fn introspect(&self, instance: &InstanceId) -> ControllerResult<ObservedState> {
        let Some(record) = self.runtime.inspect(instance).await? else {
            return Ok(ObservedState::Absent);
        };

        let observed = match record.label(MODEL_LABEL).map(str::trim) {
            Some(model) if !model.is_empty() => ObservedState::Present {
                state: record.state,
                model: model.to_string(),
            },
            _ => {
                let reason = if record.label(MANAGED_LABEL).is_some() {
                    format!("label {} is empty", MODEL_LABEL)
                } else {
                    "instance was not launched by inferctl".to_string()
                };
                warn!("Cannot determine model of {}: {}", instance, reason);
                ObservedState::Unknown {
                    state: record.state,
                    reason,
                }
            }
        };
        Ok(observed)
    }

    pub async fn logs(&self, instance: &InstanceId, tail: Option<u32>) -> ControllerResult<String> {
        self.runtime.logs(instance, tail).await
    }

    fn launch_spec(&self, instance: &InstanceId, asset: &AssetPath) -> ControllerResult<LaunchSpec> {
        let mount_source = std::fs::canonicalize(self.resolver.models_root())?;

        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(MODEL_LABEL.to_string(), asset.model.clone());
        labels.insert(ARTIFACT_LABEL.to_string(), asset.file_name.clone());

        Ok(LaunchSpec {
            name: instance.clone(),
            image: self.config.image.clone(),
            host_port: self.config.host_port,
            container_port: self.config.container_port,
            cpus: self.config.cpus,
            memory_mb: self.config.memory_mb,
            mount_source,
            mount_point: self.config.mount_point.clone(),
            labels,
            environment: self.config.environment.clone(),
            args: self.config.render_launch_args(&asset.instance_path),
        })
    }
}
