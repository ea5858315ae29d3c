use crate::config::resolver::ConfigStore;
use crate::container::manager::{ContainerManager, ObservedState, StartedInstance};
use crate::container::runtime::{ContainerRuntime, InstanceId};
use crate::utils::error_handling::{ControllerError, ControllerResult};
use log::{info, warn};
use serde::Serialize;

/// Outcome of comparing the declared model with the running one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriftStatus {
    Consistent { model: String },
    Drifted { desired: String, observed: String },
    NoInstanceRunning,
    NoConfiguration,
}

/// What `check_and_fix` did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Remediation {
    /// Nothing to do
    None { status: DriftStatus },
    /// No instance was running; the desired model was started
    Started { instance: StartedInstance },
    /// The wrong model was running; the instance was restarted
    Restarted {
        previous: String,
        instance: StartedInstance,
    },
}

impl Remediation {
    pub fn acted(&self) -> bool {
        !matches!(self, Remediation::None { .. })
    }
}

/// Compare a declared model with an observed state.
///
/// An instance that is absent or exited counts as not running, regardless of configuration.
pub fn classify(
    instance: &InstanceId,
    desired: Option<&str>,
    observed: &ObservedState,
) -> ControllerResult<DriftStatus> {
    if !observed.is_running() {
        return Ok(DriftStatus::NoInstanceRunning);
    }

    let Some(desired) = desired else {
        return Ok(DriftStatus::NoConfiguration);
    };

    match observed {
        ObservedState::Present { model, .. } if model == desired => Ok(DriftStatus::Consistent {
            model: model.clone(),
        }),
        ObservedState::Present { model, .. } => Ok(DriftStatus::Drifted {
            desired: desired.to_string(),
            observed: model.clone(),
        }),
        ObservedState::Unknown { reason, .. } => Err(ControllerError::Unknown {
            instance: instance.to_string(),
            reason: reason.clone(),
        }),
        ObservedState::Absent => Ok(DriftStatus::NoInstanceRunning),
    }
}

/// Detects and repairs divergence between the persisted default model and the running instance
pub struct DriftDetector<'a, R: ContainerRuntime> {
    manager: &'a ContainerManager<R>,
    store: &'a ConfigStore,
}

impl<'a, R: ContainerRuntime> DriftDetector<'a, R> {
    pub fn new(manager: &'a ContainerManager<R>, store: &'a ConfigStore) -> Self {
        Self { manager, store }
    }

    /// Compare the persisted default (never an explicit override) against the instance
    pub async fn check_consistency(&self, instance: &InstanceId) -> ControllerResult<DriftStatus> {
        let desired = self.store.default_model()?;
        let observed = self.manager.introspect(instance).await?;
        classify(instance, desired.as_deref(), &observed)
    }

    /// Bring the instance in line with the persisted default.
    ///
    /// Running this twice in a row leaves the second run with nothing to do.
    pub async fn check_and_fix(&self, instance: &InstanceId) -> ControllerResult<Remediation> {
        match self.check_consistency(instance).await? {
            DriftStatus::NoInstanceRunning => {
                let desired = self.store.default_model()?.ok_or_else(|| ControllerError::NoConfiguration {
                    config: self.store.path().display().to_string(),
                })?;
                info!("No instance running, starting {}", desired);
                let started = self.manager.start(instance, &desired).await?;
                Ok(Remediation::Started { instance: started })
            }
            DriftStatus::Drifted { desired, observed } => {
                warn!("Drift detected: desired {}, running {}", desired, observed);
                let started = self.manager.restart(instance, &desired).await?;
                Ok(Remediation::Restarted {
                    previous: observed,
                    instance: started,
                })
            }
            status @ DriftStatus::Consistent { .. } => Ok(Remediation::None { status }),
            DriftStatus::NoConfiguration => {
                warn!("Instance {} is running but no default model is configured", instance);
                Ok(Remediation::None {
                    status: DriftStatus::NoConfiguration,
                })
            }
        }
    }
}
