use super::types::{Command, ModelLine, Report, StatusReport};
use crate::config::resolver::{resolve_desired_model, ConfigStore};
use crate::container::health::{HealthProber, HealthStatus, ProbeReport, ReadinessCheck, RetryPolicy};
use crate::container::manager::{ContainerManager, ObservedState};
use crate::container::runtime::{ContainerRuntime, InstanceId};
use crate::drift::detector::{classify, DriftDetector};
use crate::utils::error_handling::{ControllerError, ControllerResult};
use log::{debug, info};

/// Routes operator commands to the lifecycle components
pub struct CommandHandler<R: ContainerRuntime> {
    store: ConfigStore,
    manager: ContainerManager<R>,
    readiness: Box<dyn ReadinessCheck>,
    prober: HealthProber,
    instance: InstanceId,
    wait_for_health: bool,
}

impl<R: ContainerRuntime> CommandHandler<R> {
    pub fn new(
        store: ConfigStore,
        manager: ContainerManager<R>,
        readiness: Box<dyn ReadinessCheck>,
        prober: HealthProber,
        instance: InstanceId,
    ) -> Self {
        Self {
            store,
            manager,
            readiness,
            prober,
            instance,
            wait_for_health: true,
        }
    }

    /// Skip readiness probing after start, restart and check
    pub fn with_wait_for_health(mut self, wait: bool) -> Self {
        self.wait_for_health = wait;
        self
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn manager(&self) -> &ContainerManager<R> {
        &self.manager
    }

    /// Execute one command
    pub async fn handle(&self, command: Command) -> ControllerResult<Report> {
        debug!("Handling command: {:?}", command);

        match command {
            Command::Start { model } => {
                let model = resolve_desired_model(model.as_deref(), &self.store)?;
                let instance = self.manager.start(&self.instance, &model).await?;
                let health = self.await_ready().await?;
                Ok(Report::Started { instance, health })
            }
            Command::Restart { model } => {
                let model = resolve_desired_model(model.as_deref(), &self.store)?;
                let instance = self.manager.restart(&self.instance, &model).await?;
                let health = self.await_ready().await?;
                Ok(Report::Restarted { instance, health })
            }
            Command::Stop => {
                let removed = self.manager.stop(&self.instance).await?;
                Ok(Report::Stopped {
                    instance: self.instance.to_string(),
                    removed,
                })
            }
            Command::Status => self.status().await.map(Report::Status),
            Command::Check => {
                let detector = DriftDetector::new(&self.manager, &self.store);
                let remediation = detector.check_and_fix(&self.instance).await?;
                let health = if remediation.acted() {
                    self.await_ready().await?
                } else {
                    None
                };
                Ok(Report::Checked { remediation, health })
            }
            Command::Models => {
                let models = self
                    .manager
                    .resolver()
                    .list_models()?
                    .into_iter()
                    .map(|entry| match entry.asset {
                        Ok(asset) => ModelLine {
                            name: entry.name,
                            artifact: Some(asset.file_name),
                            error: None,
                        },
                        Err(e) => ModelLine {
                            name: entry.name,
                            artifact: None,
                            error: Some(e.to_string()),
                        },
                    })
                    .collect();
                Ok(Report::Models { models })
            }
            Command::Logs { tail } => {
                let output = self.manager.logs(&self.instance, tail).await?;
                Ok(Report::Logs {
                    instance: self.instance.to_string(),
                    output,
                })
            }
        }
    }

    /// Probe readiness after a launch; an instance that never becomes ready is a hard failure
    async fn await_ready(&self) -> ControllerResult<Option<ProbeReport>> {
        if !self.wait_for_health {
            info!("Not waiting for {} to become ready", self.instance);
            return Ok(None);
        }

        let report = self.prober.probe(self.readiness.as_ref()).await;
        if !report.is_healthy() {
            return Err(ControllerError::Unhealthy {
                instance: self.instance.to_string(),
                attempts: report.attempts,
            });
        }
        Ok(Some(report))
    }

    async fn status(&self) -> ControllerResult<StatusReport> {
        let observed = self.manager.introspect(&self.instance).await?;
        let desired = self.store.default_model()?;
        let started_at = self.manager.started_at(&self.instance).await?;

        let drift = classify(&self.instance, desired.as_deref(), &observed).ok();
        let health = if observed.is_running() {
            let single = HealthProber::new(RetryPolicy::single());
            single.probe(self.readiness.as_ref()).await.status
        } else {
            HealthStatus::Unknown
        };

        let unknown_reason = match &observed {
            ObservedState::Unknown { reason, .. } => Some(reason.clone()),
            _ => None,
        };

        Ok(StatusReport {
            instance: self.instance.to_string(),
            state: observed.lifecycle(),
            started_at,
            model: observed.model().map(str::to_string),
            unknown_reason,
            desired,
            drift,
            health,
        })
    }
}
