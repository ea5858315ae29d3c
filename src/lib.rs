//! Lifecycle controller for a single local containerized model server.
//!
//! Starts, stops and restarts one named container instance, probes its readiness
//! endpoint under a bounded retry policy, and detects when the running model differs
//! from the default declared in the configuration file.

pub mod commands;
pub mod config;
pub mod container;
pub mod drift;
pub mod model;
pub mod utils;


use crate::commands::CommandHandler;
use crate::config::{ConfigStore, Settings};
use crate::container::{
    ContainerManager, ContainerRuntime, HealthProber, HttpReadiness, InstanceId, RetryPolicy,
};
use crate::utils::ControllerResult;

/// Wire the components together for the given settings and runtime
pub fn build_handler<R: ContainerRuntime>(
    store: ConfigStore,
    settings: &Settings,
    runtime: R,
    instance: Option<InstanceId>,
) -> ControllerResult<CommandHandler<R>> {
    let instance = instance.unwrap_or_else(|| InstanceId::new(settings.instance.name.clone()));
    let manager = ContainerManager::from_settings(runtime, settings);
    let readiness = HttpReadiness::from_settings(&settings.instance, &settings.health)?;
    let prober = HealthProber::new(RetryPolicy::from_settings(&settings.health));

    Ok(CommandHandler::new(store, manager, Box::new(readiness), prober, instance))
}
