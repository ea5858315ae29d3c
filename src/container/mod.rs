pub mod runtime;
pub mod docker;
pub mod manager;
pub mod health;
#[cfg(test)]
pub mod mock;

pub use runtime::{ContainerRuntime, InstanceId, InstanceRecord, LaunchSpec, LifecycleState};
pub use docker::DockerCli;
pub use manager::{ContainerManager, ObservedState, StartedInstance};
pub use health::{HealthProber, HealthStatus, HttpReadiness, ProbeReport, ReadinessCheck, RetryPolicy};
