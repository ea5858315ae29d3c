use super::runtime::{ContainerRuntime, InstanceId, InstanceRecord, LaunchSpec, LifecycleState};
use crate::utils::error_handling::{ControllerError, ControllerResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Container runtime backed by the `docker` command line
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a different docker-compatible binary, e.g. `podman`
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, args: &[String]) -> std::io::Result<Output> {
        debug!("Running {} {}", self.binary, args.join(" "));
        Command::new(&self.binary).args(args).output().await
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `docker run` argument list for a launch
pub fn run_args(spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.to_string(),
        "-p".to_string(),
        format!("{}:{}", spec.host_port, spec.container_port),
        "--cpus".to_string(),
        format!("{}", spec.cpus),
        "-m".to_string(),
        format!("{}m", spec.memory_mb),
        "-v".to_string(),
        format!("{}:{}:ro", spec.mount_source.display(), spec.mount_point),
    ];

    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }

    for (key, value) in &spec.environment {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(spec.image.clone());
    args.extend(spec.args.iter().cloned());
    args
}

fn is_missing(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    name: String,
    state: InspectState,
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    #[serde(default)]
    started_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

/// Decode `docker inspect` output into an instance record
pub fn parse_inspect(stdout: &str) -> ControllerResult<Option<InstanceRecord>> {
    let entries: Vec<InspectEntry> = serde_json::from_str(stdout)?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(None);
    };

    let state = match entry.state.status.as_str() {
        "running" | "restarting" | "paused" => LifecycleState::Running,
        _ => LifecycleState::Exited,
    };
    let started_at = entry
        .state
        .started_at
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Ok(Some(InstanceRecord {
        id: entry.id,
        name: entry.name.trim_start_matches('/').to_string(),
        state,
        labels: entry.config.labels.unwrap_or_default(),
        started_at,
    }))
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn launch(&self, spec: &LaunchSpec) -> ControllerResult<String> {
        let name = spec.name.as_str();
        let output = self
            .exec(&run_args(spec))
            .await
            .map_err(|e| ControllerError::launch(name, &format!("Failed to execute docker run: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControllerError::launch(name, stderr.trim()));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            return Err(ControllerError::launch(name, "No container ID returned from docker run"));
        }

        info!("Launched container {} ({})", name, container_id);
        Ok(container_id)
    }

    async fn stop(&self, name: &InstanceId, timeout: Duration) -> ControllerResult<()> {
        let args = vec![
            "stop".to_string(),
            "-t".to_string(),
            timeout.as_secs().to_string(),
            name.to_string(),
        ];
        let output = self
            .exec(&args)
            .await
            .map_err(|e| ControllerError::runtime(&format!("Failed to execute docker stop: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && !is_missing(&stderr) {
            return Err(ControllerError::runtime(&format!("Docker stop failed: {}", stderr.trim())));
        }
        Ok(())
    }

    async fn remove(&self, name: &InstanceId) -> ControllerResult<()> {
        let args = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
        let output = self
            .exec(&args)
            .await
            .map_err(|e| ControllerError::runtime(&format!("Failed to execute docker rm: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && !is_missing(&stderr) {
            return Err(ControllerError::runtime(&format!("Docker rm failed: {}", stderr.trim())));
        }
        Ok(())
    }

    async fn inspect(&self, name: &InstanceId) -> ControllerResult<Option<InstanceRecord>> {
        let args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            name.to_string(),
        ];
        let output = self
            .exec(&args)
            .await
            .map_err(|e| ControllerError::runtime(&format!("Failed to execute docker inspect: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing(&stderr) {
                return Ok(None);
            }
            return Err(ControllerError::runtime(&format!("Docker inspect failed: {}", stderr.trim())));
        }

        parse_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    async fn logs(&self, name: &InstanceId, tail: Option<u32>) -> ControllerResult<String> {
        let mut args = vec!["logs".to_string()];
        if let Some(n) = tail {
            args.push("--tail".to_string());
            args.push(n.to_string());
        }
        args.push(name.to_string());

        let output = self
            .exec(&args)
            .await
            .map_err(|e| ControllerError::runtime(&format!("Failed to execute docker logs: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControllerError::runtime(&format!("Docker logs failed: {}", stderr.trim())));
        }

        // The server writes most of its output to stderr
        let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }
}
