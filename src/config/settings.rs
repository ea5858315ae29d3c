use crate::utils::error_handling::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Controller configuration, persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Declared default model name
    pub model: Option<String>,
    /// Host directory holding one subdirectory per model
    pub models_root: PathBuf,
    pub instance: InstanceSettings,
    pub assets: AssetSettings,
    pub health: HealthSettings,
    /// Pause between the stop and start halves of a restart
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    /// Container name of the managed instance
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub cpus: f64,
    pub memory_mb: u32,
    /// Where the models root is mounted inside the instance
    pub mount_point: String,
    pub stop_timeout_secs: u64,
    /// Server arguments; `{model_path}` and `{port}` are substituted at launch
    pub launch_args: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Weight artifact file extensions, matched case-insensitively
    pub extensions: Vec<String>,
    pub selection: ArtifactSelection,
}

/// How to pick when a model directory holds several weight artifacts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSelection {
    /// Refuse to resolve
    Strict,
    /// Take the lexicographically first file name
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub readiness_path: String,
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
    pub jitter_ms: u64,
    pub request_timeout_ms: u64,
    /// Overall bound on a probe run, in seconds
    pub deadline_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: None,
            models_root: PathBuf::from("models"),
            instance: InstanceSettings::default(),
            assets: AssetSettings::default(),
            health: HealthSettings::default(),
            settle_delay_ms: 2000,
        }
    }
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            name: "inferctl-server".to_string(),
            image: "ghcr.io/ggml-org/llama.cpp:server".to_string(),
            host_port: 8080,
            container_port: 8080,
            cpus: 4.0,
            memory_mb: 8192,
            mount_point: "/models".to_string(),
            stop_timeout_secs: 10,
            launch_args: vec![
                "--model".to_string(),
                "{model_path}".to_string(),
                "--host".to_string(),
                "0.0.0.0".to_string(),
                "--port".to_string(),
                "{port}".to_string(),
            ],
            environment: BTreeMap::new(),
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["gguf".to_string()],
            selection: ArtifactSelection::Strict,
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            readiness_path: "/health".to_string(),
            max_attempts: 30,
            interval_ms: 2000,
            backoff_multiplier: 1.0,
            max_interval_ms: 10_000,
            jitter_ms: 0,
            request_timeout_ms: 1500,
            deadline_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file does not exist.
    ///
    /// A relative `models_root` is resolved against the directory holding the file.
    pub fn load(path: &Path) -> ControllerResult<Self> {
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ControllerError::config(&format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str::<Settings>(&content).map_err(|e| {
                ControllerError::config(&format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Settings::default()
        };

        if settings.models_root.is_relative() {
            if let Some(parent) = path.parent() {
                settings.models_root = parent.join(&settings.models_root);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> ControllerResult<()> {
        let instance = &self.instance;
        if instance.name.trim().is_empty() {
            return Err(ControllerError::config("Instance name cannot be empty"));
        }
        if instance.image.trim().is_empty() {
            return Err(ControllerError::config("Image name cannot be empty"));
        }
        if instance.host_port == 0 || instance.container_port == 0 {
            return Err(ControllerError::config("Ports must be non-zero"));
        }
        if instance.memory_mb < 256 {
            return Err(ControllerError::config("Memory limit must be at least 256 MB"));
        }
        if instance.cpus.is_nan() || instance.cpus <= 0.0 {
            return Err(ControllerError::config("CPU limit must be positive"));
        }
        if !instance.mount_point.starts_with('/') {
            return Err(ControllerError::config("Mount point must be an absolute path"));
        }
        if self.assets.extensions.is_empty() {
            return Err(ControllerError::config("At least one weight extension is required"));
        }
        if self.health.max_attempts == 0 {
            return Err(ControllerError::config("health.max_attempts must be at least 1"));
        }
        if !self.health.readiness_path.starts_with('/') {
            return Err(ControllerError::config("health.readiness_path must start with '/'"));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl InstanceSettings {
    /// Launch arguments with placeholders filled in
    pub fn render_launch_args(&self, model_path: &str) -> Vec<String> {
        let port = self.container_port.to_string();
        self.launch_args
            .iter()
            .map(|arg| arg.replace("{model_path}", model_path).replace("{port}", &port))
            .collect()
    }

    pub fn readiness_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.host_port, path)
    }
}
