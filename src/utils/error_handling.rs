use std::path::PathBuf;
use thiserror::Error;

/// Controller-specific error types
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("No model configured: pass a model name or set \"model\" in {config}")]
    NoConfiguration { config: String },

    #[error("Invalid model name '{0}': must be a single directory name")]
    InvalidModelName(String),

    #[error("Model directory for '{model}' not found at {path}")]
    ModelDirectoryMissing { model: String, path: PathBuf },

    #[error("No weight artifact found for '{model}' in {path}")]
    NoArtifactFound { model: String, path: PathBuf },

    #[error("Model '{model}' has {} weight artifacts: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousArtifact { model: String, candidates: Vec<String> },

    #[error("Failed to launch instance '{instance}': {reason}")]
    LaunchFailed { instance: String, reason: String },

    #[error("Instance '{instance}' did not become healthy after {attempts} attempts")]
    Unhealthy { instance: String, attempts: u32 },

    #[error("Cannot determine model of instance '{instance}': {reason}")]
    Unknown { instance: String, reason: String },

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

impl ControllerError {
    /// Create a configuration error
    pub fn config(msg: &str) -> Self {
        ControllerError::Configuration(msg.to_string())
    }

    /// Create a container runtime error
    pub fn runtime(msg: &str) -> Self {
        ControllerError::Runtime(msg.to_string())
    }

    /// Create a launch failure for the given instance
    pub fn launch(instance: &str, reason: &str) -> Self {
        ControllerError::LaunchFailed {
            instance: instance.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }

    /// Suggested next step for the operator, if there is an obvious one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ControllerError::NoConfiguration { .. } => {
                Some("run `inferctl start <model>` or add a default model to the config file")
            }
            ControllerError::InvalidModelName(_) => None,
            ControllerError::ModelDirectoryMissing { .. } => {
                Some("run `inferctl models` to list the available models")
            }
            ControllerError::NoArtifactFound { .. } => {
                Some("place exactly one weight file in the model directory")
            }
            ControllerError::AmbiguousArtifact { .. } => Some(
                "remove the extra weight files or set assets.selection to \"first\"",
            ),
            ControllerError::LaunchFailed { .. } => Some("check that docker is installed and running"),
            ControllerError::Unhealthy { .. } => {
                Some("inspect `inferctl logs`, then `inferctl stop` and `inferctl start`")
            }
            ControllerError::Unknown { .. } => {
                Some("the instance was not started by inferctl; run `inferctl stop` to reclaim it")
            }
            ControllerError::Runtime(_) => Some("check that docker is installed and running"),
            ControllerError::Configuration(_) => None,
            ControllerError::Io(_) => None,
            ControllerError::Serialization(_) => None,
        }
    }
}
