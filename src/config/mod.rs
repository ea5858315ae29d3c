pub mod settings;
pub mod resolver;

pub use settings::{ArtifactSelection, AssetSettings, HealthSettings, InstanceSettings, Settings};
pub use resolver::{resolve_desired_model, ConfigStore};
