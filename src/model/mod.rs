pub mod assets;

pub use assets::{AssetPath, ModelAssetResolver, ModelEntry};
