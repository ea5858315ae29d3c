use crate::config::settings::{ArtifactSelection, Settings};
use crate::utils::error_handling::{ControllerError, ControllerResult};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// A resolved weight artifact, in both the host and the in-instance namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPath {
    pub model: String,
    pub file_name: String,
    /// Location on the host, for diagnostics
    pub host_path: PathBuf,
    /// Location under the instance's mount point, passed to the server
    pub instance_path: String,
}

/// One entry of the models root listing
#[derive(Debug)]
pub struct ModelEntry {
    pub name: String,
    pub asset: ControllerResult<AssetPath>,
}

/// Locates the weight artifact of a model under the models root
#[derive(Debug, Clone)]
pub struct ModelAssetResolver {
    models_root: PathBuf,
    mount_point: String,
    extensions: Vec<String>,
    selection: ArtifactSelection,
}

impl ModelAssetResolver {
    pub fn new(
        models_root: impl Into<PathBuf>,
        mount_point: &str,
        extensions: Vec<String>,
        selection: ArtifactSelection,
    ) -> Self {
        Self {
            models_root: models_root.into(),
            mount_point: mount_point.trim_end_matches('/').to_string(),
            extensions: extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            selection,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.models_root.clone(),
            &settings.instance.mount_point,
            settings.assets.extensions.clone(),
            settings.assets.selection,
        )
    }

    pub fn models_root(&self) -> &Path {
        &self.models_root
    }

    /// Resolve `model` to its single weight artifact
    pub fn resolve_asset(&self, model: &str) -> ControllerResult<AssetPath> {
        validate_model_name(model)?;

        let model_dir = self.models_root.join(model);
        if !model_dir.is_dir() {
            return Err(ControllerError::ModelDirectoryMissing {
                model: model.to_string(),
                path: model_dir,
            });
        }

        let mut candidates = self.candidates(&model_dir)?;
        debug!("Found {} artifact(s) for {}: {:?}", candidates.len(), model, candidates);

        let file_name = match candidates.len() {
            0 => {
                return Err(ControllerError::NoArtifactFound {
                    model: model.to_string(),
                    path: model_dir,
                })
            }
            1 => candidates.remove(0),
            _ => match self.selection {
                ArtifactSelection::Strict => {
                    return Err(ControllerError::AmbiguousArtifact {
                        model: model.to_string(),
                        candidates,
                    })
                }
                ArtifactSelection::First => {
                    warn!(
                        "Model {} has {} weight artifacts, using {}",
                        model,
                        candidates.len(),
                        candidates[0]
                    );
                    candidates.remove(0)
                }
            },
        };

        Ok(AssetPath {
            model: model.to_string(),
            host_path: model_dir.join(&file_name),
            instance_path: format!("{}/{}/{}", self.mount_point, model, file_name),
            file_name,
        })
    }

    /// Every model directory under the root with its resolution outcome, sorted by name
    pub fn list_models(&self) -> ControllerResult<Vec<ModelEntry>> {
        if !self.models_root.is_dir() {
            return Err(ControllerError::config(&format!(
                "Models root {} is not a directory",
                self.models_root.display()
            )));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.models_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| {
                let asset = self.resolve_asset(&name);
                ModelEntry { name, asset }
            })
            .collect())
    }

    fn candidates(&self, model_dir: &Path) -> ControllerResult<Vec<String>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(model_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                found.push(name.to_string());
            }
        }
        found.sort();
        Ok(found)
    }
}

fn validate_model_name(model: &str) -> ControllerResult<()> {
    let invalid = model.is_empty()
        || model == "."
        || model == ".."
        || model.contains('/')
        || model.contains('\\');
    if invalid {
        return Err(ControllerError::InvalidModelName(model.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn resolver(root: &Path, selection: ArtifactSelection) -> ModelAssetResolver {
        ModelAssetResolver::new(root, "/models", vec!["gguf".to_string()], selection)
    }

    fn model_dir(root: &Path, model: &str, files: &[&str]) {
        let dir = root.join(model);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"weights").unwrap();
        }
    }

    #[test]
    fn test_single_artifact() {
        let temp_dir = TempDir::new().unwrap();
        model_dir(temp_dir.path(), "alpha", &["alpha.Q4_K_M.gguf", "README.md"]);

        let asset = resolver(temp_dir.path(), ArtifactSelection::Strict)
            .resolve_asset("alpha")
            .unwrap();
        assert_eq!(asset.file_name, "alpha.Q4_K_M.gguf");
        assert_eq!(asset.instance_path, "/models/alpha/alpha.Q4_K_M.gguf");
        assert_eq!(asset.host_path, temp_dir.path().join("alpha").join("alpha.Q4_K_M.gguf"));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        model_dir(temp_dir.path(), "alpha", &["ALPHA.GGUF"]);

        let resolver = ModelAssetResolver::new(
            temp_dir.path(),
            "/models/",
            vec![".gguf".to_string()],
            ArtifactSelection::Strict,
        );
        let asset = resolver.resolve_asset("alpha").unwrap();
        assert_eq!(asset.instance_path, "/models/alpha/ALPHA.GGUF");
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = resolver(temp_dir.path(), ArtifactSelection::Strict).resolve_asset("ghost");
        assert!(matches!(result, Err(ControllerError::ModelDirectoryMissing { .. })));
    }

    #[test]
    fn test_no_artifact() {
        let temp_dir = TempDir::new().unwrap();
        model_dir(temp_dir.path(), "alpha", &["notes.txt"]);
        fs::create_dir_all(temp_dir.path().join("alpha").join("nested.gguf")).unwrap();

        let result = resolver(temp_dir.path(), ArtifactSelection::Strict).resolve_asset("alpha");
        assert!(matches!(result, Err(ControllerError::NoArtifactFound { .. })));
    }

    #[test]
    fn test_multiple_artifacts_strict() {
        let temp_dir = TempDir::new().unwrap();
        model_dir(temp_dir.path(), "alpha", &["b.gguf", "a.gguf"]);

        match resolver(temp_dir.path(), ArtifactSelection::Strict).resolve_asset("alpha") {
            Err(ControllerError::AmbiguousArtifact { candidates, .. }) => {
                assert_eq!(candidates, vec!["a.gguf", "b.gguf"]);
            }
            other => panic!("expected AmbiguousArtifact, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_artifacts_first() {
        let temp_dir = TempDir::new().unwrap();
        model_dir(temp_dir.path(), "alpha", &["c.gguf", "a.gguf", "b.gguf"]);

        let resolver = resolver(temp_dir.path(), ArtifactSelection::First);
        for _ in 0..3 {
            assert_eq!(resolver.resolve_asset("alpha").unwrap().file_name, "a.gguf");
        }
    }

    #[test]
    fn test_invalid_model_names() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = resolver(temp_dir.path(), ArtifactSelection::Strict);
        for name in ["", ".", "..", "../etc", "a/b"] {
            assert!(matches!(
                resolver.resolve_asset(name),
                Err(ControllerError::InvalidModelName(_))
            ));
        }
    }

    #[test]
    fn test_list_models() {
        let temp_dir = TempDir::new().unwrap();
        model_dir(temp_dir.path(), "beta", &["beta.gguf"]);
        model_dir(temp_dir.path(), "alpha", &["alpha.gguf"]);
        model_dir(temp_dir.path(), "empty", &[]);
        fs::write(temp_dir.path().join("stray.gguf"), b"x").unwrap();

        let entries = resolver(temp_dir.path(), ArtifactSelection::Strict)
            .list_models()
            .unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "empty"]);
        assert!(entries[0].asset.is_ok());
        assert!(matches!(entries[2].asset, Err(ControllerError::NoArtifactFound { .. })));
    }

    proptest! {
        #[test]
        fn prop_resolution_matches_artifact_count(
            files in proptest::collection::btree_set("[a-z]{1,8}", 0..4)
        ) {
            let temp_dir = TempDir::new().unwrap();
            let names: Vec<String> = files.iter().map(|f| format!("{}.gguf", f)).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            model_dir(temp_dir.path(), "model", &refs);

            let resolver = resolver(temp_dir.path(), ArtifactSelection::Strict);
            let first = resolver.resolve_asset("model");
            let second = resolver.resolve_asset("model");

            match names.len() {
                0 => {
                    let missing = matches!(first, Err(ControllerError::NoArtifactFound { .. }))
                        && matches!(second, Err(ControllerError::NoArtifactFound { .. }));
                    prop_assert!(missing);
                }
                1 => {
                    prop_assert_eq!(first.unwrap().file_name, names[0].clone());
                    prop_assert_eq!(second.unwrap().file_name, names[0].clone());
                }
                _ => {
                    let ambiguous = matches!(first, Err(ControllerError::AmbiguousArtifact { .. }))
                        && matches!(second, Err(ControllerError::AmbiguousArtifact { .. }));
                    prop_assert!(ambiguous);
                }
            }
        }
    }
}
