use crate::config::settings::Settings;
use crate::utils::error_handling::{ControllerError, ControllerResult};
use std::path::{Path, PathBuf};

/// Read-only handle on the persisted configuration file.
///
/// The file is re-read on every call so an edited default is seen by the next command.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ControllerResult<Settings> {
        Settings::load(&self.path)
    }

    /// The declared default model, if one is set and non-empty
    pub fn default_model(&self) -> ControllerResult<Option<String>> {
        let settings = self.load()?;
        Ok(settings
            .model
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty()))
    }
}

/// Decide which model the operator wants.
///
/// An explicit, non-empty name wins verbatim; otherwise the persisted default is used.
pub fn resolve_desired_model(explicit: Option<&str>, store: &ConfigStore) -> ControllerResult<String> {
    if let Some(name) = explicit.filter(|name| !name.trim().is_empty()) {
        return Ok(name.to_string());
    }

    store
        .default_model()?
        .ok_or_else(|| ControllerError::NoConfiguration {
            config: store.path().display().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store_with(content: Option<&str>) -> (TempDir, ConfigStore) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("inferctl.json");
        if let Some(content) = content {
            fs::write(&path, content).unwrap();
        }
        (temp_dir, ConfigStore::new(path))
    }

    #[test]
    fn test_explicit_wins_over_persisted() {
        let (_temp_dir, store) = store_with(Some(r#"{ "model": "alpha" }"#));
        assert_eq!(resolve_desired_model(Some("beta"), &store).unwrap(), "beta");
    }

    #[test]
    fn test_explicit_is_returned_verbatim() {
        let (_temp_dir, store) = store_with(Some(r#"{ "model": "alpha" }"#));
        assert_eq!(resolve_desired_model(Some(" beta "), &store).unwrap(), " beta ");
        assert_eq!(resolve_desired_model(Some("   "), &store).unwrap(), "alpha");
    }

    #[test]
    fn test_explicit_is_not_validated() {
        let (_temp_dir, store) = store_with(None);
        assert_eq!(
            resolve_desired_model(Some("does-not-exist"), &store).unwrap(),
            "does-not-exist"
        );
    }

    #[test]
    fn test_empty_explicit_falls_back_to_persisted() {
        let (_temp_dir, store) = store_with(Some(r#"{ "model": "alpha" }"#));
        assert_eq!(resolve_desired_model(Some(""), &store).unwrap(), "alpha");
        assert_eq!(resolve_desired_model(None, &store).unwrap(), "alpha");
    }

    #[test]
    fn test_no_configuration() {
        let (_temp_dir, store) = store_with(None);
        assert!(matches!(
            resolve_desired_model(None, &store),
            Err(ControllerError::NoConfiguration { .. })
        ));

        let (_temp_dir, store) = store_with(Some(r#"{ "model": "  " }"#));
        assert!(matches!(
            resolve_desired_model(None, &store),
            Err(ControllerError::NoConfiguration { .. })
        ));
    }

    #[test]
    fn test_store_sees_edits() {
        let (_temp_dir, store) = store_with(Some(r#"{ "model": "alpha" }"#));
        assert_eq!(store.default_model().unwrap().as_deref(), Some("alpha"));

        fs::write(store.path(), r#"{ "model": "beta" }"#).unwrap();
        assert_eq!(store.default_model().unwrap().as_deref(), Some("beta"));
    }
}
