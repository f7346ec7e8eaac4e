//! Unified path management for todo client files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/todo/              # Config directory
//! ├── config.toml              # Client configuration
//! └── storage.toml             # Persisted token, email and cookie (0600)
//! ```

use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "todo";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves the client's files, either under the platform config directory
/// or under an explicit base directory (tests, `--config-dir`).
#[derive(Debug, Clone, Default)]
pub struct TodoPaths {
    base: Option<PathBuf>,
}

impl TodoPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    /// Returns the todo configuration directory.
    ///
    /// - `Ok(PathBuf)`: the base directory, or e.g. `~/.config/todo/`
    /// - `Err(PathError::ConfigDirNotFound)`: the platform has no config dir
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(PathError::ConfigDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Path of the persisted client storage.
    ///
    /// Holds the bearer token; created with 600 permissions on Unix.
    pub fn storage_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("storage.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_dir() {
        let config_dir = TodoPaths::default().config_dir().unwrap();
        assert!(config_dir.ends_with("todo"));
    }

    #[test]
    fn test_files_live_under_config_dir() {
        let paths = TodoPaths::default();
        let config_dir = paths.config_dir().unwrap();
        assert!(paths.config_file().unwrap().starts_with(&config_dir));
        assert!(paths.storage_file().unwrap().ends_with("storage.toml"));
    }

    #[test]
    fn test_base_override() {
        let paths = TodoPaths::new(Some(Path::new("/tmp/todo-test")));
        assert_eq!(
            paths.config_file().unwrap(),
            PathBuf::from("/tmp/todo-test/config.toml")
        );
    }
}
