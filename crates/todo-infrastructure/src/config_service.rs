//! Configuration service.
//!
//! Loads `ClientConfig` from `<config_dir>/config.toml`, writing a default
//! file on first use, then applies environment overrides.

use crate::paths::TodoPaths;
use crate::storage::AtomicTomlFile;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use todo_core::config::ClientConfig;
use todo_core::{Result, TodoError};

pub const API_URL_ENV: &str = "TODO_API_URL";
pub const LOG_LEVEL_ENV: &str = "TODO_LOG_LEVEL";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Loads and caches the client configuration.
#[derive(Clone)]
pub struct ConfigService {
    paths: TodoPaths,
    env: EnvLookup,
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    pub fn new(paths: TodoPaths) -> Self {
        Self::with_env(paths, |key| std::env::var(key).ok())
    }

    /// Uses `env` instead of the process environment for overrides.
    pub fn with_env<F>(paths: TodoPaths, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            paths,
            env: Arc::new(env),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        self.paths
            .config_file()
            .map_err(|e| TodoError::config(e.to_string()))
    }

    /// Returns the configuration, loading it on first access.
    pub fn get_config(&self) -> Result<ClientConfig> {
        if let Ok(cached) = self.config.read() {
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = self.load()?;
        if let Ok(mut slot) = self.config.write() {
            *slot = Some(loaded.clone());
        }
        Ok(loaded)
    }

    /// Forces the next `get_config` to re-read the file.
    pub fn invalidate_cache(&self) {
        if let Ok(mut slot) = self.config.write() {
            *slot = None;
        }
    }

    fn load(&self) -> Result<ClientConfig> {
        let path = self.config_path()?;
        let file = AtomicTomlFile::<ClientConfig>::new(path.clone());

        let mut config = match file.load()? {
            Some(config) => config,
            None => {
                let config = ClientConfig::default();
                tracing::info!("[ConfigService] Writing default config to {}", path.display());
                file.save(&config)?;
                config
            }
        };

        self.apply_env_overrides(&mut config);
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut ClientConfig) {
        if let Some(url) = (self.env)(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("[ConfigService] {} overrides api_base_url", API_URL_ENV);
            config.api_base_url = url;
        }
        if let Some(level) = (self.env)(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            config.log_level = level;
        }
    }
}
