//! File-backed client storage (`storage.toml`).

use super::atomic_toml::AtomicTomlFile;
use crate::paths::TodoPaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use todo_core::storage::{ClientStorage, Cookie};
use todo_core::{Result, TodoError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StorageDocument {
    #[serde(default)]
    items: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, Cookie>,
}

/// Persistent storage context for the CLI.
///
/// Every call reads or rewrites the whole file; the data is a handful of
/// short strings. The file is private to the user on Unix.
pub struct FileClientStorage {
    file: AtomicTomlFile<StorageDocument>,
}

impl FileClientStorage {
    /// Opens storage at the default location (`<config_dir>/storage.toml`).
    pub fn open(paths: &TodoPaths) -> Result<Self> {
        let path = paths
            .storage_file()
            .map_err(|e| TodoError::storage(format!("Failed to get storage path: {}", e)))?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: PathBuf) -> Self {
        tracing::debug!("[FileClientStorage] Using {}", path.display());
        Self {
            file: AtomicTomlFile::new(path).private(),
        }
    }

    fn read(&self) -> Result<StorageDocument> {
        Ok(self.file.load()?.unwrap_or_default())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StorageDocument),
    {
        Ok(self.file.update(StorageDocument::default(), f)?)
    }
}

impl ClientStorage for FileClientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.items.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|doc| {
            doc.items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.modify(|doc| {
            doc.items.remove(key);
        })
    }

    fn cookie(&self, name: &str) -> Result<Option<Cookie>> {
        Ok(self.read()?.cookies.remove(name))
    }

    fn set_cookie(&self, cookie: Cookie) -> Result<()> {
        self.modify(|doc| {
            doc.cookies.insert(cookie.name.clone(), cookie);
        })
    }
}
