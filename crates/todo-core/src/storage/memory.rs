use super::{ClientStorage, Cookie};
use crate::error::{Result, TodoError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, String>,
    cookies: HashMap<String, Cookie>,
}

/// Process-local storage context. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| TodoError::storage("memory storage lock poisoned"))
    }
}

impl ClientStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.items.remove(key);
        Ok(())
    }

    fn cookie(&self, name: &str) -> Result<Option<Cookie>> {
        Ok(self.lock()?.cookies.get(name).cloned())
    }

    fn set_cookie(&self, cookie: Cookie) -> Result<()> {
        self.lock()?.cookies.insert(cookie.name.clone(), cookie);
        Ok(())
    }
}
