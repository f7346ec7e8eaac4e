use super::{ClientStorage, Cookie, SameSite};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const TOKEN_STORAGE_KEY: &str = "auth_token";
pub const EMAIL_STORAGE_KEY: &str = "user_email";
pub const AUTH_COOKIE_NAME: &str = "auth_token";
pub const COOKIE_MAX_AGE_DAYS: i64 = 7;

/// Bearer-token store.
///
/// Writes go to the persistent store and to a `SameSite=Lax` cookie (the
/// copy route-gating middleware reads). Reads come from the persistent store
/// only. Tokens are opaque strings; their shape is never checked here.
///
/// A store without a storage context turns every call into a no-op.
#[derive(Clone, Default)]
pub struct TokenStore {
    storage: Option<Arc<dyn ClientStorage>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self {
            storage: Some(storage),
        }
    }

    /// A store with no storage context.
    pub fn detached() -> Self {
        Self { storage: None }
    }

    pub fn has_context(&self) -> bool {
        self.storage.is_some()
    }

    pub fn get(&self) -> Result<Option<String>> {
        match &self.storage {
            Some(storage) => storage.get_item(TOKEN_STORAGE_KEY),
            None => Ok(None),
        }
    }

    pub fn set(&self, token: &str) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        storage.set_item(TOKEN_STORAGE_KEY, token)?;
        storage.set_cookie(auth_cookie(token, Utc::now() + Duration::days(COOKIE_MAX_AGE_DAYS)))
    }

    /// Deletes the persistent entry and overwrites the cookie with an
    /// already-expired one.
    pub fn remove(&self) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        storage.remove_item(TOKEN_STORAGE_KEY)?;
        storage.set_cookie(auth_cookie("", DateTime::UNIX_EPOCH))
    }

    /// The cookie copy of the token, for middleware-style consumers.
    pub fn cookie(&self) -> Result<Option<Cookie>> {
        match &self.storage {
            Some(storage) => storage.cookie(AUTH_COOKIE_NAME),
            None => Ok(None),
        }
    }

    pub fn remembered_email(&self) -> Result<Option<String>> {
        match &self.storage {
            Some(storage) => storage.get_item(EMAIL_STORAGE_KEY),
            None => Ok(None),
        }
    }

    pub fn remember_email(&self, email: &str) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.set_item(EMAIL_STORAGE_KEY, email),
            None => Ok(()),
        }
    }

    pub fn forget_email(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.remove_item(EMAIL_STORAGE_KEY),
            None => Ok(()),
        }
    }
}

fn auth_cookie(value: &str, expires: DateTime<Utc>) -> Cookie {
    Cookie {
        name: AUTH_COOKIE_NAME.to_string(),
        value: value.to_string(),
        path: "/".to_string(),
        expires,
        same_site: SameSite::Lax,
    }
}
