//! Client-side credential storage.
//!
//! # Module Structure
//!
//! - `cookie`: the cookie record kept next to the persistent entry
//! - `memory`: an in-process `ClientStorage`
//! - `token_store`: the bearer-token store built on top of `ClientStorage`

mod cookie;
mod memory;
mod token_store;

pub use cookie::{Cookie, SameSite};
pub use memory::MemoryStorage;
pub use token_store::{
    AUTH_COOKIE_NAME, COOKIE_MAX_AGE_DAYS, EMAIL_STORAGE_KEY, TOKEN_STORAGE_KEY, TokenStore,
};

use crate::error::Result;

/// A storage context: a persistent key/value store plus a cookie jar.
///
/// This is the Rust counterpart of a browser's `localStorage` and
/// `document.cookie`. When no context exists (headless or pre-render use),
/// [`TokenStore`] is built without one and every operation is a no-op.
pub trait ClientStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Returns the stored cookie with the given name, expired or not.
    fn cookie(&self, name: &str) -> Result<Option<Cookie>>;

    /// Stores a cookie, replacing any cookie with the same name.
    fn set_cookie(&self, cookie: Cookie) -> Result<()>;
}
