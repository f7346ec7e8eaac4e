//! Storage layer: atomic file writes and the file-backed client storage.

mod atomic_toml;
mod file_client_storage;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use file_client_storage::FileClientStorage;
