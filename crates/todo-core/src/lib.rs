//! Domain layer for the todo client.
//!
//! Holds the wire models, the error taxonomy and its classifier, the retry
//! policy, query keys and the storage/navigation seams the outer crates plug
//! into.

pub mod auth;
pub mod classifier;
pub mod config;
pub mod error;
pub mod navigation;
pub mod query;
pub mod retry;
pub mod storage;
pub mod task;

pub use classifier::{ClassifiedError, classify, classify_any, classify_api};
pub use error::{ApiError, ErrorKind, Result, TodoError};
pub use navigation::{Navigator, Route};
pub use query::{CacheInvalidator, QueryKey};
pub use retry::RetryPolicy;
