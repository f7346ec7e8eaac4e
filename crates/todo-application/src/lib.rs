//! Application layer: query cache, session controller, task service and the
//! context object that wires them to one transport and storage.

pub mod context;
pub mod query_cache;
pub mod session;
pub mod task_service;

pub use context::TodoContext;
pub use query_cache::{CacheEvent, EntryInfo, QueryCache};
pub use session::SessionController;
pub use task_service::TaskService;
