//! Query identities and the cache-clearing capability.

use crate::task::TaskFilter;
use std::fmt;

/// Identity under which a read result is cached.
///
/// Keys carry no user dimension, so the cache must be cleared whenever the
/// session identity changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    TaskList { filter: TaskFilter },
    TaskDetail { id: String },
}

impl QueryKey {
    pub fn task_list(filter: TaskFilter) -> Self {
        Self::TaskList { filter }
    }

    pub fn task_detail(id: impl Into<String>) -> Self {
        Self::TaskDetail { id: id.into() }
    }

    pub fn is_task_list(&self) -> bool {
        matches!(self, Self::TaskList { .. })
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskList { filter } => match filter.completed {
                None => write!(f, "tasks"),
                Some(completed) => write!(f, "tasks?completed={completed}"),
            },
            Self::TaskDetail { id } => write!(f, "tasks/{id}"),
        }
    }
}

/// Capability to drop every cached entry.
///
/// Injected into the session controller, which is the only component that
/// invokes it.
pub trait CacheInvalidator: Send + Sync {
    fn clear_all(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_stable_identities() {
        let mut keys = HashSet::new();
        keys.insert(QueryKey::task_list(TaskFilter::all()));
        keys.insert(QueryKey::task_list(TaskFilter::all()));
        keys.insert(QueryKey::task_list(TaskFilter::completed()));
        keys.insert(QueryKey::task_detail("1"));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryKey::task_list(TaskFilter::active()).to_string(), "tasks?completed=false");
        assert_eq!(QueryKey::task_detail("abc").to_string(), "tasks/abc");
    }
}
