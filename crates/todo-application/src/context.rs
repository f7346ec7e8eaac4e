//! Explicit lifecycle object wiring one client instance together.

use crate::query_cache::QueryCache;
use crate::session::SessionController;
use crate::task_service::TaskService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use todo_core::auth::SessionState;
use todo_core::config::ClientConfig;
use todo_core::storage::{ClientStorage, TokenStore};
use todo_core::{Navigator, Result, TodoError};
use todo_interaction::{HttpTransport, RequestClient, TodoApi};

/// One client: token store, request client, cache, session controller and
/// task service.
///
/// Lifecycle is `create` → `initialize` → `dispose`. Contexts share nothing,
/// so several can coexist in one process.
pub struct TodoContext {
    config: ClientConfig,
    tokens: TokenStore,
    cache: QueryCache,
    session: SessionController,
    tasks: TaskService,
    gc: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl TodoContext {
    /// Builds the context. Without `storage` the token store is detached and
    /// nothing is persisted.
    pub fn create(
        config: ClientConfig,
        storage: Option<Arc<dyn ClientStorage>>,
        transport: Arc<dyn HttpTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let tokens = storage.map(TokenStore::new).unwrap_or_default();
        let api = TodoApi::new(RequestClient::new(
            config.api_base_url.clone(),
            transport,
            tokens.clone(),
        ));
        let cache = QueryCache::new(config.cache.clone());
        let session = SessionController::new(
            api.clone(),
            tokens.clone(),
            Arc::new(cache.clone()),
            navigator,
        )
        .with_server_logout(config.notify_server_on_logout);
        let tasks = TaskService::new(api, cache.clone());

        Self {
            config,
            tokens,
            cache,
            session,
            tasks,
            gc: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Restores the persisted session and starts cache garbage collection
    /// when a tokio runtime is available.
    pub fn initialize(&self) -> Result<SessionState> {
        self.ensure_active()?;
        let state = self.session.initialize();

        if tokio::runtime::Handle::try_current().is_ok() {
            if let Ok(mut slot) = self.gc.lock() {
                if slot.is_none() {
                    *slot = Some(self.cache.start_gc());
                }
            }
        } else {
            tracing::debug!("[TodoContext] No runtime, cache GC not started");
        }
        Ok(state)
    }

    /// Stops background work and drops cached data. Persisted credentials
    /// stay so the next context can restore the session.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut slot) = self.gc.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        self.session.dispose();
        self.cache.clear();
        tracing::debug!("[TodoContext] Disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn tasks(&self) -> Result<&TaskService> {
        self.ensure_active()?;
        Ok(&self.tasks)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(TodoError::Lifecycle("context disposed".to_string()));
        }
        Ok(())
    }
}

impl Drop for TodoContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
