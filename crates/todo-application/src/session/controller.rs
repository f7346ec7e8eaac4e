use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use todo_core::auth::{AuthResponse, Credentials, Session, SessionState, TokenClaims};
use todo_core::storage::TokenStore;
use todo_core::{
    CacheInvalidator, ClassifiedError, Navigator, Result, Route, TodoError, classify,
};
use todo_interaction::TodoApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthAction {
    Login,
    Register,
}

impl AuthAction {
    fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// Owns the current-user state and every session transition.
///
/// Each transition clears the injected cache before credentials change, so no
/// entry fetched for one user is ever served to another. The sequence
/// cache clear, credential write, state change, navigation runs without an
/// intervening `.await`.
pub struct SessionController {
    api: TodoApi,
    tokens: TokenStore,
    cache: Arc<dyn CacheInvalidator>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionState>,
    last_error: Mutex<Option<ClassifiedError>>,
    notify_server_on_logout: bool,
    disposed: AtomicBool,
}

impl SessionController {
    pub fn new(
        api: TodoApi,
        tokens: TokenStore,
        cache: Arc<dyn CacheInvalidator>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            api,
            tokens,
            cache,
            navigator,
            state,
            last_error: Mutex::new(None),
            notify_server_on_logout: true,
            disposed: AtomicBool::new(false),
        }
    }

    /// Whether `logout` calls `POST /api/auth/logout` before signing out locally.
    pub fn with_server_logout(mut self, enabled: bool) -> Self {
        self.notify_server_on_logout = enabled;
        self
    }

    /// Restores the session from persisted credentials.
    ///
    /// Always leaves the controller initialised. A missing, undecodable or
    /// expired token yields `Anonymous`, and stale credentials are removed.
    pub fn initialize(&self) -> SessionState {
        let state = match self.hydrate() {
            Ok(Some(session)) => {
                tracing::info!("[SessionController] Restored session for {}", session.email);
                SessionState::Authenticated(session)
            }
            Ok(None) => SessionState::Anonymous,
            Err(err) => {
                tracing::warn!("[SessionController] Could not restore session: {}", err);
                self.discard_credentials();
                SessionState::Anonymous
            }
        };
        self.state.send_replace(state.clone());
        state
    }

    fn hydrate(&self) -> Result<Option<Session>> {
        let Some(token) = self.tokens.get()? else {
            return Ok(None);
        };
        let Some(email) = self.tokens.remembered_email()? else {
            tracing::debug!("[SessionController] Token without cached email, discarding");
            self.discard_credentials();
            return Ok(None);
        };

        let claims = TokenClaims::decode(&token)?;
        if claims.is_expired_at(Utc::now()) {
            tracing::info!("[SessionController] Persisted token has expired");
            self.discard_credentials();
            return Ok(None);
        }

        Ok(Some(Session {
            user_id: claims.sub,
            email,
            token,
        }))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.authenticate(AuthAction::Login, Credentials::new(email, password))
            .await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Session> {
        self.authenticate(AuthAction::Register, Credentials::new(email, password))
            .await
    }

    async fn authenticate(&self, action: AuthAction, credentials: Credentials) -> Result<Session> {
        self.ensure_active()?;
        self.clear_error();
        self.cache.clear_all();

        let response = match action {
            AuthAction::Login => self.api.login(&credentials).await,
            AuthAction::Register => self.api.register(&credentials).await,
        };
        let response = response.map_err(|err| self.fail(action, err))?;

        // Anything fetched while the request was pending belongs to the old
        // identity.
        self.cache.clear_all();
        let session = self.commit(response).map_err(|err| self.fail(action, err))?;
        self.navigator.navigate(Route::Dashboard);

        tracing::info!("[SessionController] {} succeeded for {}", action.label(), session.email);
        Ok(session)
    }

    fn commit(&self, response: AuthResponse) -> Result<Session> {
        self.tokens.set(&response.token)?;
        if let Err(err) = self.tokens.remember_email(&response.user.email) {
            // A token without its email cannot be restored later.
            self.discard_credentials();
            return Err(err);
        }

        let session = Session {
            user_id: response.user.id,
            email: response.user.email,
            token: response.token,
        };
        self.state
            .send_replace(SessionState::Authenticated(session.clone()));
        Ok(session)
    }

    fn fail(&self, action: AuthAction, err: TodoError) -> TodoError {
        let classified = classify_sign_in_failure(&err);
        tracing::warn!(
            "[SessionController] {} failed: {} ({})",
            action.label(),
            classified.message,
            err
        );
        self.record_error(classified);
        err
    }

    /// Signs out. Never fails.
    ///
    /// Local credentials are removed, the cache cleared and the user sent to
    /// sign-in before anything is awaited. The server is then told, best
    /// effort and when enabled, using the token that was just discarded.
    pub async fn logout(&self) {
        let revoked = self
            .session()
            .filter(|_| self.notify_server_on_logout)
            .map(|session| session.token);
        self.sign_out("logout");

        if let Some(token) = revoked {
            if let Err(err) = self.api.logout(&token).await {
                tracing::warn!("[SessionController] Server logout failed: {}", err);
            }
        }
    }

    /// Classifies an error raised by a data call.
    ///
    /// Failures of `login`/`register` are already recorded in `last_error`
    /// and must not be passed here.
    ///
    /// When the classification redirects to sign-in (expired or revoked
    /// token) the controller signs out with the same sequence as `logout`,
    /// without contacting the server.
    pub fn handle_error(&self, err: &TodoError) -> ClassifiedError {
        let classified = classify(err);
        self.record_error(classified.clone());
        if classified.redirect == Some(Route::SignIn) {
            tracing::info!("[SessionController] Authentication rejected, signing out");
            self.sign_out("authentication error");
        }
        classified
    }

    fn sign_out(&self, reason: &str) {
        self.discard_credentials();
        self.state.send_replace(SessionState::Anonymous);
        self.cache.clear_all();
        self.navigator.navigate(Route::SignIn);
        tracing::debug!("[SessionController] Signed out ({})", reason);
    }

    fn discard_credentials(&self) {
        if let Err(err) = self.tokens.remove() {
            tracing::warn!("[SessionController] Failed to remove token: {}", err);
        }
        if let Err(err) = self.tokens.forget_email() {
            tracing::warn!("[SessionController] Failed to forget email: {}", err);
        }
    }

    fn record_error(&self, classified: ClassifiedError) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(classified);
        }
    }

    pub fn last_error(&self) -> Option<ClassifiedError> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn clear_error(&self) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = None;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_initialized()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Rejects further sign-ins. Persisted credentials are kept.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(TodoError::Lifecycle("session controller disposed".to_string()));
        }
        Ok(())
    }
}

/// A rejected sign-in is not an expired session: keep the server's wording
/// and drop the redirect to the page the user is already on.
fn classify_sign_in_failure(err: &TodoError) -> ClassifiedError {
    let mut classified = classify(err);
    if classified.redirect == Some(Route::SignIn) {
        classified.redirect = None;
        if let Some(api) = err.as_api().filter(|api| !api.message.trim().is_empty()) {
            classified.message = api.message.clone();
        }
    }
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use todo_core::ApiError;

    #[test]
    fn test_rejected_sign_in_keeps_server_message() {
        let err = TodoError::from(ApiError::new(401, "INVALID_CREDENTIALS", "Invalid email or password"));
        let classified = classify_sign_in_failure(&err);
        assert_eq!(classified.message, "Invalid email or password");
        assert_eq!(classified.redirect, None);
        assert!(!classified.should_retry);
    }

    #[test]
    fn test_other_sign_in_failures_use_the_classifier() {
        let err = TodoError::from(ApiError::new(503, "SERVER_ERROR", "unavailable"));
        assert_eq!(classify_sign_in_failure(&err), classify(&err));
    }
}
