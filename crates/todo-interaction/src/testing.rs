//! In-memory implementation of the backend's wire contract.
//!
//! `ContractBackend` is an [`HttpTransport`], so a real `RequestClient` (and
//! everything above it) can be exercised without a server. It enforces the
//! same rules as the production backend: credential checks, bearer auth,
//! per-user task ownership and field limits. It also supports failure
//! injection, an offline switch, artificial latency and a request log.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use todo_core::auth::{Credentials, TokenClaims, User};
use todo_core::task::{NewTask, Task, TaskPatch};
use todo_core::TodoError;
use uuid::Uuid;

pub const TOKEN_LIFETIME_HOURS: i64 = 24;
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

static JWT_HEADER: Lazy<String> =
    Lazy::new(|| URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#));

/// Source of "now" for issued tokens and task timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn as_clock(&self) -> Clock {
        let this = self.clone();
        Arc::new(move || this.now())
    }
}

/// One request as the backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
}

enum Injected {
    Response(HttpResponse),
    Network,
}

struct UserRecord {
    id: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct BackendState {
    users: HashMap<String, UserRecord>,
    tokens: HashMap<String, String>,
    tasks: Vec<Task>,
    injected: VecDeque<Injected>,
    offline: bool,
    log: Vec<RecordedRequest>,
}

type Reply = Result<HttpResponse, HttpResponse>;

pub struct ContractBackend {
    state: Mutex<BackendState>,
    clock: Clock,
    latency: Option<Duration>,
}

impl Default for ContractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            clock,
            latency: None,
        }
    }

    /// Every request waits `latency` (tokio time) before it is handled.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The next request, whatever its route, fails with this error body.
    pub fn fail_next(&self, status: u16, code: &str, message: &str) {
        self.fail_next_raw(status, error_body(code, message, None).to_string());
    }

    /// The next request returns `status` with a verbatim body.
    pub fn fail_next_raw(&self, status: u16, body: impl Into<String>) {
        self.lock()
            .injected
            .push_back(Injected::Response(HttpResponse::new(status, body)));
    }

    /// The next request fails before reaching the server.
    pub fn fail_next_network(&self) {
        self.lock().injected.push_back(Injected::Network);
    }

    /// While offline every request fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().log.clone()
    }

    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.lock().log.clear();
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)().trunc_subsecs(0)
    }

    fn dispatch(&self, state: &mut BackendState, request: &HttpRequest, path: &str) -> Reply {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let body = request.body.as_deref();
        let headers = &request.headers;

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["api", "auth", "register"]) => self.register(state, body),
            ("POST", ["api", "auth", "login"]) => self.login(state, body),
            ("POST", ["api", "auth", "logout"]) => {
                self.authenticate(state, headers)?;
                Ok(json_response(200, &json!({"message": "Logged out successfully"})))
            }
            ("GET", ["api", "tasks"]) => {
                let user_id = self.authenticate(state, headers)?;
                let tasks: Vec<&Task> = state.tasks.iter().filter(|t| t.user_id == user_id).collect();
                Ok(json_response(200, &json!({ "tasks": tasks })))
            }
            ("POST", ["api", "tasks"]) => {
                let user_id = self.authenticate(state, headers)?;
                self.create_task(state, &user_id, body)
            }
            ("GET", ["api", "tasks", id]) => {
                let user_id = self.authenticate(state, headers)?;
                let index = owned_task(state, id, &user_id)?;
                Ok(json_response(200, &json!({ "task": state.tasks[index] })))
            }
            ("PUT", ["api", "tasks", id]) => {
                let user_id = self.authenticate(state, headers)?;
                self.update_task(state, id, &user_id, body)
            }
            ("DELETE", ["api", "tasks", id]) => {
                let user_id = self.authenticate(state, headers)?;
                let index = owned_task(state, id, &user_id)?;
                state.tasks.remove(index);
                Ok(json_response(200, &json!({"message": "Task deleted successfully"})))
            }
            _ => Err(error(404, "NOT_FOUND", "Not found")),
        }
    }

    fn register(&self, state: &mut BackendState, body: Option<&str>) -> Reply {
        let credentials: Credentials = parse_body(body)?;
        if !EMAIL_PATTERN.is_match(&credentials.email) {
            return Err(validation_error(json!({"email": "Invalid email address"})));
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(validation_error(
                json!({"password": "Password must be at least 8 characters"}),
            ));
        }

        let key = credentials.email.to_lowercase();
        if state.users.contains_key(&key) {
            return Err(error(409, "EMAIL_EXISTS", "Email already registered"));
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: credentials.email,
            password: credentials.password,
        };
        let user = User {
            id: record.id.clone(),
            email: record.email.clone(),
        };
        state.users.insert(key, record);
        self.auth_response(state, user, 201)
    }

    fn login(&self, state: &mut BackendState, body: Option<&str>) -> Reply {
        let credentials: Credentials = parse_body(body)?;
        let user = state
            .users
            .get(&credentials.email.to_lowercase())
            .filter(|user| user.password == credentials.password)
            .map(|user| User {
                id: user.id.clone(),
                email: user.email.clone(),
            })
            .ok_or_else(|| error(401, "INVALID_CREDENTIALS", "Invalid email or password"))?;
        self.auth_response(state, user, 200)
    }

    fn auth_response(&self, state: &mut BackendState, user: User, status: u16) -> Reply {
        let now = self.now();
        let claims = TokenClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        };
        let payload = claims.encode_segment().map_err(internal_error)?;
        let signature = URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        let token = format!("{}.{}.{}", *JWT_HEADER, payload, signature);
        state.tokens.insert(token.clone(), user.id.clone());

        Ok(json_response(status, &json!({ "user": user, "token": token })))
    }

    fn authenticate(&self, state: &BackendState, headers: &HeaderMap) -> Result<String, HttpResponse> {
        let unauthorized = || error(401, "UNAUTHORIZED", "Missing or invalid authentication token");

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;
        let user_id = state.tokens.get(token).cloned().ok_or_else(unauthorized)?;
        let claims = TokenClaims::decode(token).map_err(|_| unauthorized())?;
        if claims.is_expired_at(self.now()) {
            return Err(unauthorized());
        }
        Ok(user_id)
    }

    fn create_task(&self, state: &mut BackendState, user_id: &str, body: Option<&str>) -> Reply {
        let new_task: NewTask = parse_body(body)?;
        if new_task.title.trim().is_empty() {
            return Err(error(400, "VALIDATION_ERROR", "Title is required"));
        }
        new_task.validate().map_err(rejected)?;

        let now = self.now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: new_task.title.trim().to_string(),
            description: new_task.description,
            due_date: new_task.due_date,
            is_completed: new_task.is_completed.unwrap_or(false),
            created_at: now,
            updated_at: now,
            user_id: user_id.to_string(),
        };
        let response = json_response(201, &json!({ "task": task }));
        state.tasks.push(task);
        Ok(response)
    }

    fn update_task(&self, state: &mut BackendState, id: &str, user_id: &str, body: Option<&str>) -> Reply {
        let mut patch: TaskPatch = parse_body(body)?;
        if patch.is_empty() {
            return Err(error(400, "VALIDATION_ERROR", "At least one field required"));
        }
        let index = owned_task(state, id, user_id)?;
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(error(400, "VALIDATION_ERROR", "Title is required"));
            }
            patch.title = Some(title.trim().to_string());
        }
        patch.validate().map_err(rejected)?;

        let now = self.now();
        let task = &mut state.tasks[index];
        // Re-sending current values leaves updatedAt untouched.
        if patch.apply_to(task) {
            task.updated_at = now;
        }
        Ok(json_response(200, &json!({ "task": task })))
    }
}

#[async_trait]
impl HttpTransport for ContractBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let path = Url::parse(&request.url)
            .map(|url| url.path().to_string())
            .map_err(|err| TransportError::new(format!("invalid url {}: {err}", request.url)))?;

        let mut state = self.lock();
        state.log.push(RecordedRequest {
            method: request.method.clone(),
            path: path.clone(),
        });

        if state.offline {
            return Err(TransportError::new("network unreachable"));
        }
        match state.injected.pop_front() {
            Some(Injected::Network) => return Err(TransportError::new("connection reset")),
            Some(Injected::Response(response)) => return Ok(response),
            None => {}
        }

        let reply = self.dispatch(&mut state, &request, &path);
        Ok(reply.unwrap_or_else(|response| response))
    }
}

fn owned_task(state: &BackendState, id: &str, user_id: &str) -> Result<usize, HttpResponse> {
    let index = state
        .tasks
        .iter()
        .position(|task| task.id == id)
        .ok_or_else(|| error(404, "NOT_FOUND", "Task not found"))?;
    if state.tasks[index].user_id != user_id {
        return Err(error(403, "FORBIDDEN", "Access denied"));
    }
    Ok(index)
}

fn parse_body<T: DeserializeOwned>(body: Option<&str>) -> Result<T, HttpResponse> {
    serde_json::from_str(body.unwrap_or("")).map_err(|err| validation_error(json!({"body": err.to_string()})))
}

fn error_body(code: &str, message: &str, details: Option<Value>) -> Value {
    let mut body = json!({ "error": code, "message": message });
    if let Some(details) = details {
        body["details"] = details;
    }
    body
}

fn error(status: u16, code: &str, message: &str) -> HttpResponse {
    HttpResponse::new(status, error_body(code, message, None).to_string())
}

fn validation_error(details: Value) -> HttpResponse {
    HttpResponse::new(
        422,
        error_body("VALIDATION_ERROR", "Validation failed", Some(details)).to_string(),
    )
}

/// Field limit violations found by the shared validators.
fn rejected(err: TodoError) -> HttpResponse {
    match err.as_api() {
        Some(api) => validation_error(api.details.clone().unwrap_or(Value::Null)),
        None => internal_error(err),
    }
}

fn internal_error(err: TodoError) -> HttpResponse {
    tracing::error!("[ContractBackend] {}", err);
    error(500, "SERVER_ERROR", "Internal server error")
}

fn json_response<T: Serialize>(status: u16, value: &T) -> HttpResponse {
    match serde_json::to_string(value) {
        Ok(body) => HttpResponse::new(status, body),
        Err(err) => internal_error(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, path: &str, body: Option<Value>, token: Option<&str>) -> HttpRequest {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        }
        HttpRequest {
            method,
            url: format!("http://backend.test{path}"),
            headers,
            body: body.map(|b| b.to_string()),
        }
    }

    async fn register(backend: &ContractBackend, email: &str) -> String {
        let body = json!({"email": email, "password": "SecurePass123"});
        let response = backend
            .send(request(Method::POST, "/api/auth/register", Some(body), None))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
        let parsed: Value = serde_json::from_str(&response.body).unwrap();
        parsed["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_issued_token_decodes() {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let backend = ContractBackend::with_clock(clock.as_clock());
        let token = register(&backend, "user@example.com").await;

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_HOURS * 3600);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let clock = ManualClock::new(Utc::now());
        let backend = ContractBackend::with_clock(clock.as_clock());
        let token = register(&backend, "user@example.com").await;

        clock.advance(chrono::Duration::hours(TOKEN_LIFETIME_HOURS));
        let response = backend
            .send(request(Method::GET, "/api/tasks", None, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status, 401);
        assert!(response.body.contains("UNAUTHORIZED"));
    }

    #[tokio::test]
    async fn test_registration_rules() {
        let backend = ContractBackend::new();
        let short = json!({"email": "a@example.com", "password": "short"});
        let response = backend
            .send(request(Method::POST, "/api/auth/register", Some(short), None))
            .await
            .unwrap();
        assert_eq!(response.status, 422);

        let bad_email = json!({"email": "not-an-email", "password": "SecurePass123"});
        let response = backend
            .send(request(Method::POST, "/api/auth/register", Some(bad_email), None))
            .await
            .unwrap();
        assert_eq!(response.status, 422);

        register(&backend, "a@example.com").await;
        let duplicate = json!({"email": "A@example.com", "password": "SecurePass123"});
        let response = backend
            .send(request(Method::POST, "/api/auth/register", Some(duplicate), None))
            .await
            .unwrap();
        assert_eq!(response.status, 409);
        assert!(response.body.contains("EMAIL_EXISTS"));
    }

    #[tokio::test]
    async fn test_injected_failures_and_log() {
        let backend = ContractBackend::new();
        backend.fail_next(503, "SERVER_ERROR", "Service unavailable");
        backend.fail_next_network();

        let first = backend.send(request(Method::GET, "/api/tasks", None, None)).await;
        assert_eq!(first.unwrap().status, 503);
        let second = backend.send(request(Method::GET, "/api/tasks", None, None)).await;
        assert!(second.is_err());
        let third = backend.send(request(Method::GET, "/api/tasks", None, None)).await;
        assert_eq!(third.unwrap().status, 401);

        assert_eq!(backend.request_count(Method::GET, "/api/tasks"), 3);
        backend.set_offline(true);
        assert!(backend.send(request(Method::GET, "/api/tasks", None, None)).await.is_err());
    }
}
