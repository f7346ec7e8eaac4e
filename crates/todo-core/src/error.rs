//! Error types for the todo client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Closed taxonomy every HTTP failure is sorted into.
///
/// The kind is decided once, when the [`ApiError`] is built at the HTTP
/// boundary. Nothing downstream re-inspects raw codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[strum(serialize = "AUTHENTICATION_ERROR")]
    Authentication,
    #[strum(serialize = "AUTHORIZATION_ERROR")]
    Authorization,
    #[strum(serialize = "VALIDATION_ERROR")]
    Validation,
    #[strum(serialize = "RESOURCE_NOT_FOUND")]
    NotFound,
    #[strum(serialize = "DUPLICATE_RESOURCE")]
    Duplicate,
    #[strum(serialize = "RATE_LIMIT_ERROR")]
    RateLimit,
    #[strum(serialize = "SERVER_ERROR")]
    Server,
    #[strum(serialize = "NETWORK_ERROR")]
    Network,
    /// A code the client does not recognise.
    #[strum(serialize = "UNKNOWN_ERROR")]
    Unknown,
}

impl ErrorKind {
    /// Maps a wire error code onto the taxonomy.
    ///
    /// Accepts both the taxonomy names and the codes the backend actually
    /// emits (`UNAUTHORIZED`, `FORBIDDEN`, `EMAIL_EXISTS`, ...).
    pub fn from_code(code: &str) -> Self {
        match code {
            "AUTHENTICATION_ERROR" | "UNAUTHORIZED" | "INVALID_CREDENTIALS" => Self::Authentication,
            "AUTHORIZATION_ERROR" | "FORBIDDEN" => Self::Authorization,
            "VALIDATION_ERROR" => Self::Validation,
            "RESOURCE_NOT_FOUND" | "NOT_FOUND" => Self::NotFound,
            "DUPLICATE_RESOURCE" | "EMAIL_EXISTS" => Self::Duplicate,
            "RATE_LIMIT_ERROR" => Self::RateLimit,
            "SERVER_ERROR" => Self::Server,
            "NETWORK_ERROR" => Self::Network,
            _ => Self::Unknown,
        }
    }
}

/// Error body the backend returns on non-success statuses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Typed error raised by the request client for every failed call.
///
/// Transport failures use status `0` and code `NETWORK_ERROR`, so callers
/// handle one shape regardless of where the failure happened.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[error("{message} (status {status}, {code})")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    pub code: String,
    pub details: Option<Value>,
}

pub const NETWORK_ERROR_CODE: &str = "NETWORK_ERROR";
pub const SERVER_ERROR_CODE: &str = "SERVER_ERROR";
pub const VALIDATION_ERROR_CODE: &str = "VALIDATION_ERROR";

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            kind: ErrorKind::from_code(&code),
            message: message.into(),
            status,
            code,
            details: None,
        }
    }

    /// Builds the error from a parsed wire body and the real HTTP status.
    pub fn from_body(status: u16, body: ErrorBody) -> Self {
        Self {
            details: body.details,
            ..Self::new(status, body.error, body.message)
        }
    }

    /// Body synthesised when a failed response could not be parsed.
    pub fn unparseable(status: u16) -> Self {
        Self::new(status, SERVER_ERROR_CODE, "An unexpected error occurred")
    }

    /// A failure where no response reached the client.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, NETWORK_ERROR_CODE, message)
    }

    /// A validation failure detected before the request was sent.
    pub fn validation(message: impl Into<String>, details: Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(400, VALIDATION_ERROR_CODE, message)
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Flattens `details` into human readable field messages.
    ///
    /// Accepts `{field: "msg"}`, `{field: ["msg", ...]}` and `["msg", ...]`.
    pub fn field_messages(&self) -> Vec<String> {
        fn collect(value: &Value, out: &mut Vec<String>) {
            match value {
                Value::String(s) => out.push(s.clone()),
                Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
                Value::Object(map) => map.values().for_each(|item| collect(item, out)),
                _ => {}
            }
        }

        let mut messages = Vec::new();
        if let Some(details) = &self.details {
            collect(details, &mut messages);
        }
        messages
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }
}

/// A shared error type for the todo crates.
///
/// HTTP failures travel as [`TodoError::Api`]; everything else is a local
/// failure the classifier treats as a generic, non-retryable error.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TodoError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Client storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    /// The context has been disposed or was never initialised.
    #[error("Session context unavailable: {0}")]
    Lifecycle(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TodoError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Taxonomy kind when this error came from the HTTP layer.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.as_api().map(|err| err.kind)
    }
}

impl From<std::io::Error> for TodoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for TodoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TodoError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for TodoError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for TodoError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, TodoError>`.
pub type Result<T> = std::result::Result<T, TodoError>;
