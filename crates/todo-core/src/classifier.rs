//! Error classifier.
//!
//! Maps every failure onto a user-facing message plus a retry and redirect
//! recommendation. This module is the only place retryability is decided;
//! the query cache asks it before every retry.

use crate::error::{ApiError, ErrorKind, TodoError};
use crate::navigation::Route;
use serde::{Deserialize, Serialize};
use std::any::Any;

pub const SIGN_IN_MESSAGE: &str = "Please sign in to continue";
pub const PERMISSION_MESSAGE: &str = "You don't have permission to do that";
pub const VALIDATION_MESSAGE: &str = "Please check your input and try again";
pub const NOT_FOUND_MESSAGE: &str = "The requested item was not found";
pub const DUPLICATE_MESSAGE: &str = "This item already exists";
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please wait a moment";
pub const SERVER_MESSAGE: &str = "Something went wrong. Please try again";
pub const NETWORK_MESSAGE: &str = "Unable to connect. Please check your connection";
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Normalized, user-facing view of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub message: String,
    pub should_retry: bool,
    pub redirect: Option<Route>,
}

impl ClassifiedError {
    fn new(message: impl Into<String>, should_retry: bool) -> Self {
        Self {
            message: message.into(),
            should_retry,
            redirect: None,
        }
    }

    fn redirecting(mut self, route: Route) -> Self {
        self.redirect = Some(route);
        self
    }

    /// Result for values that are not error shapes at all.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_MESSAGE, false)
    }
}

fn message_or(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

/// Classifies an HTTP-layer error.
pub fn classify_api(err: &ApiError) -> ClassifiedError {
    match err.kind {
        ErrorKind::Authentication => {
            ClassifiedError::new(SIGN_IN_MESSAGE, false).redirecting(Route::SignIn)
        }
        ErrorKind::Authorization => ClassifiedError::new(PERMISSION_MESSAGE, false),
        ErrorKind::Validation => {
            let fields = err.field_messages();
            let message = if fields.is_empty() {
                message_or(&err.message, VALIDATION_MESSAGE)
            } else {
                fields.join(", ")
            };
            ClassifiedError::new(message, false)
        }
        ErrorKind::NotFound => ClassifiedError::new(NOT_FOUND_MESSAGE, false),
        ErrorKind::Duplicate => {
            ClassifiedError::new(message_or(&err.message, DUPLICATE_MESSAGE), false)
        }
        ErrorKind::RateLimit => ClassifiedError::new(RATE_LIMIT_MESSAGE, true),
        ErrorKind::Server => ClassifiedError::new(SERVER_MESSAGE, true),
        ErrorKind::Network => ClassifiedError::new(NETWORK_MESSAGE, true),
        ErrorKind::Unknown => ClassifiedError::new(message_or(&err.message, FALLBACK_MESSAGE), true),
    }
}

/// Classifies any crate error.
///
/// Local failures (storage, configuration, ...) are generic exceptions: their
/// message is shown and they are never retried.
pub fn classify(err: &TodoError) -> ClassifiedError {
    match err {
        TodoError::Api(api) => classify_api(api),
        other => ClassifiedError::new(message_or(&other.to_string(), FALLBACK_MESSAGE), false),
    }
}

/// Classifies an arbitrary value, such as a panic payload.
///
/// Recognised error shapes are delegated; anything else gets the generic
/// fallback and no retry.
pub fn classify_any(value: &(dyn Any + Send)) -> ClassifiedError {
    if let Some(err) = value.downcast_ref::<TodoError>() {
        classify(err)
    } else if let Some(err) = value.downcast_ref::<ApiError>() {
        classify_api(err)
    } else {
        ClassifiedError::fallback()
    }
}
