//! Request client: header injection, JSON decoding, uniform errors.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use todo_core::error::ErrorBody;
use todo_core::storage::TokenStore;
use todo_core::ApiError;

/// Code used when a success response does not match the expected shape.
pub const INVALID_RESPONSE_CODE: &str = "INVALID_RESPONSE";

/// Per-call options: method, JSON body and header overrides.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::with_method(Method::GET)
    }

    pub fn post(body: Value) -> Self {
        Self::with_method(Method::POST).body(body)
    }

    pub fn put(body: Value) -> Self {
        Self::with_method(Method::PUT).body(body)
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header. Caller headers replace the defaults of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Sends JSON requests to the backend on behalf of the signed-in user.
///
/// Every failure comes back as an [`ApiError`]: non-success statuses carry the
/// server's code and message, transport failures carry status `0` and
/// `NETWORK_ERROR`.
#[derive(Clone)]
pub struct RequestClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
}

impl RequestClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>, tokens: TokenStore) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let method = options.method.clone();
        let request = HttpRequest {
            method: options.method.clone(),
            url: format!("{}{}", self.base_url, endpoint),
            headers: self.build_headers(&options.headers)?,
            body: options.body.as_ref().map(Value::to_string),
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("[RequestClient] {} {} failed: {}", method, endpoint, err);
                return Err(ApiError::network(err.message));
            }
        };
        tracing::debug!("[RequestClient] {} {} -> {}", method, endpoint, response.status);

        if !response.is_success() {
            return Err(error_from_response(&response));
        }

        serde_json::from_str(&response.body).map_err(|err| {
            ApiError::new(
                response.status,
                INVALID_RESPONSE_CODE,
                format!("Unexpected response from {endpoint}: {err}"),
            )
        })
    }

    fn build_headers(&self, overrides: &[(String, String)]) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self.tokens.get() {
            Ok(Some(token)) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| invalid_header("Authorization"))?;
                headers.insert(AUTHORIZATION, value);
            }
            Ok(None) => {}
            // An unreadable store is treated as signed out; the server decides.
            Err(err) => tracing::warn!("[RequestClient] Could not read token: {}", err),
        }

        for (name, value) in overrides {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid_header(name))?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid_header(name.as_str()))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

fn error_from_response(response: &HttpResponse) -> ApiError {
    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(body) => ApiError::from_body(response.status, body),
        Err(_) => ApiError::unparseable(response.status),
    }
}

fn invalid_header(name: &str) -> ApiError {
    ApiError::validation(
        format!("Invalid header: {name}"),
        Value::from(format!("Header {name} is not a valid HTTP header")),
    )
}
