//! Shared helpers for the application integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use todo_interaction::testing::ContractBackend;
use todo_interaction::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// Forwards to the contract backend and holds back the reply to one route.
///
/// The backend answers immediately, so the response reflects server state
/// at request time; only its delivery is late.
pub struct DelayedTransport {
    backend: Arc<ContractBackend>,
    method: Method,
    path: &'static str,
    delay: Duration,
    delayed_auth: Mutex<Vec<Option<String>>>,
}

impl DelayedTransport {
    pub fn new(backend: Arc<ContractBackend>, method: Method, path: &'static str, delay: Duration) -> Self {
        Self {
            backend,
            method,
            path,
            delay,
            delayed_auth: Mutex::new(Vec::new()),
        }
    }

    /// `Authorization` headers of the delayed requests, in order.
    pub fn delayed_authorizations(&self) -> Vec<Option<String>> {
        self.delayed_auth.lock().unwrap().clone()
    }

    fn matches(&self, request: &HttpRequest) -> bool {
        request.method == self.method
            && request
                .url
                .split_once("://")
                .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
                == Some(self.path)
    }
}

#[async_trait]
impl HttpTransport for DelayedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if !self.matches(&request) {
            return self.backend.send(request).await;
        }

        let authorization = request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.delayed_auth.lock().unwrap().push(authorization);

        let response = self.backend.send(request).await;
        tokio::time::sleep(self.delay).await;
        response
    }
}
