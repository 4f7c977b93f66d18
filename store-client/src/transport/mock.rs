//! Mock transport for testing.
//!
//! Serves canned JSON responses by method and URL, and captures every
//! request for verification.
//!
//! Unrouted requests behave like a permissive server: `POST`/`PATCH` echo
//! their body, `DELETE` answers with `null`, `GET` fails with
//! [`TransportError::NoRoute`].

use super::{Method, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// Request body, for `POST` and `PATCH`.
    pub body: Option<Value>,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep a handle while the store owns
/// another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    routes: HashMap<(Method, String), Value>,
    failing_routes: HashMap<(Method, String), String>,
    history: Vec<RecordedRequest>,
    fail_next: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `method url` request with `response`.
    pub fn respond(&self, method: Method, url: &str, response: Value) {
        let mut inner = self.inner.lock();
        inner.routes.insert((method, url.to_string()), response);
    }

    /// Fail every `method url` request with the given error.
    pub fn fail_route(&self, method: Method, url: &str, error: &str) {
        let mut inner = self.inner.lock();
        inner
            .failing_routes
            .insert((method, url.to_string()), error.to_string());
    }

    /// Cause the next request to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        let mut inner = self.inner.lock();
        inner.fail_next = Some(error.to_string());
    }

    /// Get all requests that were made.
    pub fn history(&self) -> Vec<RecordedRequest> {
        let inner = self.inner.lock();
        inner.history.clone()
    }

    /// Get the last request that was made.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        let inner = self.inner.lock();
        inner.history.last().cloned()
    }

    /// Number of `method url` requests made so far.
    pub fn calls(&self, method: Method, url: &str) -> usize {
        let inner = self.inner.lock();
        inner
            .history
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    /// Clear all state (routes, failures, history).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = MockTransportInner::default();
    }

    fn handle(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value, TransportError> {
        let mut inner = self.inner.lock();
        inner.history.push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.clone(),
        });

        // Check for forced failure
        if let Some(error) = inner.fail_next.take() {
            return Err(TransportError::RequestFailed(error));
        }

        let key = (method, url.to_string());
        if let Some(error) = inner.failing_routes.get(&key) {
            return Err(TransportError::RequestFailed(error.clone()));
        }
        if let Some(response) = inner.routes.get(&key) {
            return Ok(response.clone());
        }

        match (method, body) {
            (Method::Post | Method::Patch, Some(body)) => Ok(body),
            (Method::Delete, _) => Ok(Value::Null),
            _ => Err(TransportError::NoRoute {
                method,
                url: url.to_string(),
            }),
        }
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<Value, TransportError> {
        self.handle(Method::Get, url, None)
    }

    async fn post(&self, url: &str, body: Value) -> Result<Value, TransportError> {
        self.handle(Method::Post, url, Some(body))
    }

    async fn patch(&self, url: &str, body: Value) -> Result<Value, TransportError> {
        self.handle(Method::Patch, url, Some(body))
    }

    async fn delete(&self, url: &str) -> Result<Value, TransportError> {
        self.handle(Method::Delete, url, None)
    }
}
