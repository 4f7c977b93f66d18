//! Transport abstraction for apistore.
//!
//! This module provides a pluggable transport layer that abstracts the
//! remote API (HTTP via reqwest, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and JSON-in, JSON-out:
//! - `get()` / `delete()` address a URL
//! - `post()` / `patch()` also carry a JSON body
//!
//! Failures are surfaced unchanged. There is no retry at this layer.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.respond(Method::Get, "/resource/1", json!({"id": 1}));
//! let body = transport.get("/resource/1").await?;
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockTransport, RecordedRequest};

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request failed before a response was received.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The server answered with a non-success status.
    #[error("{method} {url} returned status {status}")]
    Status {
        /// Request method.
        method: Method,
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body is not valid JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The mock transport has no response for this request.
    #[error("no route for {method} {url}")]
    NoRoute {
        /// Request method.
        method: Method,
        /// Request URL.
        url: String,
    },
}

/// Request methods used by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// Fetch.
    Get,
    /// Create.
    Post,
    /// Update, and batch delete.
    Patch,
    /// Single delete.
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport trait for talking to the remote API.
///
/// Implementations handle the underlying mechanism (HTTP, mock, etc).
/// An empty response body is returned as `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a resource or collection.
    async fn get(&self, url: &str) -> Result<Value, TransportError>;

    /// Create a resource.
    async fn post(&self, url: &str, body: Value) -> Result<Value, TransportError>;

    /// Update a resource or batch.
    async fn patch(&self, url: &str, body: Value) -> Result<Value, TransportError>;

    /// Delete a resource.
    async fn delete(&self, url: &str) -> Result<Value, TransportError>;
}
