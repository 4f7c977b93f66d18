//! # store-client
//!
//! Async client for the apistore normalized entity cache.
//!
//! This is the main library that applications use to keep a local cache of
//! REST resources.
//!
//! ## Features
//!
//! - **Normalized cache**: nested responses are flattened into per-model
//!   tables whose references are shared entities (via store-core)
//! - **Optimistic edits**: stage creates/updates/deletes, replay them or
//!   roll them back to the last confirmed state
//! - **Transport Abstraction**: Pluggable transport layer (reqwest, mock)
//! - **Typed dispatch**: every operation is also an [`Operation`] value
//!
//! ## Example
//!
//! ```ignore
//! use apistore_client::{ApiStore, HttpTransport, QueueKind, Request, StoreConfig};
//!
//! let config = StoreConfig::load("apistore.toml".as_ref())?;
//! let store = ApiStore::new(registry, config, HttpTransport::new());
//!
//! // Fetch and normalize
//! let resources = store.get(Request::new("resource")).await?;
//!
//! // Edit in place, stage, replay
//! let first = resources.into_vec().remove(0);
//! first.write().set("name", "renamed");
//! store.queue_action_watcher("resource", QueueKind::Patch, first)?;
//! let report = store.process_action_queue(&["resource"]).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod operation;
pub mod queue;
pub mod transport;
pub mod url;

pub use client::{ApiStore, ClientError, Request};
pub use config::{value_at, ConfigError, StoreConfig};
pub use operation::{Operation, Outcome};
pub use queue::{ReplayOutcome, ReplayReport};
pub use transport::{
    HttpTransport, Method, MockTransport, RecordedRequest, Transport, TransportError,
};
pub use url::UrlBuilder;

// Re-export the core API so applications need a single dependency
pub use apistore_core::{
    Baseline, Command, Entity, EntityId, EntityStore, Field, ModelDefinition, ModelHooks,
    ModelKey, Mutation, OneOrMany, QueueKind, Record, Registry, StoreError,
};
