//! # store-core
//!
//! Pure logic for apistore (no I/O, instant tests).
//!
//! This crate implements the normalized entity cache without any network
//! access:
//! - [`Record`] / [`Entity`] - JSON records and shared entity handles
//! - [`Registry`] / [`ModelDefinition`] / [`ModelHooks`] - model configuration
//! - [`ModelTable`] / [`ActionQueue`] - per-model items, origin and queue
//! - [`Mutation`] / [`Command`] - the synchronous state transitions
//! - [`EntityStore`] - owns the tables and applies commands
//!
//! ## Design Philosophy
//!
//! Every change to a table is a [`Command`] applied by
//! [`EntityStore::commit`]. Commits are synchronous and atomic. The actual
//! I/O (HTTP requests, queue replay) is performed by `store-client`, which
//! turns responses into commands.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod mutation;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod table;

pub use error::StoreError;
pub use mutation::{ids_in, Baseline, Command, Commit, Mutation};
pub use record::{Entity, Field, Record};
pub use registry::{ModelDefinition, ModelHooks, Registry};
pub use resolver::ReferenceWarning;
pub use store::EntityStore;
pub use table::{ActionQueue, ModelTable};

// Re-export the shared types so downstream crates need one import path
pub use apistore_types::{EntityId, ModelKey, OneOrMany, QueueKind};
