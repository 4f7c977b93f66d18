//! # store-types
//!
//! Shared types for the apistore entity cache.
//!
//! This crate provides the foundational types used across all apistore crates:
//! - [`EntityId`], [`ModelKey`] - Identity types
//! - [`OneOrMany`] - Single-or-batch payload shape
//! - [`QueueKind`] - Action queue partitions
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod payload;

pub use error::TypesError;
pub use ids::{EntityId, ModelKey};
pub use payload::{OneOrMany, QueueKind};
