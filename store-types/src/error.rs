//! Error types for apistore-types.

use thiserror::Error;

/// Errors raised while interpreting identity or payload values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// The value cannot serve as an entity id
    #[error("invalid entity id: {0}")]
    InvalidId(String),

    /// Unknown action queue partition name
    #[error("invalid queue kind: {0}")]
    InvalidQueueKind(String),
}
