//! Error types for apistore-core.

use apistore_types::{EntityId, ModelKey, QueueKind};
use thiserror::Error;

/// Errors raised by the store while applying a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The model key is not in the registry
    #[error("unknown model: {0}")]
    UnknownModel(ModelKey),

    /// An id-keyed operation got a record without an id
    #[error("{model}: {kind} entry has no id")]
    MissingId {
        /// Model the entry was addressed to.
        model: ModelKey,
        /// Queue partition or operation name.
        kind: String,
    },

    /// A patch/delete was queued for an id with no confirmed baseline
    #[error("{model}: cannot queue {kind} for {id}, no origin baseline")]
    NoBaseline {
        /// Model the entry was addressed to.
        model: ModelKey,
        /// Queue partition.
        kind: QueueKind,
        /// The id lacking an origin entry.
        id: EntityId,
    },

    /// Payload has the wrong JSON shape
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::UnknownModel(ModelKey::from("fakeref"));
        assert_eq!(err.to_string(), "unknown model: fakeref");

        let err = StoreError::NoBaseline {
            model: ModelKey::from("resource"),
            kind: QueueKind::Patch,
            id: EntityId::Int(7),
        };
        assert_eq!(
            err.to_string(),
            "resource: cannot queue patch for 7, no origin baseline"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
