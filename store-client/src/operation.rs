//! Typed operation dispatch.
//!
//! Every public operation of [`ApiStore`] as one enum, for hosts that route
//! operations through a single entry point.

use apistore_core::{Entity, ModelKey, OneOrMany, QueueKind};

use crate::client::{ApiStore, ClientError, Request};
use crate::queue::ReplayReport;
use crate::transport::Transport;

/// One dispatcher operation.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Fetch through the cache.
    Get(Request),
    /// Create.
    Post(Request),
    /// Update.
    Patch(Request),
    /// Delete.
    Delete(Request),
    /// Stage entries unconditionally.
    QueueAction {
        /// Target model.
        model: ModelKey,
        /// Queue partition.
        kind: QueueKind,
        /// Entries to stage.
        data: OneOrMany<Entity>,
    },
    /// Stage entries if any of them changed.
    QueueActionWatcher {
        /// Target model.
        model: ModelKey,
        /// Queue partition.
        kind: QueueKind,
        /// Entries to check and stage.
        data: OneOrMany<Entity>,
    },
    /// Replay the queues of these models.
    ProcessActionQueue(Vec<ModelKey>),
    /// Remove one staged entry.
    CancelAction {
        /// Target model.
        model: ModelKey,
        /// Queue partition.
        kind: QueueKind,
        /// Entry to remove.
        data: OneOrMany<Entity>,
    },
    /// Roll back the queues of these models.
    CancelActionQueue(Vec<ModelKey>),
}

impl Operation {
    /// Conventional operation name (`"get"`, `"processActionQueue"`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get(_) => "get",
            Self::Post(_) => "post",
            Self::Patch(_) => "patch",
            Self::Delete(_) => "delete",
            Self::QueueAction { .. } => "queueAction",
            Self::QueueActionWatcher { .. } => "queueActionWatcher",
            Self::ProcessActionQueue(_) => "processActionQueue",
            Self::CancelAction { .. } => "cancelAction",
            Self::CancelActionQueue(_) => "cancelActionQueue",
        }
    }
}

/// What an operation produced.
#[derive(Debug)]
pub enum Outcome {
    /// Canonical entities committed or served from the cache.
    Entities(OneOrMany<Entity>),
    /// A delete was confirmed.
    Deleted,
    /// Whether entries were staged.
    Queued(bool),
    /// Per-entry replay results.
    Replayed(ReplayReport),
    /// Staged entries were discarded.
    Cancelled,
}

impl<T: Transport> ApiStore<T> {
    /// Run one operation.
    pub async fn dispatch(&self, operation: Operation) -> Result<Outcome, ClientError> {
        tracing::debug!("Dispatch {}", operation.name());

        match operation {
            Operation::Get(request) => self.get(request).await.map(Outcome::Entities),
            Operation::Post(request) => self.post(request).await.map(Outcome::Entities),
            Operation::Patch(request) => self.patch(request).await.map(Outcome::Entities),
            Operation::Delete(request) => {
                self.delete(request).await?;
                Ok(Outcome::Deleted)
            }
            Operation::QueueAction { model, kind, data } => {
                self.queue_action(model.as_str(), kind, data)?;
                Ok(Outcome::Queued(true))
            }
            Operation::QueueActionWatcher { model, kind, data } => self
                .queue_action_watcher(model.as_str(), kind, data)
                .map(Outcome::Queued),
            Operation::ProcessActionQueue(models) => {
                let models: Vec<&str> = models.iter().map(ModelKey::as_str).collect();
                self.process_action_queue(&models)
                    .await
                    .map(Outcome::Replayed)
            }
            Operation::CancelAction { model, kind, data } => {
                self.cancel_action(model.as_str(), kind, data)?;
                Ok(Outcome::Cancelled)
            }
            Operation::CancelActionQueue(models) => {
                let models: Vec<&str> = models.iter().map(ModelKey::as_str).collect();
                self.cancel_action_queue(&models)?;
                Ok(Outcome::Cancelled)
            }
        }
    }
}
