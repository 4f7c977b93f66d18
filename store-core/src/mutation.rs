//! The mutation set.
//!
//! Every change to a [`crate::ModelTable`] is one of six mutations, carried
//! as a typed [`Command`] and applied synchronously by
//! [`crate::EntityStore::commit`]. Hosts that bridge to a name-keyed store
//! can render the conventional name (`ADD_RESOURCE`) with [`Command::name`].

use apistore_types::{EntityId, ModelKey, OneOrMany, QueueKind};
use serde_json::Value;

use crate::{Entity, Record, ReferenceWarning, Registry, StoreError};

/// How an `Add` relates to the confirmed baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// Server-confirmed value: merge into `items` and mirror into `origin`.
    Confirmed,
    /// Optimistic local edit: merge into `items` only.
    Local,
    /// Restore of a baseline: replace the fields of `items` and `origin`.
    Rollback,
}

impl Baseline {
    /// Whether this add writes the origin snapshot.
    pub fn updates_origin(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rollback)
    }
}

/// One synchronous state transition of a model table.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Normalize records into the tables and merge them by id.
    Add {
        /// Records to commit.
        data: OneOrMany<Record>,
        /// Baseline semantics.
        baseline: Baseline,
    },
    /// Reset the table to its empty state.
    Clear,
    /// Remove ids from `items` and `origin`.
    Delete(OneOrMany<EntityId>),
    /// Stage entries in a queue partition.
    QueueAction {
        /// Target partition.
        kind: QueueKind,
        /// Entries to stage.
        data: OneOrMany<Entity>,
    },
    /// Remove entries from a queue partition.
    UnqueueAction {
        /// Target partition.
        kind: QueueKind,
        /// Entries to remove.
        data: OneOrMany<Entity>,
    },
    /// Drop every pending action.
    ResetQueue,
}

impl Mutation {
    /// A confirmed-baseline add.
    pub fn confirmed(data: impl Into<OneOrMany<Record>>) -> Self {
        Self::Add {
            data: data.into(),
            baseline: Baseline::Confirmed,
        }
    }

    /// An optimistic local add.
    pub fn local(data: impl Into<OneOrMany<Record>>) -> Self {
        Self::Add {
            data: data.into(),
            baseline: Baseline::Local,
        }
    }

    /// A delete addressed by the ids found in a JSON payload.
    pub fn delete_json(value: &Value) -> Self {
        Self::Delete(OneOrMany::Many(ids_in(value)))
    }

    /// Upper-case mutation kind (`"ADD"`, `"QUEUE_ACTION"`).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "ADD",
            Self::Clear => "CLEAR",
            Self::Delete(_) => "DELETE",
            Self::QueueAction { .. } => "QUEUE_ACTION",
            Self::UnqueueAction { .. } => "UNQUEUE_ACTION",
            Self::ResetQueue => "RESET_QUEUE",
        }
    }
}

/// A mutation addressed to one model.
#[derive(Debug, Clone)]
pub struct Command {
    /// Target model.
    pub model: ModelKey,
    /// The mutation to apply.
    pub mutation: Mutation,
}

impl Command {
    /// Address a mutation to a model.
    pub fn new(model: impl Into<ModelKey>, mutation: Mutation) -> Self {
        Self {
            model: model.into(),
            mutation,
        }
    }

    /// Conventional mutation name, e.g. `ADD_RESOURCE`.
    pub fn name(&self, registry: &Registry) -> Result<String, StoreError> {
        let definition = registry.model(self.model.as_str())?;
        Ok(format!(
            "{}_{}",
            self.mutation.kind_name(),
            definition.name().to_uppercase()
        ))
    }
}

/// Result of applying a command.
#[derive(Debug, Default)]
pub struct Commit {
    /// Canonical entities produced by an `Add`, in the input's shape.
    pub stored: Option<OneOrMany<Entity>>,
    /// Reference configuration problems met while normalizing.
    pub warnings: Vec<ReferenceWarning>,
}

/// Ids addressed by a JSON payload.
///
/// Accepts a bare id, an object with an `id`, or an array of either;
/// anything without a usable id is skipped.
pub fn ids_in(value: &Value) -> Vec<EntityId> {
    match value {
        Value::Array(items) => items.iter().flat_map(ids_in).collect(),
        Value::Object(_) => EntityId::of_object(value).into_iter().collect(),
        other => EntityId::from_json(other).ok().into_iter().collect(),
    }
}
