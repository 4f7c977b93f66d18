//! The entity store.
//!
//! Owns one [`ModelTable`] per registered model and applies [`Command`]s to
//! them. Each commit runs under the table lock, so it is atomic with respect
//! to every other commit and read.

use std::collections::BTreeMap;

use apistore_types::{EntityId, ModelKey, OneOrMany};
use parking_lot::Mutex;

use crate::resolver::Resolver;
use crate::{
    ActionQueue, Command, Commit, Entity, ModelTable, Mutation, Record, Registry, StoreError,
};

pub(crate) type Tables = BTreeMap<ModelKey, ModelTable>;

/// Per-model tables plus the registry describing them.
#[derive(Debug)]
pub struct EntityStore {
    registry: Registry,
    tables: Mutex<Tables>,
}

impl EntityStore {
    /// Create an empty table for every registered model.
    pub fn new(registry: Registry) -> Self {
        let tables = registry
            .keys()
            .map(|key| (key.clone(), ModelTable::new(key.clone())))
            .collect();
        Self {
            registry,
            tables: Mutex::new(tables),
        }
    }

    /// The registry this store was built from.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Apply one command.
    pub fn commit(&self, command: Command) -> Result<Commit, StoreError> {
        let Command { model, mutation } = command;
        self.registry.model(model.as_str())?;
        tracing::debug!("Commit {} on {}", mutation.kind_name(), model);

        let mut tables = self.tables.lock();

        match mutation {
            Mutation::Add { data, baseline } => {
                let mut resolver = Resolver::new(&self.registry, &mut tables, baseline);
                let stored = resolver.normalize(&model, data)?;
                Ok(Commit {
                    stored: Some(stored),
                    warnings: resolver.into_warnings(),
                })
            }
            Mutation::Clear => {
                table_mut(&mut tables, &model)?.clear();
                Ok(Commit::default())
            }
            Mutation::Delete(ids) => {
                let table = table_mut(&mut tables, &model)?;
                for id in ids {
                    table.delete(&id);
                }
                Ok(Commit::default())
            }
            Mutation::QueueAction { kind, data } => {
                table_mut(&mut tables, &model)?.enqueue(kind, data)?;
                Ok(Commit::default())
            }
            Mutation::UnqueueAction { kind, data } => {
                let table = table_mut(&mut tables, &model)?;
                for entity in data.iter() {
                    if !table.dequeue(kind, entity) {
                        tracing::debug!("No queued {} entry matched on {}", kind, model);
                    }
                }
                Ok(Commit::default())
            }
            Mutation::ResetQueue => {
                table_mut(&mut tables, &model)?.reset_queue();
                Ok(Commit::default())
            }
        }
    }

    /// Run `f` against a table while holding the store lock.
    ///
    /// `f` must not call back into the store.
    pub fn read<R>(&self, model: &str, f: impl FnOnce(&ModelTable) -> R) -> Result<R, StoreError> {
        let tables = self.tables.lock();
        tables
            .get(model)
            .map(f)
            .ok_or_else(|| StoreError::UnknownModel(ModelKey::from(model)))
    }

    /// The canonical entity stored under `id`.
    pub fn item(&self, model: &str, id: &EntityId) -> Option<Entity> {
        self.read(model, |table| table.item(id).cloned()).ok().flatten()
    }

    /// The confirmed baseline stored under `id`.
    pub fn origin(&self, model: &str, id: &EntityId) -> Option<Record> {
        self.read(model, |table| table.origin(id).cloned()).ok().flatten()
    }

    /// Whether a model has pending actions. Unknown models have none.
    pub fn has_action(&self, model: &str) -> bool {
        self.read(model, ModelTable::has_action).unwrap_or(false)
    }

    /// A copy of a model's pending actions.
    pub fn queue(&self, model: &str) -> Result<ActionQueue, StoreError> {
        self.read(model, |table| table.queue().clone())
    }

    /// Whether at least one entity differs from its confirmed baseline.
    pub fn has_changes(&self, model: &str, data: &OneOrMany<Entity>) -> Result<bool, StoreError> {
        self.read(model, |table| table.has_changes(data))
    }
}

fn table_mut<'a>(tables: &'a mut Tables, model: &ModelKey) -> Result<&'a mut ModelTable, StoreError> {
    tables
        .get_mut(model.as_str())
        .ok_or_else(|| StoreError::UnknownModel(model.clone()))
}
