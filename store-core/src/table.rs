//! Per-model tables.
//!
//! A [`ModelTable`] holds three views of one model:
//! - `items`: the current, possibly locally edited entities
//! - `origin`: the last confirmed value of each entity (rollback baseline)
//! - `queue`: pending create/update/delete actions awaiting replay
//!
//! Tables are only changed through the mutation set (see [`crate::Mutation`]),
//! applied by [`crate::EntityStore::commit`].

use std::collections::BTreeMap;

use apistore_types::{EntityId, ModelKey, OneOrMany, QueueKind};
use chrono::{DateTime, Utc};

use crate::{Baseline, Entity, Record, StoreError};

/// Pending actions of one model.
///
/// `post` entries are ordered and need no id; `patch` and `delete` entries
/// are keyed by id with last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    post: Vec<Entity>,
    patch: BTreeMap<EntityId, Entity>,
    delete: BTreeMap<EntityId, Entity>,
}

impl ActionQueue {
    /// Queued creates, in order.
    pub fn post(&self) -> &[Entity] {
        &self.post
    }

    /// Queued updates by id.
    pub fn patch(&self) -> &BTreeMap<EntityId, Entity> {
        &self.patch
    }

    /// Queued deletes by id.
    pub fn delete(&self) -> &BTreeMap<EntityId, Entity> {
        &self.delete
    }

    /// Whether an id is queued in the `patch` or `delete` partition.
    pub fn contains(&self, kind: QueueKind, id: &EntityId) -> bool {
        match kind {
            QueueKind::Post => self.post.iter().any(|e| e.id().as_ref() == Some(id)),
            QueueKind::Patch => self.patch.contains_key(id),
            QueueKind::Delete => self.delete.contains_key(id),
        }
    }

    /// Total number of queued entries.
    pub fn len(&self) -> usize {
        self.post.len() + self.patch.len() + self.delete.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.post.is_empty() && self.patch.is_empty() && self.delete.is_empty()
    }

    /// Every entry with its partition, in replay order.
    pub fn entries(&self) -> Vec<(QueueKind, Entity)> {
        self.post
            .iter()
            .map(|e| (QueueKind::Post, e.clone()))
            .chain(self.patch.values().map(|e| (QueueKind::Patch, e.clone())))
            .chain(self.delete.values().map(|e| (QueueKind::Delete, e.clone())))
            .collect()
    }

    /// Ids queued in the `patch` or `delete` partitions, deduplicated.
    pub fn baseline_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .delete
            .keys()
            .chain(self.patch.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Storage for one model.
#[derive(Debug)]
pub struct ModelTable {
    model: ModelKey,
    items: BTreeMap<EntityId, Entity>,
    origin: BTreeMap<EntityId, Record>,
    queue: ActionQueue,
    loaded: bool,
    last_load: DateTime<Utc>,
}

impl ModelTable {
    /// Create an empty table.
    pub fn new(model: ModelKey) -> Self {
        Self {
            model,
            items: BTreeMap::new(),
            origin: BTreeMap::new(),
            queue: ActionQueue::default(),
            loaded: false,
            last_load: Utc::now(),
        }
    }

    /// The model this table stores.
    pub fn model(&self) -> &ModelKey {
        &self.model
    }

    /// Current entity for an id.
    pub fn item(&self, id: &EntityId) -> Option<&Entity> {
        self.items.get(id)
    }

    /// All current entities.
    pub fn items(&self) -> &BTreeMap<EntityId, Entity> {
        &self.items
    }

    /// Confirmed baseline for an id.
    pub fn origin(&self, id: &EntityId) -> Option<&Record> {
        self.origin.get(id)
    }

    /// All confirmed baselines.
    pub fn origin_items(&self) -> &BTreeMap<EntityId, Record> {
        &self.origin
    }

    /// Pending actions.
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Whether any action is pending.
    pub fn has_action(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Whether a confirmed load has happened since the last clear.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// Time of the last confirmed load (or of creation/clear).
    pub fn last_load(&self) -> DateTime<Utc> {
        self.last_load
    }

    /// Number of current entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the table holds no entities.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a record differs from its confirmed baseline.
    ///
    /// Records without an id or without a baseline never count as changed.
    pub fn is_changed(&self, record: &Record) -> bool {
        record
            .id()
            .and_then(|id| self.origin.get(&id))
            .is_some_and(|origin| origin != record)
    }

    /// Whether at least one entity of a payload differs from its baseline.
    pub fn has_changes(&self, data: &OneOrMany<Entity>) -> bool {
        data.iter().any(|e| self.is_changed(&e.read()))
    }

    /// Merge a record into `items`, returning its canonical entity.
    ///
    /// The stored entity keeps its identity: fields are written into the
    /// existing slot. Records without an id are not stored.
    pub(crate) fn add(&mut self, record: Record, baseline: Baseline) -> Option<Entity> {
        let id = record.id()?;

        let entity = match self.items.get(&id) {
            Some(existing) => {
                {
                    let mut slot = existing.write();
                    match baseline {
                        Baseline::Rollback => slot.replace(record),
                        Baseline::Confirmed | Baseline::Local => slot.merge(record),
                    }
                }
                existing.clone()
            }
            None => {
                let entity = Entity::new(record);
                self.items.insert(id.clone(), entity.clone());
                entity
            }
        };

        if baseline.updates_origin() {
            self.origin.insert(id, entity.snapshot());
        }
        if baseline == Baseline::Confirmed {
            self.loaded = true;
            self.last_load = Utc::now();
        }

        Some(entity)
    }

    /// Reset to the empty state.
    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.origin.clear();
        self.queue = ActionQueue::default();
        self.loaded = false;
        self.last_load = Utc::now();
    }

    /// Remove an id from `items` and `origin`.
    pub(crate) fn delete(&mut self, id: &EntityId) -> bool {
        let in_items = self.items.remove(id).is_some();
        let in_origin = self.origin.remove(id).is_some();
        in_items || in_origin
    }

    /// Stage entries in a queue partition.
    ///
    /// The whole batch is checked before anything is staged, so a rejected
    /// entry leaves the queue untouched.
    pub(crate) fn enqueue(
        &mut self,
        kind: QueueKind,
        data: OneOrMany<Entity>,
    ) -> Result<(), StoreError> {
        if kind == QueueKind::Post {
            self.queue.post.extend(data);
            return Ok(());
        }

        let mut keyed = Vec::with_capacity(data.len());
        for entity in data {
            let id = entity.id().ok_or_else(|| StoreError::MissingId {
                model: self.model.clone(),
                kind: kind.to_string(),
            })?;
            if !self.origin.contains_key(&id) {
                return Err(StoreError::NoBaseline {
                    model: self.model.clone(),
                    kind,
                    id,
                });
            }
            keyed.push((id, entity));
        }

        let partition = match kind {
            QueueKind::Patch => &mut self.queue.patch,
            _ => &mut self.queue.delete,
        };
        partition.extend(keyed);
        Ok(())
    }

    /// Remove one entry from a queue partition.
    ///
    /// `post` entries match by identity first, then structurally.
    pub(crate) fn dequeue(&mut self, kind: QueueKind, entity: &Entity) -> bool {
        match kind {
            QueueKind::Post => {
                let position = self
                    .queue
                    .post
                    .iter()
                    .position(|e| Entity::ptr_eq(e, entity))
                    .or_else(|| {
                        let target = entity.read();
                        self.queue.post.iter().position(|e| *e.read() == *target)
                    });
                match position {
                    Some(index) => {
                        self.queue.post.remove(index);
                        true
                    }
                    None => false,
                }
            }
            QueueKind::Patch | QueueKind::Delete => {
                let Some(id) = entity.id() else {
                    return false;
                };
                let partition = match kind {
                    QueueKind::Patch => &mut self.queue.patch,
                    _ => &mut self.queue.delete,
                };
                partition.remove(&id).is_some()
            }
        }
    }

    /// Drop every pending action.
    pub(crate) fn reset_queue(&mut self) {
        self.queue = ActionQueue::default();
    }
}
