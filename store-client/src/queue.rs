//! Action queue engine.
//!
//! Stages optimistic edits in a model's [`apistore_core::ActionQueue`],
//! replays them against the transport, or rolls them back to the origin
//! snapshot.
//!
//! # Replay
//!
//! Every entry of every queued model is dispatched concurrently. An entry
//! that succeeds is dequeued; an entry that fails stays queued and is
//! reported. A model whose entries all succeeded ends with `RESET_QUEUE`.
//!
//! # Rollback
//!
//! Cancelling a queue restores every `patch`/`delete` id from `origin`
//! (through the model's `after_queue` hook) and drops unconfirmed `post`
//! placeholders from `items`.

use std::collections::BTreeSet;
use std::fmt;

use apistore_core::{
    Baseline, Command, Entity, EntityId, ModelKey, Mutation, OneOrMany, QueueKind,
};
use futures_util::future::join_all;

use crate::client::{ApiStore, ClientError, Request};
use crate::transport::Transport;

/// Result of replaying one queue entry.
#[derive(Debug)]
pub struct ReplayOutcome {
    /// Model the entry belongs to.
    pub model: ModelKey,
    /// Queue partition.
    pub kind: QueueKind,
    /// Id of the entry (post placeholders may have none).
    pub id: Option<EntityId>,
    /// What the server said.
    pub result: Result<(), ClientError>,
}

impl ReplayOutcome {
    /// Whether the entry was confirmed.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for ReplayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        match &self.result {
            Ok(()) => write!(f, "{} {} {}: ok", self.model, self.kind, id),
            Err(e) => write!(f, "{} {} {}: {}", self.model, self.kind, id, e),
        }
    }
}

/// Per-entry results of a queue replay.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// One outcome per replayed entry.
    pub outcomes: Vec<ReplayOutcome>,
}

impl ReplayReport {
    /// Whether every entry succeeded (vacuously true when nothing ran).
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ReplayOutcome::is_ok)
    }

    /// Confirmed entries.
    pub fn succeeded(&self) -> impl Iterator<Item = &ReplayOutcome> {
        self.outcomes.iter().filter(|o| o.is_ok())
    }

    /// Rejected entries.
    pub fn failed(&self) -> impl Iterator<Item = &ReplayOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    /// Number of replayed entries.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing was replayed.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl<T: Transport> ApiStore<T> {
    /// Stage entries unconditionally.
    pub fn queue_action(
        &self,
        model: &str,
        kind: QueueKind,
        data: impl Into<OneOrMany<Entity>>,
    ) -> Result<(), ClientError> {
        self.store().commit(Command::new(
            model,
            Mutation::QueueAction {
                kind,
                data: data.into(),
            },
        ))?;
        Ok(())
    }

    /// Stage entries only if at least one differs from its baseline.
    ///
    /// `patch`/`delete` elements without a baseline are left out of the
    /// staged batch. Returns whether anything was queued.
    pub fn queue_action_watcher(
        &self,
        model: &str,
        kind: QueueKind,
        data: impl Into<OneOrMany<Entity>>,
    ) -> Result<bool, ClientError> {
        self.store().registry().model(model)?;
        let data = match data.into() {
            OneOrMany::Many(entities) if kind != QueueKind::Post => OneOrMany::Many(
                entities
                    .into_iter()
                    .filter(|e| self.has_baseline(model, e))
                    .collect(),
            ),
            data => data,
        };
        if !self.store().has_changes(model, &data)? {
            return Ok(false);
        }
        self.queue_action(model, kind, data)?;
        Ok(true)
    }

    fn has_baseline(&self, model: &str, entity: &Entity) -> bool {
        entity
            .id()
            .is_some_and(|id| self.store().origin(model, &id).is_some())
    }

    /// Remove one staged entry.
    pub fn cancel_action(
        &self,
        model: &str,
        kind: QueueKind,
        data: impl Into<OneOrMany<Entity>>,
    ) -> Result<(), ClientError> {
        self.store().commit(Command::new(
            model,
            Mutation::UnqueueAction {
                kind,
                data: data.into(),
            },
        ))?;
        Ok(())
    }

    /// Replay the queues of `models` against the transport.
    ///
    /// Transport failures are reported per entry and never stop siblings;
    /// only an unknown model fails the whole call.
    pub async fn process_action_queue(&self, models: &[&str]) -> Result<ReplayReport, ClientError> {
        let mut pending = Vec::new();
        for &model in models {
            let key = self.store().registry().model(model)?.key().clone();
            if !self.store().has_action(model) {
                continue;
            }
            for (kind, entity) in self.store().queue(model)?.entries() {
                pending.push((key.clone(), kind, entity));
            }
        }

        tracing::debug!("Replaying {} queued actions", pending.len());
        let outcomes = join_all(
            pending
                .into_iter()
                .map(|(model, kind, entity)| self.replay(model, kind, entity)),
        )
        .await;

        let mut failed_models = BTreeSet::new();
        for outcome in outcomes.iter().filter(|o| !o.is_ok()) {
            tracing::warn!("Queued action failed: {}", outcome);
            failed_models.insert(outcome.model.clone());
        }
        for &model in models {
            if !failed_models.contains(model) && self.store().has_action(model) {
                self.store()
                    .commit(Command::new(model, Mutation::ResetQueue))?;
            }
        }

        Ok(ReplayReport { outcomes })
    }

    async fn replay(&self, model: ModelKey, kind: QueueKind, entity: Entity) -> ReplayOutcome {
        let id = entity.id();
        let result = self.replay_entry(&model, kind, &entity).await;
        if result.is_ok() {
            if let Err(e) = self.cancel_action(model.as_str(), kind, entity) {
                tracing::warn!("Could not dequeue replayed action on {}: {}", model, e);
            }
        }
        ReplayOutcome {
            model,
            kind,
            id,
            result,
        }
    }

    async fn replay_entry(
        &self,
        model: &ModelKey,
        kind: QueueKind,
        entity: &Entity,
    ) -> Result<(), ClientError> {
        let data = entity.to_json();
        match kind {
            QueueKind::Post => {
                let placeholder = entity.id();
                let stored = self.post(Request::new(model.clone()).data(data)).await?;
                // the server record replaces a local placeholder with another id
                if let Some(id) = placeholder {
                    if !stored.iter().any(|e| e.id().as_ref() == Some(&id)) {
                        self.store().commit(Command::new(
                            model.clone(),
                            Mutation::Delete(OneOrMany::One(id)),
                        ))?;
                    }
                }
                Ok(())
            }
            QueueKind::Patch | QueueKind::Delete => {
                let id = entity.id().ok_or_else(|| {
                    ClientError::InvalidRequest(format!("queued {} on {} has no id", kind, model))
                })?;
                let request = Request::new(model.clone()).id(id).data(data);
                if kind == QueueKind::Patch {
                    self.patch(request).await?;
                } else {
                    self.delete(request).await?;
                }
                Ok(())
            }
        }
    }

    /// Discard the queues of `models`, restoring their origin snapshots.
    pub fn cancel_action_queue(&self, models: &[&str]) -> Result<(), ClientError> {
        for &model in models {
            let definition = self.store().registry().model(model)?;
            if !self.store().has_action(model) {
                continue;
            }

            let queue = self.store().queue(model)?;
            let placeholders: Vec<EntityId> = self.store().read(model, |table| {
                queue
                    .post()
                    .iter()
                    .filter_map(Entity::id)
                    .filter(|id| table.item(id).is_some() && table.origin(id).is_none())
                    .collect()
            })?;
            let baseline = queue
                .baseline_ids()
                .into_iter()
                .filter_map(|id| self.store().origin(model, &id))
                .collect::<Vec<_>>();
            let restored = definition.after_queue(baseline);

            tracing::debug!(
                "Rolling back {} on {} ({} restored, {} placeholders dropped)",
                queue.len(),
                model,
                restored.len(),
                placeholders.len()
            );

            if !placeholders.is_empty() {
                self.store().commit(Command::new(
                    model,
                    Mutation::Delete(OneOrMany::Many(placeholders)),
                ))?;
            }
            if !restored.is_empty() {
                self.store().commit(Command::new(
                    model,
                    Mutation::Add {
                        data: OneOrMany::Many(restored),
                        baseline: Baseline::Rollback,
                    },
                ))?;
            }
            self.store()
                .commit(Command::new(model, Mutation::ResetQueue))?;
        }
        Ok(())
    }
}
