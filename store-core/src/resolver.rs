//! Reference resolver.
//!
//! Rewrites nested resource graphs into flat per-model tables, depth first
//! and children before parents:
//!
//! ```text
//! {id: 1, user: {id: 10, role: {id: 100}}}       (model "resource")
//!     role 100  → roles table
//!     user 10   → users table, user.role = Ref(role 100)
//!     resource 1 → resources table, resource.user = Ref(user 10)
//! ```
//!
//! Every reference field ends up holding the canonical [`Entity`] returned
//! by the referenced table, never a copy.

use apistore_types::{ModelKey, OneOrMany};
use serde_json::Value;

use crate::store::Tables;
use crate::{Baseline, Entity, Field, Record, Registry, StoreError};

/// A reference map entry that points at a model missing from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceWarning {
    /// Model whose reference map declares the field.
    pub model: ModelKey,
    /// The reference field.
    pub field: String,
    /// The referenced, unregistered model.
    pub missing: ModelKey,
}

impl std::fmt::Display for ReferenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "could not find the model {} for the reference {} of {}",
            self.missing, self.field, self.model
        )
    }
}

/// Normalizes records into the tables of one store.
pub(crate) struct Resolver<'a> {
    registry: &'a Registry,
    tables: &'a mut Tables,
    baseline: Baseline,
    warnings: Vec<ReferenceWarning>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(registry: &'a Registry, tables: &'a mut Tables, baseline: Baseline) -> Self {
        Self {
            registry,
            tables,
            baseline,
            warnings: Vec::new(),
        }
    }

    /// Normalize a record or batch into `model`'s table.
    pub(crate) fn normalize(
        &mut self,
        model: &ModelKey,
        data: OneOrMany<Record>,
    ) -> Result<OneOrMany<Entity>, StoreError> {
        // the top-level model must exist; nested misses only warn
        self.registry.model(model.as_str())?;

        match data {
            OneOrMany::One(record) => self.normalize_record(model, record).map(OneOrMany::One),
            OneOrMany::Many(records) => records
                .into_iter()
                .map(|record| self.normalize_record(model, record))
                .collect::<Result<Vec<_>, _>>()
                .map(OneOrMany::Many),
        }
    }

    pub(crate) fn into_warnings(self) -> Vec<ReferenceWarning> {
        self.warnings
    }

    fn normalize_record(&mut self, model: &ModelKey, record: Record) -> Result<Entity, StoreError> {
        let definition = self.registry.model(model.as_str())?;
        let references = definition.references().clone();
        let mut record = match self.baseline {
            Baseline::Rollback => record,
            Baseline::Confirmed | Baseline::Local => definition.after_get(record),
        };

        for (field, target) in &references {
            if !record.contains(field) {
                continue;
            }
            if !self.registry.contains(target.as_str()) {
                tracing::warn!(
                    "Reference error: could not find the model {} for the reference {} of {}",
                    target,
                    field,
                    model
                );
                self.warnings.push(ReferenceWarning {
                    model: model.clone(),
                    field: field.clone(),
                    missing: target.clone(),
                });
                continue;
            }
            if let Some(raw) = record.remove(field) {
                let resolved = self.resolve_field(target, raw)?;
                record.set_field(field.clone(), resolved);
            }
        }

        self.store(model, record)
    }

    fn resolve_field(&mut self, target: &ModelKey, field: Field) -> Result<Field, StoreError> {
        match field {
            Field::Value(Value::Object(map)) => {
                let entity = self.normalize_record(target, Record::from_map(map))?;
                Ok(Field::Ref(entity))
            }
            Field::Value(Value::Array(items))
                if !items.is_empty() && items.iter().all(Value::is_object) =>
            {
                let mut entities = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Object(map) = item {
                        entities.push(self.normalize_record(target, Record::from_map(map))?);
                    }
                }
                Ok(Field::RefList(entities))
            }
            // ids, null and already-resolved handles stay as they are
            other => Ok(other),
        }
    }

    fn store(&mut self, model: &ModelKey, record: Record) -> Result<Entity, StoreError> {
        let table = self
            .tables
            .get_mut(model.as_str())
            .ok_or_else(|| StoreError::UnknownModel(model.clone()))?;

        if record.id().is_none() {
            tracing::debug!("Record without id for {} passed through unstored", model);
            return Ok(Entity::new(record));
        }

        table
            .add(record, self.baseline)
            .ok_or_else(|| StoreError::MissingId {
                model: model.clone(),
                kind: "add".to_string(),
            })
    }
}
