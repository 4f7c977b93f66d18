//! Model registry.
//!
//! The registry is an explicit value handed to every component: model
//! definitions (names, reference maps, hooks) are supplied fully formed and
//! never change while the store is running.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use apistore_types::ModelKey;
use async_trait::async_trait;
use serde_json::Value;

use crate::{Record, StoreError};

/// Per-model lifecycle hooks.
///
/// Every method defaults to the identity, so implementors only override the
/// hooks they need.
#[async_trait]
pub trait ModelHooks: Send + Sync {
    /// Transform an outgoing request body before it is sent.
    ///
    /// Receives the whole body: a single object or a batch array.
    async fn before_save(&self, data: Value) -> Value {
        data
    }

    /// Transform a record before it is committed into its table.
    fn after_get(&self, record: Record) -> Record {
        record
    }

    /// Transform origin records before they are restored by a rollback.
    fn after_queue(&self, records: Vec<Record>) -> Vec<Record> {
        records
    }
}

/// Definition of one model.
#[derive(Clone)]
pub struct ModelDefinition {
    key: ModelKey,
    name: String,
    plural: String,
    references: BTreeMap<String, ModelKey>,
    hooks: Option<Arc<dyn ModelHooks>>,
}

impl ModelDefinition {
    /// Create a definition with no references and no hooks.
    ///
    /// `name` is the display name (`"RESOURCE"`), `plural` the pluralized
    /// key (`"RESOURCES"`).
    pub fn new(key: impl Into<ModelKey>, name: &str, plural: &str) -> Self {
        Self {
            key: key.into(),
            name: name.to_string(),
            plural: plural.to_string(),
            references: BTreeMap::new(),
            hooks: None,
        }
    }

    /// Declare that `field` holds records of model `model`.
    pub fn reference(mut self, field: &str, model: impl Into<ModelKey>) -> Self {
        self.references.insert(field.to_string(), model.into());
        self
    }

    /// Attach lifecycle hooks.
    pub fn hooks(mut self, hooks: impl ModelHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// The registry key.
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pluralized key.
    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Reference map: field name to referenced model key.
    pub fn references(&self) -> &BTreeMap<String, ModelKey> {
        &self.references
    }

    /// Run the `before_save` hook (identity when absent).
    pub async fn before_save(&self, data: Value) -> Value {
        match &self.hooks {
            Some(hooks) => hooks.before_save(data).await,
            None => data,
        }
    }

    /// Run the `after_get` hook (identity when absent).
    pub fn after_get(&self, record: Record) -> Record {
        match &self.hooks {
            Some(hooks) => hooks.after_get(record),
            None => record,
        }
    }

    /// Run the `after_queue` hook (identity when absent).
    pub fn after_queue(&self, records: Vec<Record>) -> Vec<Record> {
        match &self.hooks {
            Some(hooks) => hooks.after_queue(records),
            None => records,
        }
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("plural", &self.plural)
            .field("references", &self.references)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

/// The set of known models.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: BTreeMap<ModelKey, ModelDefinition>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition (builder form).
    pub fn with(mut self, definition: ModelDefinition) -> Self {
        self.register(definition);
        self
    }

    /// Add or replace a definition.
    pub fn register(&mut self, definition: ModelDefinition) {
        self.models.insert(definition.key.clone(), definition);
    }

    /// Look up a definition.
    pub fn get(&self, key: &str) -> Option<&ModelDefinition> {
        self.models.get(key)
    }

    /// Look up a definition, failing on unknown keys.
    pub fn model(&self, key: &str) -> Result<&ModelDefinition, StoreError> {
        self.get(key)
            .ok_or_else(|| StoreError::UnknownModel(ModelKey::from(key)))
    }

    /// Whether a model is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    /// Registered keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &ModelKey> {
        self.models.keys()
    }

    /// Registered definitions, in key order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Stamp;

    #[async_trait]
    impl ModelHooks for Stamp {
        async fn before_save(&self, mut data: Value) -> Value {
            data["saved"] = json!(true);
            data
        }

        fn after_get(&self, mut record: Record) -> Record {
            record.set("stamped", true);
            record
        }
    }

    #[test]
    fn definition_builder() {
        let def = ModelDefinition::new("resource", "RESOURCE", "RESOURCES")
            .reference("user", "user")
            .reference("vehicle", "vehicle");

        assert_eq!(def.key().as_str(), "resource");
        assert_eq!(def.name(), "RESOURCE");
        assert_eq!(def.plural(), "RESOURCES");
        assert_eq!(def.references().len(), 2);
        assert_eq!(def.references().get("user"), Some(&ModelKey::from("user")));
    }

    #[test]
    fn missing_hooks_are_identity() {
        let def = ModelDefinition::new("role", "ROLE", "ROLES");
        let record = Record::from_json(json!({"id": 1})).unwrap();
        assert_eq!(def.after_get(record.clone()), record);
        assert_eq!(def.after_queue(vec![record.clone()]), vec![record]);
    }

    #[tokio::test]
    async fn hooks_run_when_present() {
        let def = ModelDefinition::new("role", "ROLE", "ROLES").hooks(Stamp);

        let saved = def.before_save(json!({"id": 1})).await;
        assert_eq!(saved, json!({"id": 1, "saved": true}));

        let got = def.after_get(Record::from_json(json!({"id": 1})).unwrap());
        assert_eq!(got.value("stamped"), Some(&json!(true)));

        // after_queue was not overridden
        let restored = def.after_queue(vec![Record::from_json(json!({"id": 2})).unwrap()]);
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn registry_lookup() {
        let registry = Registry::new()
            .with(ModelDefinition::new("user", "USER", "USERS"))
            .with(ModelDefinition::new("role", "ROLE", "ROLES"));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("user"));
        assert!(registry.get("fakeref").is_none());
        assert!(matches!(
            registry.model("fakeref"),
            Err(StoreError::UnknownModel(key)) if key.as_str() == "fakeref"
        ));
        let keys: Vec<_> = registry.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["role", "user"]);
    }
}
