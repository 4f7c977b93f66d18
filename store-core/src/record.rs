//! Entity records and shared entity handles.
//!
//! A [`Record`] is a JSON object whose reference fields may hold live
//! [`Entity`] handles instead of nested objects. An [`Entity`] is the single
//! canonical slot for one stored record: every table entry and every
//! reference field pointing at that record holds a clone of the same handle,
//! so an in-place edit through any path is visible through all of them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use apistore_types::{EntityId, OneOrMany};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::StoreError;

/// The value of one record field.
#[derive(Clone)]
pub enum Field {
    /// Plain JSON (scalars, raw nested objects, already-resolved ids).
    Value(Value),
    /// A resolved reference to a single stored entity.
    Ref(Entity),
    /// A resolved reference to an ordered list of stored entities.
    RefList(Vec<Entity>),
}

impl Field {
    /// The plain JSON value, if this field is not a reference.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The referenced entity, if this field holds a single reference.
    pub fn as_ref_entity(&self) -> Option<&Entity> {
        match self {
            Self::Ref(e) => Some(e),
            _ => None,
        }
    }

    /// The referenced entities, if this field holds a reference list.
    pub fn as_ref_list(&self) -> Option<&[Entity]> {
        match self {
            Self::RefList(list) => Some(list),
            _ => None,
        }
    }

    fn to_json_guarded(&self, visiting: &mut Vec<usize>) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Ref(e) => e.to_json_guarded(visiting),
            Self::RefList(list) => {
                Value::Array(list.iter().map(|e| e.to_json_guarded(visiting)).collect())
            }
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Entity> for Field {
    fn from(entity: Entity) -> Self {
        Self::Ref(entity)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Ref(e) => write!(f, "{:?}", e),
            Self::RefList(list) => f.debug_list().entries(list).finish(),
        }
    }
}

/// A JSON-shaped entity record.
///
/// Equality is structural: two records are equal when they serialize to the
/// same JSON, references included.
#[derive(Clone, Default)]
pub struct Record {
    fields: BTreeMap<String, Field>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(StoreError::InvalidPayload(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Build one record or a batch from a JSON object or array of objects.
    pub fn many_from_json(value: Value) -> Result<OneOrMany<Self>, StoreError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(OneOrMany::Many),
            other => Self::from_json(other).map(OneOrMany::One),
        }
    }

    /// Build a record from a JSON map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Field::Value(v))).collect(),
        }
    }

    /// The record id, if present and valid.
    pub fn id(&self) -> Option<EntityId> {
        self.value("id").and_then(|v| EntityId::from_json(v).ok())
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Look up a plain JSON field (reference fields return `None`).
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(Field::as_value)
    }

    /// Whether the record has a field with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Set a plain JSON field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), Field::Value(value.into()));
    }

    /// Set a field of any kind.
    pub fn set_field(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    /// Remove a field, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Iterate over fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overwrite matching fields with those of `other`, keeping the rest.
    pub fn merge(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }

    /// Replace every field with those of `other`.
    pub fn replace(&mut self, other: Record) {
        self.fields = other.fields;
    }

    /// Serialize to nested JSON, expanding references.
    ///
    /// An entity already being serialized higher up the graph is emitted as
    /// `{"id": ..}` so cyclic graphs terminate.
    pub fn to_json(&self) -> Value {
        self.to_json_guarded(&mut Vec::new())
    }

    fn to_json_guarded(&self, visiting: &mut Vec<usize>) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json_guarded(visiting)))
                .collect(),
        )
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

/// A shared handle to the canonical slot of one record.
///
/// Cloning the handle never copies the record.
#[derive(Clone)]
pub struct Entity(Arc<RwLock<Record>>);

impl Entity {
    /// Wrap a record in a new slot.
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    /// Wrap a JSON object in a new, detached slot.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        Record::from_json(value).map(Self::new)
    }

    /// Whether two handles point at the same slot.
    pub fn ptr_eq(a: &Entity, b: &Entity) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Lock the record for reading.
    ///
    /// Read locks are recursive: nested readers on the same slot never wait
    /// on each other.
    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read_recursive()
    }

    /// Lock the record for an in-place edit.
    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write()
    }

    /// The record id, if present.
    pub fn id(&self) -> Option<EntityId> {
        self.read().id()
    }

    /// A shallow copy of the current record (references stay shared).
    pub fn snapshot(&self) -> Record {
        self.read().clone()
    }

    /// Serialize to nested JSON, expanding references.
    pub fn to_json(&self) -> Value {
        self.to_json_guarded(&mut Vec::new())
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    fn to_json_guarded(&self, visiting: &mut Vec<usize>) -> Value {
        let addr = self.addr();
        if visiting.contains(&addr) {
            let mut stub = Map::new();
            if let Some(id) = self.id() {
                stub.insert("id".to_string(), id.to_json());
            }
            return Value::Object(stub);
        }
        visiting.push(addr);
        let json = self.read().to_json_guarded(visiting);
        visiting.pop();
        json
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "Entity({})", id),
            None => write!(f, "Entity(<no id>)"),
        }
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_json(value).unwrap()
    }

    // ===========================================
    // Record Tests
    // ===========================================

    #[test]
    fn record_reads_id() {
        assert_eq!(record(json!({"id": 3})).id(), Some(EntityId::Int(3)));
        assert_eq!(record(json!({"id": "x"})).id(), Some(EntityId::from("x")));
        assert_eq!(record(json!({"name": "n"})).id(), None);
        assert_eq!(record(json!({"id": null})).id(), None);
    }

    #[test]
    fn record_rejects_non_objects() {
        assert!(matches!(
            Record::from_json(json!(5)),
            Err(StoreError::InvalidPayload(_))
        ));
        assert!(Record::many_from_json(json!([{"id": 1}, 2])).is_err());
    }

    #[test]
    fn many_from_json_keeps_shape() {
        assert!(!Record::many_from_json(json!({"id": 1})).unwrap().is_many());
        let many = Record::many_from_json(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(many.len(), 2);
    }

    #[test]
    fn merge_overwrites_and_keeps_unseen_fields() {
        let mut base = record(json!({"id": 1, "name": "a", "age": 3}));
        base.merge(record(json!({"id": 1, "name": "b"})));
        assert_eq!(base.to_json(), json!({"id": 1, "name": "b", "age": 3}));
    }

    #[test]
    fn replace_drops_unseen_fields() {
        let mut base = record(json!({"id": 1, "name": "a", "age": 3}));
        base.replace(record(json!({"id": 1, "name": "b"})));
        assert_eq!(base.to_json(), json!({"id": 1, "name": "b"}));
    }

    #[test]
    fn records_compare_structurally() {
        let a = record(json!({"id": 1, "tags": [1, 2]}));
        let b = record(json!({"tags": [1, 2], "id": 1}));
        let c = record(json!({"id": 1, "tags": [2, 1]}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    // ===========================================
    // Entity Tests
    // ===========================================

    #[test]
    fn entity_clones_share_the_slot() {
        let a = Entity::from_json(json!({"id": 1, "name": "a"})).unwrap();
        let b = a.clone();
        b.write().set("name", "b");
        assert_eq!(a.read().value("name"), Some(&json!("b")));
        assert!(Entity::ptr_eq(&a, &b));
    }

    #[test]
    fn snapshot_is_detached_from_scalar_edits() {
        let a = Entity::from_json(json!({"id": 1, "name": "a"})).unwrap();
        let snap = a.snapshot();
        a.write().set("name", "b");
        assert_eq!(snap.value("name"), Some(&json!("a")));
    }

    #[test]
    fn to_json_expands_references() {
        let role = Entity::from_json(json!({"id": 100, "label": "admin"})).unwrap();
        let mut user = record(json!({"id": 10}));
        user.set_field("role", Field::Ref(role.clone()));
        user.set_field("roles", Field::RefList(vec![role]));
        assert_eq!(
            user.to_json(),
            json!({
                "id": 10,
                "role": {"id": 100, "label": "admin"},
                "roles": [{"id": 100, "label": "admin"}]
            })
        );
    }

    #[test]
    fn to_json_terminates_on_cycles() {
        let a = Entity::from_json(json!({"id": 1})).unwrap();
        let b = Entity::from_json(json!({"id": 2})).unwrap();
        a.write().set_field("next", Field::Ref(b.clone()));
        b.write().set_field("next", Field::Ref(a.clone()));

        assert_eq!(
            a.to_json(),
            json!({"id": 1, "next": {"id": 2, "next": {"id": 1}}})
        );
    }

    #[test]
    fn entity_debug_shows_id() {
        let a = Entity::from_json(json!({"id": 9})).unwrap();
        assert_eq!(format!("{:?}", a), "Entity(9)");
    }

    #[test]
    fn entity_serializes_as_nested_json() {
        let role = Entity::from_json(json!({"id": 100})).unwrap();
        let user = Entity::from_json(json!({"id": 10})).unwrap();
        user.write().set_field("role", Field::Ref(role));

        let text = serde_json::to_string(&user).unwrap();
        assert_eq!(text, r#"{"id":10,"role":{"id":100}}"#);
    }
}
