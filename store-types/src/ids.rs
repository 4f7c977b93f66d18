//! Identity types for apistore.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

use crate::TypesError;

/// The unique identifier of an entity within its model table.
///
/// Servers hand out either numeric or string ids; both are kept as-is so
/// that a record serializes back with the same `id` it arrived with.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Integer id (`{"id": 42}`).
    Int(i64),
    /// String id (`{"id": "a1b2"}`).
    Str(String),
}

impl EntityId {
    /// Read an id from a JSON value.
    ///
    /// Only integers and strings are ids; anything else (floats, null,
    /// objects) is rejected.
    pub fn from_json(value: &Value) -> Result<Self, TypesError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| TypesError::InvalidId(value.to_string())),
            Value::String(s) => Ok(Self::Str(s.clone())),
            other => Err(TypesError::InvalidId(other.to_string())),
        }
    }

    /// Extract the `id` field of a JSON object, if it holds a valid id.
    pub fn of_object(value: &Value) -> Option<Self> {
        value.get("id").and_then(|id| Self::from_json(id).ok())
    }

    /// Convert back into a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "EntityId({})", n),
            Self::Str(s) => write!(f, "EntityId({:?})", s),
        }
    }
}

/// The registry key of a model (`"resource"`, `"user"`).
///
/// Also used as the path segment of the model's resource URL.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelKey(String);

impl ModelKey {
    /// Create a model key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ModelKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ModelKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelKey({})", self.0)
    }
}
