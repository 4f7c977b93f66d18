//! Payload shapes shared by the store and the client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A payload that is either a single item or an ordered batch.
///
/// Most operations accept both shapes and answer in the same shape they
/// were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneOrMany<T> {
    /// A single item.
    One(T),
    /// An ordered batch.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Whether this is a batch.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    /// Whether there are no items (only possible for an empty batch).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Self::One(item) => std::slice::from_ref(item).iter(),
            Self::Many(items) => items.iter(),
        }
    }

    /// Apply `f` to every item, keeping the shape.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> OneOrMany<U> {
        match self {
            Self::One(item) => OneOrMany::One(f(item)),
            Self::Many(items) => OneOrMany::Many(items.into_iter().map(f).collect()),
        }
    }

    /// The single item, if this is not a batch.
    pub fn one(&self) -> Option<&T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(_) => None,
        }
    }

    /// Flatten into a vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(value: Vec<T>) -> Self {
        Self::Many(value)
    }
}

impl<T> IntoIterator for OneOrMany<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// The partition of a model's action queue an edit is staged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Pending create; entries have no baseline and no guaranteed id.
    Post,
    /// Pending update, keyed by id.
    Patch,
    /// Pending delete, keyed by id.
    Delete,
}

impl QueueKind {
    /// Lowercase name (`"post"`, `"patch"`, `"delete"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            other => Err(TypesError::InvalidQueueKind(other.to_string())),
        }
    }
}
