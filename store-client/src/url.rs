//! URL construction from a model and an optional id.

use apistore_types::{EntityId, ModelKey};

/// Builds resource URLs under a base URL.
///
/// ```text
/// collection   {base}/{model}
/// item         {base}/{model}/{id}
/// batch delete {base}/{model}/delete
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlBuilder {
    base_url: String,
}

impl UrlBuilder {
    /// Create a builder. A trailing `/` on the base is ignored.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Collection URL of a model.
    pub fn collection(&self, model: &ModelKey) -> String {
        format!("{}/{}", self.base_url, model)
    }

    /// URL of one resource.
    pub fn item(&self, model: &ModelKey, id: &EntityId) -> String {
        format!("{}/{}/{}", self.base_url, model, id)
    }

    /// Item URL when an id is given, collection URL otherwise.
    pub fn resource(&self, model: &ModelKey, id: Option<&EntityId>) -> String {
        match id {
            Some(id) => self.item(model, id),
            None => self.collection(model),
        }
    }

    /// Batch delete endpoint of a model.
    pub fn batch_delete(&self, model: &ModelKey) -> String {
        format!("{}/delete", self.collection(model))
    }
}
