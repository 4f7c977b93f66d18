//! ApiStore - the main interface for apistore.
//!
//! This module provides [`ApiStore`], the dispatcher that keeps the
//! normalized entity cache in sync with a REST API.
//!
//! # Architecture
//!
//! ApiStore owns an [`EntityStore`] (from store-core) and turns every
//! transport response into a committed [`Command`]:
//!
//! ```text
//! Application → ApiStore → Transport → API
//!                  ↓
//!             store-core (normalize + commit)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use apistore_client::{ApiStore, MockTransport, Request, StoreConfig};
//!
//! let store = ApiStore::new(registry, StoreConfig::default(), MockTransport::new());
//!
//! let resources = store.get(Request::new("resource")).await?;
//! let user = store.get(Request::new("user").id(10)).await?;
//! ```

use apistore_core::{
    Command, Entity, EntityId, EntityStore, ModelKey, Mutation, OneOrMany, Record, Registry,
    StoreError,
};
use serde_json::Value;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::transport::{Transport, TransportError};
use crate::url::UrlBuilder;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The configured data path is absent from a response.
    #[error("response has no data at {path}")]
    MissingData {
        /// The configured data path.
        path: String,
    },

    /// The request is missing something the operation needs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Parameters of one dispatcher operation.
#[derive(Debug, Clone)]
pub struct Request {
    /// Target model.
    pub model: ModelKey,
    /// Single-resource id.
    pub id: Option<EntityId>,
    /// Request body (a single object or a batch array).
    pub data: Option<Value>,
    /// Clear the table before a fetch. Defaults to "collection fetch".
    pub clear: Option<bool>,
    /// Skip the cache on a single-resource fetch.
    pub force_fetch: bool,
}

impl Request {
    /// A request for a model with no id and no body.
    pub fn new(model: impl Into<ModelKey>) -> Self {
        Self {
            model: model.into(),
            id: None,
            data: None,
            clear: None,
            force_fetch: false,
        }
    }

    /// Address one resource.
    pub fn id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a body.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Force or suppress the pre-fetch clear.
    pub fn clear(mut self, clear: bool) -> Self {
        self.clear = Some(clear);
        self
    }

    /// Bypass the cache.
    pub fn force_fetch(mut self, force_fetch: bool) -> Self {
        self.force_fetch = force_fetch;
        self
    }

    /// Whether this addresses a whole collection with a batch body.
    pub fn is_batch(&self) -> bool {
        self.id.is_none() && matches!(self.data, Some(Value::Array(_)))
    }
}

/// The dispatcher: REST operations committed into a normalized cache.
pub struct ApiStore<T: Transport> {
    store: EntityStore,
    transport: T,
    config: StoreConfig,
    urls: UrlBuilder,
}

impl<T: Transport> ApiStore<T> {
    /// Create a dispatcher with an empty table per registered model.
    pub fn new(registry: Registry, config: StoreConfig, transport: T) -> Self {
        let urls = config.urls();
        Self {
            store: EntityStore::new(registry),
            transport,
            config,
            urls,
        }
    }

    /// The entity store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The URL builder.
    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    /// Fetch a resource or collection.
    ///
    /// A single-resource fetch is served from the cache unless
    /// `force_fetch` is set. A collection fetch with a batch body clears
    /// the table first unless `clear` says otherwise.
    pub async fn get(&self, request: Request) -> Result<OneOrMany<Entity>, ClientError> {
        self.store.registry().model(request.model.as_str())?;

        if let Some(id) = &request.id {
            if !request.force_fetch {
                if let Some(cached) = self.store.item(request.model.as_str(), id) {
                    tracing::debug!("Cache hit for {} {}", request.model, id);
                    return Ok(OneOrMany::One(cached));
                }
            }
        }

        if request.clear.unwrap_or_else(|| request.is_batch()) {
            self.store
                .commit(Command::new(request.model.clone(), Mutation::Clear))?;
        }

        let url = self.urls.resource(&request.model, request.id.as_ref());
        tracing::debug!("GET {}", url);
        let body = self.transport.get(&url).await?;
        self.commit_response(&request.model, body)
    }

    /// Create a resource (or batch) and commit the server's answer.
    pub async fn post(&self, request: Request) -> Result<OneOrMany<Entity>, ClientError> {
        let body = self.prepare_body(&request).await?;
        let url = self.urls.collection(&request.model);
        tracing::debug!("POST {}", url);
        let response = self.transport.post(&url, body).await?;
        self.commit_response(&request.model, response)
    }

    /// Update a resource, or a batch at the collection URL.
    pub async fn patch(&self, request: Request) -> Result<OneOrMany<Entity>, ClientError> {
        let body = self.prepare_body(&request).await?;
        let url = self.urls.resource(&request.model, request.id.as_ref());
        tracing::debug!("PATCH {}", url);
        let response = self.transport.patch(&url, body).await?;
        self.commit_response(&request.model, response)
    }

    /// Delete a resource, or a batch through the batch delete endpoint.
    ///
    /// The cache is only updated once the server confirmed the delete.
    pub async fn delete(&self, request: Request) -> Result<(), ClientError> {
        let definition = self.store.registry().model(request.model.as_str())?;

        if request.is_batch() {
            let data = request.data.clone().unwrap_or(Value::Null);
            let body = definition.before_save(data.clone()).await;
            let url = self.urls.batch_delete(&request.model);
            tracing::debug!("PATCH {}", url);
            self.transport.patch(&url, body).await?;
            self.store
                .commit(Command::new(request.model, Mutation::delete_json(&data)))?;
            return Ok(());
        }

        let id = request
            .id
            .clone()
            .or_else(|| request.data.as_ref().and_then(EntityId::of_object))
            .ok_or_else(|| {
                ClientError::InvalidRequest(format!("delete on {} needs an id", request.model))
            })?;
        let url = self.urls.item(&request.model, &id);
        tracing::debug!("DELETE {}", url);
        self.transport.delete(&url).await?;
        self.store.commit(Command::new(
            request.model,
            Mutation::Delete(OneOrMany::One(id)),
        ))?;
        Ok(())
    }

    async fn prepare_body(&self, request: &Request) -> Result<Value, ClientError> {
        let definition = self.store.registry().model(request.model.as_str())?;
        let data = request.data.clone().ok_or_else(|| {
            ClientError::InvalidRequest(format!("write to {} needs a body", request.model))
        })?;
        Ok(definition.before_save(data).await)
    }

    /// Unwrap a response body and commit it as a confirmed baseline.
    ///
    /// An empty answer (`null`, e.g. `204 No Content`) commits nothing.
    fn commit_response(
        &self,
        model: &ModelKey,
        body: Value,
    ) -> Result<OneOrMany<Entity>, ClientError> {
        if body.is_null() {
            tracing::debug!("Empty response for {}, nothing to commit", model);
            return Ok(OneOrMany::Many(Vec::new()));
        }
        let data = self
            .config
            .extract(&body)
            .cloned()
            .ok_or_else(|| ClientError::MissingData {
                path: self.config.data_path.clone().unwrap_or_default(),
            })?;
        if data.is_null() {
            return Ok(OneOrMany::Many(Vec::new()));
        }

        let records = Record::many_from_json(data)?;
        let commit = self
            .store
            .commit(Command::new(model.clone(), Mutation::confirmed(records)))?;
        Ok(commit.stored.unwrap_or(OneOrMany::Many(Vec::new())))
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for ApiStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiStore")
            .field("store", &self.store)
            .field("transport", &self.transport)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockTransport};
    use apistore_core::{ModelDefinition, ModelHooks};
    use async_trait::async_trait;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new()
            .with(
                ModelDefinition::new("resource", "RESOURCE", "RESOURCES")
                    .reference("user", "user")
                    .reference("vehicle", "vehicle"),
            )
            .with(ModelDefinition::new("user", "USER", "USERS").reference("role", "role"))
            .with(ModelDefinition::new("vehicle", "VEHICLE", "VEHICLES"))
            .with(ModelDefinition::new("role", "ROLE", "ROLES"))
    }

    fn api() -> (ApiStore<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let api = ApiStore::new(registry(), StoreConfig::default(), transport.clone());
        (api, transport)
    }

    // ===========================================
    // Get Tests
    // ===========================================

    #[tokio::test]
    async fn get_collection_normalizes_graph() {
        let (api, transport) = api();
        transport.respond(
            Method::Get,
            "/resource",
            json!([{"id": 1, "user": {"id": 10, "role": {"id": 100}}}]),
        );

        let stored = api.get(Request::new("resource")).await.unwrap();

        assert_eq!(stored.len(), 1);
        let resource = api.store().item("resource", &EntityId::Int(1)).unwrap();
        let user = api.store().item("user", &EntityId::Int(10)).unwrap();
        assert!(api.store().item("role", &EntityId::Int(100)).is_some());
        let linked = resource.read().get("user").unwrap().as_ref_entity().unwrap().clone();
        assert!(Entity::ptr_eq(&linked, &user));
    }

    #[tokio::test]
    async fn cached_get_skips_transport() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user/10", json!({"id": 10, "name": "ann"}));

        api.get(Request::new("user").id(10).force_fetch(true)).await.unwrap();
        assert_eq!(transport.calls(Method::Get, "/user/10"), 1);

        let cached = api.get(Request::new("user").id(10)).await.unwrap();
        assert_eq!(transport.calls(Method::Get, "/user/10"), 1);
        assert_eq!(cached.one().unwrap().read().value("name"), Some(&json!("ann")));

        api.get(Request::new("user").id(10).force_fetch(true)).await.unwrap();
        assert_eq!(transport.calls(Method::Get, "/user/10"), 2);
    }

    #[tokio::test]
    async fn get_misses_fetch_single() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user/3", json!({"id": 3}));

        api.get(Request::new("user").id(3)).await.unwrap();

        assert_eq!(transport.calls(Method::Get, "/user/3"), 1);
        assert!(api.store().origin("user", &EntityId::Int(3)).is_some());
    }

    #[tokio::test]
    async fn batch_get_clears_first() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user", json!([{"id": 1}]));
        api.get(Request::new("user")).await.unwrap();

        transport.respond(Method::Get, "/user", json!([{"id": 2}]));
        api.get(Request::new("user").data(json!([]))).await.unwrap();

        assert!(api.store().item("user", &EntityId::Int(1)).is_none());
        assert!(api.store().item("user", &EntityId::Int(2)).is_some());
    }

    #[tokio::test]
    async fn explicit_clear_overrides_default() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user", json!([{"id": 1}]));
        api.get(Request::new("user")).await.unwrap();

        transport.respond(Method::Get, "/user", json!([{"id": 2}]));
        api.get(Request::new("user").data(json!([])).clear(false))
            .await
            .unwrap();

        assert!(api.store().item("user", &EntityId::Int(1)).is_some());
        assert!(api.store().item("user", &EntityId::Int(2)).is_some());
    }

    #[tokio::test]
    async fn data_path_unwraps_envelope() {
        let transport = MockTransport::new();
        let api = ApiStore::new(
            registry(),
            StoreConfig::new().with_data_path("data"),
            transport.clone(),
        );
        transport.respond(Method::Get, "/user", json!({"data": [{"id": 1}], "total": 1}));

        api.get(Request::new("user")).await.unwrap();
        assert!(api.store().item("user", &EntityId::Int(1)).is_some());

        transport.respond(Method::Get, "/role", json!({"items": []}));
        let result = api.get(Request::new("role")).await;
        assert!(matches!(result, Err(ClientError::MissingData { path }) if path == "data"));
    }

    // ===========================================
    // Write Tests
    // ===========================================

    #[tokio::test]
    async fn post_commits_server_answer() {
        let (api, transport) = api();
        transport.respond(Method::Post, "/user", json!({"id": 5, "name": "new"}));

        let stored = api
            .post(Request::new("user").data(json!({"name": "new"})))
            .await
            .unwrap();

        assert_eq!(stored.one().unwrap().id(), Some(EntityId::Int(5)));
        assert_eq!(
            api.store().origin("user", &EntityId::Int(5)).unwrap().value("name"),
            Some(&json!("new"))
        );
    }

    #[tokio::test]
    async fn patch_uses_item_or_collection_url() {
        let (api, transport) = api();

        api.patch(Request::new("user").id(7).data(json!({"id": 7, "name": "x"})))
            .await
            .unwrap();
        api.patch(Request::new("user").data(json!([{"id": 8}, {"id": 9}])))
            .await
            .unwrap();

        let urls: Vec<_> = transport.history().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["/user/7", "/user"]);
        assert!(api.store().item("user", &EntityId::Int(9)).is_some());
    }

    #[tokio::test]
    async fn empty_answer_commits_nothing() {
        let transport = MockTransport::new();
        let api = ApiStore::new(
            registry(),
            StoreConfig::new().with_data_path("data"),
            transport.clone(),
        );
        transport.respond(Method::Patch, "/user/7", Value::Null);
        transport.respond(Method::Post, "/user", json!({"data": null}));

        let patched = api
            .patch(Request::new("user").id(7).data(json!({"id": 7})))
            .await
            .unwrap();
        let posted = api
            .post(Request::new("user").data(json!({"name": "x"})))
            .await
            .unwrap();

        assert!(patched.is_empty());
        assert!(posted.is_empty());
        assert!(api.store().read("user", |t| t.is_empty()).unwrap());
    }

    #[tokio::test]
    async fn write_without_body_is_rejected() {
        let (api, transport) = api();

        let result = api.post(Request::new("user")).await;

        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
        assert!(transport.history().is_empty());
    }

    struct Envelope;

    #[async_trait]
    impl ModelHooks for Envelope {
        async fn before_save(&self, data: Value) -> Value {
            json!({"payload": data})
        }
    }

    #[tokio::test]
    async fn before_save_shapes_request_body() {
        let transport = MockTransport::new();
        let registry = Registry::new().with(ModelDefinition::new("user", "USER", "USERS").hooks(Envelope));
        let api = ApiStore::new(registry, StoreConfig::default(), transport.clone());
        transport.respond(Method::Post, "/user", json!({"id": 1}));

        api.post(Request::new("user").data(json!({"name": "a"})))
            .await
            .unwrap();

        assert_eq!(
            transport.last_request().unwrap().body,
            Some(json!({"payload": {"name": "a"}}))
        );
    }

    // ===========================================
    // Delete Tests
    // ===========================================

    #[tokio::test]
    async fn single_delete_removes_after_confirmation() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user", json!([{"id": 1}, {"id": 2}]));
        api.get(Request::new("user")).await.unwrap();

        api.delete(Request::new("user").id(1)).await.unwrap();

        assert_eq!(transport.calls(Method::Delete, "/user/1"), 1);
        assert!(api.store().item("user", &EntityId::Int(1)).is_none());
        assert!(api.store().origin("user", &EntityId::Int(1)).is_none());
        assert!(api.store().item("user", &EntityId::Int(2)).is_some());
    }

    #[tokio::test]
    async fn batch_delete_patches_delete_endpoint() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user", json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        api.get(Request::new("user")).await.unwrap();

        api.delete(Request::new("user").data(json!([{"id": 1}, {"id": 3}])))
            .await
            .unwrap();

        let last = transport.last_request().unwrap();
        assert_eq!(last.method, Method::Patch);
        assert_eq!(last.url, "/user/delete");
        assert!(api.store().item("user", &EntityId::Int(1)).is_none());
        assert!(api.store().item("user", &EntityId::Int(2)).is_some());
        assert!(api.store().item("user", &EntityId::Int(3)).is_none());
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache() {
        let (api, transport) = api();
        transport.respond(Method::Get, "/user", json!([{"id": 1}]));
        api.get(Request::new("user")).await.unwrap();
        transport.fail_next("503");

        let result = api.delete(Request::new("user").id(1)).await;

        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::RequestFailed(_)))
        ));
        assert!(api.store().item("user", &EntityId::Int(1)).is_some());
    }

    #[tokio::test]
    async fn delete_without_id_is_rejected() {
        let (api, _transport) = api();

        let result = api.delete(Request::new("user").data(json!({"name": "x"}))).await;

        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let (api, transport) = api();

        let result = api.get(Request::new("fakeref")).await;

        assert!(matches!(
            result,
            Err(ClientError::Store(StoreError::UnknownModel(_)))
        ));
        assert!(transport.history().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_propagates_unchanged() {
        let (api, transport) = api();
        transport.fail_route(Method::Get, "/user", "connection reset");

        let result = api.get(Request::new("user")).await;

        match result {
            Err(ClientError::Transport(TransportError::RequestFailed(msg))) => {
                assert_eq!(msg, "connection reset")
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
        }
    }
}
