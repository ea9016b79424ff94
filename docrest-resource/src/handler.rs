//! Generic resource handlers.
//!
//! A [`ResourceHandler`] serves one model `D` in one [`Archetype`]. It owns no per-request
//! state; the store is shared across handlers and requests.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(DocumentStore::new(InMemoryStore::builder().build().await?));
//!
//! let owners = ResourceHandler::<_, Owner>::collection(store.clone());
//! let response = owners
//!     .handle(Request::new(Method::Post, ResourcePath::root()).with_body(json!({ "name": "a" })))
//!     .await?;
//! assert_eq!(response.status, 201);
//! ```

use bson::Document as BsonDocument;
use serde_json::Value;
use std::{marker::PhantomData, sync::Arc};

use docrest_core::{
    backend::StoreBackend,
    collection::Model,
    document::{Document, DocumentExt, DocumentId, ID_FIELD, document_to_json},
    patch::Patch,
    query::Filter,
    schema::conversion_failed,
    store::DocumentStore,
};

use crate::{
    config::ResourceConfig,
    error::{RestError, RestResult},
    lifecycle::{self, Archetype, Hooks, NoHooks},
    nested::Relationship,
    params,
    request::{Method, Request, Response},
};

pub const COUNT_PER_PAGE: &str = "X-Count-Per-Page";
pub const TOTAL_ITEMS: &str = "X-Total-Items";

fn path_id(raw: Option<&String>) -> RestResult<DocumentId> {
    let raw = raw.ok_or_else(|| RestError::MalformedRequest("path is missing an id".into()))?;

    Ok(raw.parse()?)
}

fn path_field(raw: Option<&String>) -> RestResult<&str> {
    raw.map(String::as_str)
        .ok_or_else(|| RestError::MalformedRequest("path is missing a field".into()))
}

/// Reads the new target identity from a relink body: `{"_id": "<id>"}`.
fn replacement_id(body: &Value) -> RestResult<DocumentId> {
    match body.get(ID_FIELD) {
        None | Some(Value::Null) => Err(RestError::ValidationFailed(vec![format!(
            "{ID_FIELD}: this field is required"
        )])),
        Some(Value::String(raw)) => Ok(raw.parse()?),
        Some(other) => Err(RestError::InvalidIdentity(other.to_string())),
    }
}

fn build<D: Document>(body: &Value) -> RestResult<D> {
    Ok(D::from_json(body.clone()).map_err(conversion_failed)?)
}

fn rows_to_json(rows: &[BsonDocument]) -> RestResult<Value> {
    rows.iter()
        .map(|row| document_to_json(row).map_err(RestError::from))
        .collect::<RestResult<Vec<_>>>()
        .map(Value::Array)
}

fn counted(per_page: usize, total: u64) -> Response {
    Response::new(200)
        .with_header(COUNT_PER_PAGE, per_page)
        .with_header(TOTAL_ITEMS, total)
}

pub struct ResourceHandler<B: StoreBackend, D: Document> {
    store: Arc<DocumentStore<B>>,
    archetype: Archetype,
    hooks: Arc<dyn Hooks>,
    config: ResourceConfig,
    _marker: PhantomData<fn() -> D>,
}

impl<B: StoreBackend, D: Document> Clone for ResourceHandler<B, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            archetype: self.archetype,
            hooks: self.hooks.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<B: StoreBackend, D: Document> ResourceHandler<B, D> {
    pub fn new(store: Arc<DocumentStore<B>>, archetype: Archetype) -> Self {
        Self {
            store,
            archetype,
            hooks: Arc::new(NoHooks),
            config: ResourceConfig::default(),
            _marker: PhantomData,
        }
    }

    /// `GET/PUT/PATCH/DELETE /resource/{id}`
    pub fn single(store: Arc<DocumentStore<B>>) -> Self {
        Self::new(store, Archetype::Single)
    }

    /// `GET/POST/HEAD /resource`
    pub fn collection(store: Arc<DocumentStore<B>>) -> Self {
        Self::new(store, Archetype::Collection)
    }

    /// `GET/PUT/PATCH/DELETE /resource/{id}/{field}/{nested_id}`
    pub fn nested_single(store: Arc<DocumentStore<B>>) -> Self {
        Self::new(store, Archetype::NestedSingle)
    }

    /// `GET/POST/HEAD /resource/{id}/{field}`
    pub fn nested_collection(store: Arc<DocumentStore<B>>) -> Self {
        Self::new(store, Archetype::NestedCollection)
    }

    pub fn with_hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    /// Serves one request.
    ///
    /// Every failure is returned as an error response, except
    /// [`RestError::StoreUnavailable`] which is returned as `Err` for the caller to
    /// handle.
    pub async fn handle(&self, request: Request) -> RestResult<Response> {
        lifecycle::run(self.archetype, self.hooks.as_ref(), &request, || self.dispatch(&request)).await
    }

    fn model(&self) -> Model<'_, B, D> {
        self.store.model::<D>().with_max_rows(self.config.max_rows)
    }

    fn relationship(&self, request: &Request) -> RestResult<Relationship<'_, B, D>> {
        let field = path_field(request.path.field.as_ref())?;

        Ok(Relationship::<B, D>::resolve(self.store.as_ref(), field)?.with_max_rows(self.config.max_rows))
    }

    async fn dispatch(&self, request: &Request) -> RestResult<Response> {
        match self.archetype {
            Archetype::Single => self.single_verb(request).await,
            Archetype::Collection => self.collection_verb(request).await,
            Archetype::NestedSingle => self.nested_single_verb(request).await,
            Archetype::NestedCollection => self.nested_collection_verb(request).await,
        }
    }

    async fn single_verb(&self, request: &Request) -> RestResult<Response> {
        let id = path_id(request.path.id.as_ref())?;
        let query = params::prepare(&request.params, D::schema(), &self.config)?;
        let model = self.model();

        match request.method {
            Method::Get => {
                let row = model
                    .find_one_raw(Filter::id(id), query.projection)
                    .await?
                    .ok_or(RestError::NotFound)?;

                Ok(Response::ok(document_to_json(&row)?))
            }
            Method::Patch => {
                let current = model.get(&id).await?.ok_or(RestError::NotFound)?;
                let patch = Patch::from_json(request.json_object()?, D::schema())?;

                let merged = patch.apply(&current)?;
                merged.validate(false)?;
                let updated = model.update(merged, None).await?;

                Ok(Response::ok(updated.to_json()?))
            }
            Method::Put => {
                model.get(&id).await?.ok_or(RestError::NotFound)?;

                let mut document = build::<D>(request.json_object()?)?;
                document.set_id(id);
                document.validate(true)?;
                let saved = model.save(document).await?;

                Ok(Response::ok(saved.to_json()?))
            }
            Method::Delete => {
                let current = model.get(&id).await?.ok_or(RestError::NotFound)?;
                model.remove(&current).await?;

                Ok(Response::no_content())
            }
            other => Err(RestError::MethodNotAllowed(other)),
        }
    }

    async fn collection_verb(&self, request: &Request) -> RestResult<Response> {
        let query = params::prepare(&request.params, D::schema(), &self.config)?;
        let model = self.model();

        match request.method {
            Method::Get => {
                let rows = model.find_raw(query).await?;

                Ok(Response::ok(rows_to_json(&rows)?))
            }
            Method::Post => {
                let document = build::<D>(request.json_object()?)?;
                document.validate(true)?;
                let created = model.insert(document).await?;

                Ok(Response::created(created.to_json()?))
            }
            Method::Head => {
                let per_page = query.limit.unwrap_or(self.config.page_size);
                let total = model.count(query.filter).await?;

                Ok(counted(per_page, total))
            }
            other => Err(RestError::MethodNotAllowed(other)),
        }
    }

    async fn nested_single_verb(&self, request: &Request) -> RestResult<Response> {
        let relationship = self.relationship(request)?;
        let target_id = path_id(request.path.nested_id.as_ref())?;
        let query = params::prepare(&request.params, relationship.target_schema(), &self.config)?;
        // reads never consult the owner
        let owner_id = || path_id(request.path.id.as_ref());

        let target = match request.method {
            Method::Get => relationship.target(&target_id, query.projection).await?,
            Method::Put => relationship.link(owner_id()?, target_id).await?,
            Method::Patch => {
                let owner_id = owner_id()?;
                let new_id = replacement_id(request.json_object()?)?;
                relationship.relink(owner_id, target_id, new_id).await?
            }
            Method::Delete => relationship.unlink(owner_id()?, target_id).await?,
            other => return Err(RestError::MethodNotAllowed(other)),
        };

        Ok(Response::ok(document_to_json(&target)?))
    }

    async fn nested_collection_verb(&self, request: &Request) -> RestResult<Response> {
        let relationship = self.relationship(request)?;
        let owner_id = path_id(request.path.id.as_ref())?;
        let query = params::prepare(&request.params, relationship.target_schema(), &self.config)?;

        match request.method {
            Method::Get => {
                let rows = relationship.targets(owner_id, query).await?;

                Ok(Response::ok(rows_to_json(&rows)?))
            }
            Method::Post => {
                let created = relationship
                    .create_and_link(owner_id, request.json_object()?)
                    .await?;

                Ok(Response::created(document_to_json(&created)?))
            }
            Method::Head => {
                let per_page = query.limit.unwrap_or(self.config.page_size);
                let total = relationship.count_targets(owner_id, query.filter).await?;

                Ok(counted(per_page, total))
            }
            other => Err(RestError::MethodNotAllowed(other)),
        }
    }
}
