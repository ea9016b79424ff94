//! Collection handles for document store operations.
//!
//! Both handles borrow the store's backend and retry policy, and route every backend
//! call through [`RetryPolicy::execute`].
//!
//! # Collection Types
//!
//! - [`Collection`] - Untyped collection exchanging raw BSON documents
//! - [`Model`] - Typed collection for a specific [`Document`] type
//!
//! # Example
//!
//! ```ignore
//! let widgets = store.model::<Widget>();
//!
//! let widget = widgets.insert(Widget::named("a")).await?;
//! let found = widgets.get(widget.id().unwrap()).await?;
//! widgets.remove(&widget).await?;
//! ```

use bson::Document as BsonDocument;
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt, DocumentId, ID_FIELD, MAX_FIND_ROWS},
    error::DocumentStoreResult,
    query::{Expr, Filter, Projection, Query},
    retry::RetryPolicy,
};

/// An untyped collection with a reference to a storage backend.
///
/// Documents are plain BSON documents. This is what the relationship layer uses to
/// reach a reference target whose concrete type is only known through its schema.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    retry: &'a RetryPolicy,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B, retry: &'a RetryPolicy) -> Self {
        Self { name, backend, retry }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the first document matching `filter`.
    pub async fn find_one(
        &self,
        filter: Expr,
        projection: Option<Projection>,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("find_one", move || {
                backend.find_one(name, filter.clone(), projection.clone())
            })
            .await
    }

    /// Returns at most `max_rows` documents selected by `query`.
    pub async fn find(&self, query: Query, max_rows: usize) -> DocumentStoreResult<Vec<BsonDocument>> {
        let backend = self.backend;
        let name = self.name.as_str();

        let rows = self
            .retry
            .execute("find", move || backend.find(name, query.clone(), max_rows))
            .await?;

        debug!(collection = name, rows = rows.len(), "find");
        Ok(rows)
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("count", move || backend.count(name, filter.clone()))
            .await
    }

    /// Inserts a document, returning the identity it was stored under.
    pub async fn insert(
        &self,
        id: Option<DocumentId>,
        document: BsonDocument,
    ) -> DocumentStoreResult<DocumentId> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("insert", move || backend.insert(name, id, document.clone()))
            .await
    }

    /// Sets `fields` on the first document matching `filter`, returning the matched count.
    pub async fn update(&self, filter: Expr, fields: BsonDocument) -> DocumentStoreResult<u64> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("update", move || backend.update(name, filter.clone(), fields.clone()))
            .await
    }

    /// Writes a whole document by identity, inserting it if absent.
    pub async fn save(
        &self,
        id: Option<DocumentId>,
        document: BsonDocument,
    ) -> DocumentStoreResult<DocumentId> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("save", move || backend.save(name, id, document.clone()))
            .await
    }

    /// Deletes every document matching `filter`, returning the deleted count.
    pub async fn remove(&self, filter: Expr) -> DocumentStoreResult<u64> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("remove", move || backend.remove(name, filter.clone()))
            .await
    }

    pub async fn aggregate(&self, pipeline: Vec<BsonDocument>) -> DocumentStoreResult<Vec<BsonDocument>> {
        let backend = self.backend;
        let name = self.name.as_str();

        self.retry
            .execute("aggregate", move || backend.aggregate(name, pipeline.clone()))
            .await
    }
}

/// A typed collection bound to the document type `D`.
///
/// Reads drop stored fields that `D`'s schema does not declare before converting rows,
/// logging each one. Finds are capped by the model's declared `max_rows`, falling back to
/// the handle's own cap (by default [`MAX_FIND_ROWS`]).
#[derive(Debug)]
pub struct Model<'a, B: StoreBackend, D: Document> {
    collection: Collection<'a, B>,
    max_rows: usize,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> Model<'a, B, D> {
    pub(crate) fn new(backend: &'a B, retry: &'a RetryPolicy) -> Self {
        Self {
            collection: Collection::new(D::collection_name().to_string(), backend, retry),
            max_rows: MAX_FIND_ROWS,
            _marker: PhantomData,
        }
    }

    /// Overrides the find cap used when the model declares none.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// The effective cap on rows returned by [`Model::find`].
    pub fn max_rows(&self) -> usize {
        D::max_rows().unwrap_or(self.max_rows)
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    /// The untyped view of the same collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.collection
    }

    /// Fetches the first document matching `filter`.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<D>> {
        self.collection
            .find_one(filter, None)
            .await?
            .map(|row| self.materialize(row))
            .transpose()
    }

    /// Fetches a document by identity.
    pub async fn get(&self, id: &DocumentId) -> DocumentStoreResult<Option<D>> {
        self.find_one(Filter::id(*id)).await
    }

    /// Fetches the documents selected by `query`, ignoring its projection.
    pub async fn find(&self, mut query: Query) -> DocumentStoreResult<Vec<D>> {
        query.projection = None;

        self.collection
            .find(query, self.max_rows())
            .await?
            .into_iter()
            .map(|row| self.materialize(row))
            .collect()
    }

    /// Fetches raw rows selected by `query`, honoring its projection.
    ///
    /// Projected rows may lack required fields, so they are not converted to `D`.
    pub async fn find_raw(&self, query: Query) -> DocumentStoreResult<Vec<BsonDocument>> {
        Ok(self
            .collection
            .find(query, self.max_rows())
            .await?
            .into_iter()
            .map(|row| D::schema().strip_undeclared(row))
            .collect())
    }

    /// Fetches the first raw row matching `filter`, honoring `projection`.
    pub async fn find_one_raw(
        &self,
        filter: Expr,
        projection: Option<Projection>,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        Ok(self
            .collection
            .find_one(filter, projection)
            .await?
            .map(|row| D::schema().strip_undeclared(row)))
    }

    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.collection.count(filter).await
    }

    /// Inserts a new document and writes the assigned identity back onto it.
    ///
    /// Validation is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DuplicateIdentity`](crate::error::DocumentStoreError::DuplicateIdentity)
    /// if the document carries an identity that is already taken.
    pub async fn insert(&self, mut document: D) -> DocumentStoreResult<D> {
        let id = self
            .collection
            .insert(document.id().copied(), document.to_document()?)
            .await?;

        document.set_id(id);
        Ok(document)
    }

    /// Writes the document's serialized fields onto the stored row, leaving other fields
    /// untouched.
    ///
    /// The row is selected by `filter`, or by the document's identity when no filter is
    /// given. A document with neither is saved instead.
    pub async fn update(&self, document: D, filter: Option<Expr>) -> DocumentStoreResult<D> {
        let filter = match (filter, document.id()) {
            (Some(filter), _) => filter,
            (None, Some(id)) => Filter::id(*id),
            (None, None) => return self.save(document).await,
        };

        let mut fields = document.to_document()?;
        fields.remove(ID_FIELD);

        let matched = self.collection.update(filter, fields).await?;
        debug!(collection = self.name(), matched, "update");

        Ok(document)
    }

    /// Overwrites the stored row with the whole document, inserting it if absent.
    ///
    /// Fields missing from the document are cleared from the row.
    pub async fn save(&self, mut document: D) -> DocumentStoreResult<D> {
        let id = self
            .collection
            .save(document.id().copied(), document.to_document()?)
            .await?;

        document.set_id(id);
        Ok(document)
    }

    /// Deletes the document by identity.
    ///
    /// A document that was never persisted, or is already gone, is not an error.
    pub async fn remove(&self, document: &D) -> DocumentStoreResult<()> {
        let Some(id) = document.id() else {
            return Ok(());
        };

        let deleted = self.collection.remove(Filter::id(*id)).await?;
        debug!(collection = self.name(), %id, deleted, "remove");

        Ok(())
    }

    /// Deletes every document matching `filter`.
    pub async fn remove_where(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.collection.remove(filter).await
    }

    pub async fn aggregate(&self, pipeline: Vec<BsonDocument>) -> DocumentStoreResult<Vec<BsonDocument>> {
        self.collection.aggregate(pipeline).await
    }

    fn materialize(&self, row: BsonDocument) -> DocumentStoreResult<D> {
        D::from_document(D::schema().strip_undeclared(row))
    }
}
