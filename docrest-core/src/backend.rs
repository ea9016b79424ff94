//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over different storage implementations,
//! allowing the document store to work with various backends (in-memory, MongoDB, etc.).
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface over raw BSON documents:
//! filtered reads with sort/skip/limit/projection, counting, insertion, partial updates,
//! whole-document saves, removal and aggregation pipelines. Implementations are required
//! to be thread-safe (`Send + Sync`) and support concurrent access.
//!
//! Backends never retry. A failure that may succeed when repeated (lost connection,
//! server selection timeout) is reported as
//! [`DocumentStoreError::Transient`](crate::error::DocumentStoreError::Transient) and the
//! caller's [`RetryPolicy`](crate::retry::RetryPolicy) decides what to do with it.
//!
//! # Examples
//!
//! ```ignore
//! use docrest_core::{backend::StoreBackend, query::Filter};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.insert("users", None, doc! { "name": "Alice", "age": 30 }).await?;
//! let found = backend.find_one("users", Filter::id(id), None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::fmt::Debug;

use crate::{
    document::DocumentId,
    error::DocumentStoreResult,
    query::{Expr, Projection, Query},
};

/// Abstract interface for document storage backends.
///
/// Documents are exchanged as BSON documents whose `_id` key holds the string form of a
/// [`DocumentId`]. Collections are created implicitly on first write.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Retryable failures must be reported as `Transient`; every other failure must not be.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching `filter`, optionally projected.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if nothing matches.
    async fn find_one(
        &self,
        collection: &str,
        filter: Expr,
        projection: Option<Projection>,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Returns the documents selected by `query`.
    ///
    /// The query's filter, sort keys, skip and limit are applied in that order. The
    /// result never holds more than `max_rows` documents, whatever the query's limit.
    async fn find(
        &self,
        collection: &str,
        query: Query,
        max_rows: usize,
    ) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// Counts the documents matching `filter`, ignoring any window.
    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64>;

    /// Inserts a new document and returns its identity.
    ///
    /// A fresh identity is generated when `id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DuplicateIdentity`](crate::error::DocumentStoreError::DuplicateIdentity)
    /// if a document with the same identity already exists.
    async fn insert(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        document: BsonDocument,
    ) -> DocumentStoreResult<DocumentId>;

    /// Sets `fields` on the first document matching `filter`.
    ///
    /// Fields not named in `fields` are left untouched. Returns the number of
    /// documents matched, which is 0 or 1.
    async fn update(
        &self,
        collection: &str,
        filter: Expr,
        fields: BsonDocument,
    ) -> DocumentStoreResult<u64>;

    /// Writes a whole document, replacing any stored document with the same identity.
    ///
    /// Inserts when no such document exists. A fresh identity is generated when `id` is `None`.
    async fn save(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        document: BsonDocument,
    ) -> DocumentStoreResult<DocumentId>;

    /// Deletes every document matching `filter` and returns how many were deleted.
    async fn remove(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline over a collection.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<BsonDocument>,
    ) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for backends that need asynchronous setup, such as opening a connection.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
