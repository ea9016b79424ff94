//! Main document store interface for interacting with document backends.
//!
//! A [`DocumentStore`] owns a backend and the [`RetryPolicy`] every call through it is
//! subject to. Handles onto individual collections borrow both.
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{store::DocumentStore, retry::RetryPolicy};
//!
//! let store = DocumentStore::new(backend).with_retry(RetryPolicy::builder().max_retries(5).build());
//! let widgets = store.model::<Widget>();
//! ```

use crate::{
    backend::StoreBackend,
    collection::{Collection, Model},
    document::Document,
    error::DocumentStoreResult,
    retry::RetryPolicy,
};

/// A document store bound to a specific backend implementation.
///
/// The store is shared by every in-flight request; it holds no per-request state.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    retry: RetryPolicy,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the default retry policy.
    pub fn new(backend: B) -> Self {
        Self { backend, retry: RetryPolicy::default() }
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a typed handle for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn model<'a, D: Document>(&'a self) -> Model<'a, B, D> {
        Model::new(&self.backend, &self.retry)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend, &self.retry)
    }

    /// Shuts down the store, consuming it and releasing backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}
