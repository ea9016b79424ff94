//! Error types and result types for document store operations.
//!
//! This module provides error handling for every persistence operation.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! Backends signal retryable conditions (lost connections, server selection
//! timeouts) with [`DocumentStoreError::Transient`]. The retry policy is the
//! only consumer of that signal: once its attempts are exhausted the failure
//! surfaces as [`DocumentStoreError::StoreUnavailable`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given identity already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DuplicateIdentity(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The supplied value is not a well-formed document identifier.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    /// The document failed schema or business validation.
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A retryable failure reported by the backend, such as a dropped connection.
    #[error("Transient failure: {0}")]
    Transient(String),
    /// The retry policy exhausted its attempts against a transient failure.
    #[error("Store unavailable: {operation} failed after {attempts} attempts: {reason}")]
    StoreUnavailable {
        /// The name of the store operation that failed.
        operation: String,
        /// The number of attempts performed, including the first one.
        attempts: u32,
        /// The last transient failure reported by the backend.
        reason: String,
    },
    /// A non-retryable error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns `true` if the error is a retryable backend failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, DocumentStoreError::Transient(_))
    }

    /// Returns `true` if the retry policy gave up on this operation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DocumentStoreError::StoreUnavailable { .. })
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
