//! Main docrest crate: generic REST resources over a JSON document store.
//!
//! This crate is the primary entry point for users of docrest. It re-exports the
//! persistence layer, the resource handlers and the storage backends.
//!
//! # Features
//!
//! - **Declared models** - `#[derive(Document)]` on a Serde struct gives identity, a static
//!   schema and reference fields
//! - **CRUD for free** - Typed and untyped collections with bounded retry on transient failures
//! - **Four handler archetypes** - Single, collection, nested single and nested collection
//! - **Querying** - Filters, multi-key sorting, paging and projections from query parameters
//! - **Relationships** - Reference fields as ordered, duplicate-free sets of foreign ids
//!
//! # Quick Start
//!
//! ```ignore
//! use docrest::{prelude::*, memory::InMemoryStore};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! pub struct Tag {
//!     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<DocumentId>,
//!     #[document(required)]
//!     pub label: String,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! pub struct Owner {
//!     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<DocumentId>,
//!     #[document(required)]
//!     pub name: String,
//!     #[serde(default)]
//!     #[document(reference = Tag)]
//!     pub tags: References,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DocumentStore::new(InMemoryStore::builder().build().await?));
//!
//!     let owners = ResourceHandler::<_, Owner>::collection(store.clone());
//!     let tags = ResourceHandler::<_, Owner>::nested_collection(store.clone());
//!
//!     let created = owners
//!         .handle(Request::new(Method::Post, ResourcePath::root()).with_body(json!({ "name": "ada" })))
//!         .await?;
//!     let owner_id = created.body.as_ref().and_then(|body| body["_id"].as_str()).unwrap_or_default();
//!
//!     tags.handle(
//!         Request::new(Method::Post, ResourcePath::nested(owner_id, "tags"))
//!             .with_body(json!({ "label": "admin" })),
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docrest_core::{backend, collection, document, error, patch, query, retry, schema, store};
pub use docrest_macros::Document;

/// REST resource handlers.
pub use docrest_resource as resource;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docrest_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrest_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
