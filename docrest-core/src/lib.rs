//! Persistence layer of docrest: typed documents over a pluggable JSON document store.
//!
//! This crate provides:
//!
//! - **Document traits** ([`document`]) - Identity, reference sets, and serialization of documents
//! - **Schema descriptors** ([`schema`]) - Static per-model field declarations and validation
//! - **Partial updates** ([`patch`]) - Typed present-field overlays used by PATCH
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query and filtering API** ([`query`]) - Filter expressions, sort keys, windows and projections
//! - **Retry policy** ([`retry`]) - Bounded retry of store calls on transient failures
//! - **Collections interface** ([`collection`]) - Typed and untyped CRUD handles
//! - **Document store** ([`store`]) - Owner of a backend and its retry policy
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::{store::DocumentStore, query::{Query, Filter}};
//!
//! let store = DocumentStore::new(backend);
//! let widgets = store.model::<Widget>();
//!
//! let widget = widgets.insert(widget).await?;
//! let large = widgets.find(Query::builder().filter(Filter::gte("size", 10)).build()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrest_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod patch;
pub mod query;
pub mod retry;
pub mod schema;
pub mod store;
