//! Convenient re-exports of commonly used types from docrest.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docrest::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits, identifiers and the derive macro
//! - Store backends and builders
//! - Query construction and filtering
//! - Collection handles and the retry policy
//! - Resource handlers, requests and responses
//! - Error types

pub use docrest_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::{Collection, Model},
    document::{Document, DocumentExt, DocumentId, References},
    error::{DocumentStoreError, DocumentStoreResult},
    patch::Patch,
    query::{Expr, FieldOp, Filter, Projection, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    retry::{RetryConfig, RetryPolicy},
    schema::{FieldSpec, Schema, ValueKind},
    store::DocumentStore,
};
pub use docrest_macros::Document;
pub use docrest_resource::{
    Archetype, ErrorEnvelope, Hooks, Method, Request, ResourceConfig, ResourceHandler, ResourcePath,
    Response, RestError, RestResult,
};
