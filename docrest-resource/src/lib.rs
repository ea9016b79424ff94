//! REST resource handlers for docrest models.
//!
//! This crate turns any [`Document`](docrest_core::document::Document) into a REST
//! resource without per-resource code:
//!
//! - **Handlers** ([`handler`]) - The four archetypes: single, collection, nested single
//!   and nested collection
//! - **Lifecycle** ([`lifecycle`]) - Verb guard, hooks and phase tracking shared by every
//!   archetype
//! - **Relationships** ([`nested`]) - Link, relink, unlink and create-and-link on
//!   reference fields
//! - **Query parameters** ([`params`]) - Filters, sorting, paging and projections from the
//!   query string
//! - **Requests and responses** ([`request`]) - Transport-neutral request and response values
//! - **Errors** ([`error`]) - Status mapping and the JSON error envelope
//!
//! Routing and HTTP framing are left to the caller.

pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod nested;
pub mod params;
pub mod request;

pub use config::ResourceConfig;
pub use error::{ErrorEnvelope, RestError, RestResult};
pub use handler::ResourceHandler;
pub use lifecycle::{Archetype, Hooks, NoHooks};
pub use request::{Method, Request, ResourcePath, Response};
