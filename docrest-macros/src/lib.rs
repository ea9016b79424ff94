//! Procedural macros for the docrest project.
//!
//! This crate provides `#[derive(Document)]`, which implements the `Document` trait and
//! builds the model's static schema from field attributes. It is re-exported by the
//! `docrest` crate; depend on that rather than on this crate directly.

#[allow(unused_extern_crates)]
extern crate self as docrest_macros;

mod document;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Document` for a struct with named fields.
///
/// # Container attributes
///
/// - `#[document(collection = "owners")]` - collection name, defaults to the snake-cased
///   type name with an `s` appended
/// - `#[document(max_rows = 50)]` - cap on rows materialized by a single find
/// - `#[document(validate = "path::to::check")]` - a `fn(&Self) -> Vec<String>` whose
///   messages are reported alongside schema violations
/// - `#[document(crate = "docrest_core")]` - path to the crate exposing `document` and
///   `schema`, `::docrest` by default
///
/// # Field attributes
///
/// - `#[document(id)]` - the `Option<DocumentId>` identity field; a field named `id` is used otherwise
///   (either way it must carry `#[serde(rename = "_id")]`)
/// - `#[document(required)]` - must be present and non-null under strict validation
/// - `#[document(reference = Target)]` - a `References` field pointing into `Target`'s collection
/// - `#[document(rename = "name")]` - stored name, when it differs from the field name and
///   no `#[serde(rename)]` is present
/// - `#[document(skip)]` - leave the field out of the schema
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// #[document(collection = "owners")]
/// pub struct Owner {
///     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
///     pub id: Option<DocumentId>,
///     #[document(required)]
///     pub name: String,
///     #[serde(default)]
///     #[document(reference = Tag)]
///     pub tags: References,
/// }
/// ```
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    document::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
