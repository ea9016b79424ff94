//! Core traits and types for document representation and serialization.
//!
//! This module provides the fundamental trait that all stored documents must implement,
//! the identifier type shared by every model, the duplicate-free [`References`] set used
//! by relationship fields, and utilities for converting documents between formats (BSON, JSON).

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};
use serde_json::{Value, from_value, to_value};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::Schema,
};

/// The key under which a document's identity is stored and serialized.
pub const ID_FIELD: &str = "_id";

/// Default upper bound on the number of rows materialized by a single find.
pub const MAX_FIND_ROWS: usize = 100;

/// Opaque unique identifier of a persisted document.
///
/// Identifiers are assigned by the store on first persist and serialize as strings
/// in both the storage and the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| DocumentStoreError::InvalidIdentity(s.to_string()))
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;

        raw.parse().map_err(D::Error::custom)
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        Bson::String(id.to_string())
    }
}

impl TryFrom<&Bson> for DocumentId {
    type Error = DocumentStoreError;

    fn try_from(value: &Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::String(s) => s.parse(),
            other => Err(DocumentStoreError::InvalidIdentity(other.to_string())),
        }
    }
}

/// An insertion-ordered set of foreign identifiers.
///
/// This is the value type of every reference field. Duplicates are rejected on insert
/// and dropped on deserialization, so a stored reference list never repeats an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct References(Vec<DocumentId>);

impl References {
    /// Creates an empty reference set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds an identifier. Returns `false` if it was already present.
    pub fn insert(&mut self, id: DocumentId) -> bool {
        if self.contains(&id) {
            return false;
        }

        self.0.push(id);
        true
    }

    /// Removes an identifier. Returns `false` if it was not present.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        match self.0.iter().position(|item| item == id) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replaces `old` with `new`, keeping the set duplicate-free.
    ///
    /// Returns `false` and leaves the set untouched if `old` is not a member.
    pub fn replace(&mut self, old: &DocumentId, new: DocumentId) -> bool {
        if !self.remove(old) {
            return false;
        }

        self.insert(new);
        true
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentId> {
        self.0.iter()
    }

    /// Returns the identifiers as a slice, in insertion order.
    pub fn ids(&self) -> &[DocumentId] {
        &self.0
    }

    /// Reads the reference set stored under `field` in a serialized document.
    ///
    /// A missing or null field is an empty set.
    pub fn from_field(document: &BsonDocument, field: &str) -> DocumentStoreResult<Self> {
        match document.get(field) {
            None | Some(Bson::Null) => Ok(Self::new()),
            Some(value) => Ok(deserialize_from_bson(value.clone())?),
        }
    }
}

impl FromIterator<DocumentId> for References {
    fn from_iter<I: IntoIterator<Item = DocumentId>>(iter: I) -> Self {
        let mut references = Self::new();
        for id in iter {
            references.insert(id);
        }
        references
    }
}

impl<'a> IntoIterator for &'a References {
    type Item = &'a DocumentId;
    type IntoIter = std::slice::Iter<'a, DocumentId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for References {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Vec::<DocumentId>::deserialize(deserializer)?
            .into_iter()
            .collect())
    }
}

impl From<&References> for Bson {
    fn from(references: &References) -> Self {
        Bson::Array(
            references
                .iter()
                .map(|id| Bson::from(*id))
                .collect(),
        )
    }
}

/// Core trait that all documents stored in a document store must implement.
///
/// A document knows its identity, the collection it persists to, and its static
/// [`Schema`]: the ordered field descriptors that say which fields are mandatory and
/// which are references to other models. The schema is built once per type and never
/// mutated afterwards.
///
/// Implementations are usually derived:
///
/// ```ignore
/// use docrest::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// #[document(collection = "owners")]
/// pub struct Owner {
///     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
///     #[document(id)]
///     pub id: Option<DocumentId>,
///     #[document(required)]
///     pub name: String,
///     #[serde(default)]
///     #[document(reference = Tag)]
///     pub tags: References,
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns this document's identifier, or `None` if it has never been persisted.
    fn id(&self) -> Option<&DocumentId>;

    /// Writes back the identifier assigned by the store.
    fn set_id(&mut self, id: DocumentId);

    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Returns the static field descriptor of this model.
    fn schema() -> &'static Schema;

    /// Per-model cap on rows materialized by a single find, if one is declared.
    fn max_rows() -> Option<usize> {
        Self::schema().max_rows()
    }

    /// Business rules beyond field presence. Each returned string is one violation.
    fn constraints(&self) -> Vec<String> {
        Vec::new()
    }

    /// Validates this document against its schema and constraints.
    ///
    /// Strict validation requires every mandatory field to be present and non-null;
    /// non-strict validation accepts partial documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] carrying one message per violation.
    fn validate(&self, strict: bool) -> DocumentStoreResult<()> {
        let mut errors = Self::schema().check(&self.to_document()?, strict);
        errors.extend(self.constraints());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocumentStoreError::ValidationFailed(errors))
        }
    }
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Converts this document to a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or does not produce a document.
    fn to_document(&self) -> DocumentStoreResult<BsonDocument>;

    /// Creates a document from a BSON document returned by the store.
    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn to_document(&self) -> DocumentStoreResult<BsonDocument> {
        match self.to_bson()? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "{} serialized to {:?}, expected a document",
                D::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Converts a raw BSON document into its JSON wire form.
pub fn document_to_json(document: &BsonDocument) -> DocumentStoreResult<Value> {
    Ok(to_value(document)?)
}

/// Converts a JSON object into a BSON document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if the value is not an object.
pub fn json_to_document(value: &Value) -> DocumentStoreResult<BsonDocument> {
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        _ => Err(DocumentStoreError::InvalidDocument("expected a JSON object".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_through_display() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();

        assert_eq!(id, parsed);
    }

    #[test]
    fn malformed_id_is_invalid_identity() {
        let err = "not-an-id".parse::<DocumentId>().unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidIdentity(value) if value == "not-an-id"));
    }

    #[test]
    fn id_serializes_as_string() {
        let id = DocumentId::new();

        assert_eq!(to_value(id).unwrap(), Value::String(id.to_string()));
        assert_eq!(Bson::from(id), Bson::String(id.to_string()));
    }

    #[test]
    fn references_keep_set_semantics() {
        let a = DocumentId::new();
        let b = DocumentId::new();
        let mut refs = References::new();

        assert!(refs.insert(a));
        assert!(!refs.insert(a));
        assert!(refs.insert(b));
        assert_eq!(refs.ids(), &[a, b]);

        assert!(refs.remove(&a));
        assert!(!refs.remove(&a));
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn replace_requires_membership_of_old_id() {
        let a = DocumentId::new();
        let b = DocumentId::new();
        let c = DocumentId::new();
        let mut refs: References = [a, b].into_iter().collect();

        assert!(!refs.replace(&c, a));
        assert_eq!(refs.ids(), &[a, b]);

        // replacing with an existing member collapses to one entry
        assert!(refs.replace(&a, b));
        assert_eq!(refs.ids(), &[b]);
    }

    #[test]
    fn deserialization_drops_duplicates() {
        let a = DocumentId::new();
        let raw = serde_json::json!([a.to_string(), a.to_string()]);
        let refs: References = from_value(raw).unwrap();

        assert_eq!(refs.ids(), &[a]);
    }

    #[test]
    fn missing_reference_field_reads_as_empty() {
        let document = bson::doc! { "name": "x", "tags": Bson::Null };

        assert!(References::from_field(&document, "tags").unwrap().is_empty());
        assert!(References::from_field(&document, "other").unwrap().is_empty());
    }
}
