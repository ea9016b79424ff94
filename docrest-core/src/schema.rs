//! Static field descriptors for document models.
//!
//! Every [`Document`] type exposes one immutable [`Schema`], built on first use and shared
//! for the lifetime of the process. The schema answers the questions the generic handlers
//! need without touching a concrete type: which fields exist, which are mandatory, which
//! are references and to which model, and how a raw query-string value should be typed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::OnceLock;
//! use docrest_core::schema::{Schema, FieldSpec, ValueKind};
//!
//! fn schema() -> &'static Schema {
//!     static SCHEMA: OnceLock<Schema> = OnceLock::new();
//!     SCHEMA.get_or_init(|| {
//!         Schema::builder::<Owner>()
//!             .field(FieldSpec::new("name", ValueKind::Text).required())
//!             .field(FieldSpec::new("tags", ValueKind::Identity).references::<Tag>())
//!             .build()
//!     })
//! }
//! ```

use bson::{Bson, Document as BsonDocument};
use serde_json::Value;
use std::{collections::HashSet, fmt};
use tracing::warn;

use crate::{
    document::{Document, DocumentExt, DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// The scalar type a field's values are coerced to when they arrive as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// No coercion; values stay strings.
    Any,
    Text,
    Integer,
    Float,
    Boolean,
    /// A [`DocumentId`], normalized to its canonical string form.
    Identity,
}

impl ValueKind {
    /// Coerces a raw text value into a BSON value of this kind.
    ///
    /// Returns `None` if the text does not parse as this kind.
    pub fn coerce(&self, raw: &str) -> Option<Bson> {
        let raw = raw.trim();

        match self {
            ValueKind::Any | ValueKind::Text => Some(Bson::String(raw.to_string())),
            ValueKind::Integer => raw.parse::<i64>().ok().map(Bson::Int64),
            ValueKind::Float => raw.parse::<f64>().ok().map(Bson::Double),
            ValueKind::Boolean => raw.parse::<bool>().ok().map(Bson::Boolean),
            ValueKind::Identity => raw.parse::<DocumentId>().ok().map(Bson::from),
        }
    }
}

/// A handle on another model's schema, used as the target of a reference field.
#[derive(Clone, Copy)]
pub struct ModelRef {
    schema: fn() -> &'static Schema,
}

impl ModelRef {
    /// Creates a reference to the schema of `D`.
    pub fn of<D: Document>() -> Self {
        Self { schema: D::schema }
    }

    /// Resolves the target schema.
    pub fn schema(&self) -> &'static Schema {
        (self.schema)()
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelRef")
            .field(&self.schema().collection())
            .finish()
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.schema().collection() == other.schema().collection()
    }
}

/// Whether a field holds plain data or a set of foreign identifiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Plain,
    Reference(ModelRef),
}

/// Descriptor of a single declared field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    kind: FieldKind,
    value: ValueKind,
    required: bool,
}

impl FieldSpec {
    /// Creates an optional plain field.
    pub fn new(name: &'static str, value: ValueKind) -> Self {
        Self {
            name,
            kind: FieldKind::Plain,
            value,
            required: false,
        }
    }

    /// Marks the field as mandatory under strict validation.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as a set of identifiers into `D`'s collection.
    pub fn references<D: Document>(mut self) -> Self {
        self.kind = FieldKind::Reference(ModelRef::of::<D>());
        self.value = ValueKind::Identity;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the referenced model if this is a reference field.
    pub fn target(&self) -> Option<ModelRef> {
        match self.kind {
            FieldKind::Reference(target) => Some(target),
            FieldKind::Plain => None,
        }
    }
}

type ConformFn = fn(Value, bool) -> DocumentStoreResult<BsonDocument>;

/// The immutable field descriptor of one model type.
#[derive(Debug)]
pub struct Schema {
    collection: &'static str,
    fields: Vec<FieldSpec>,
    max_rows: Option<usize>,
    conform: ConformFn,
}

impl Schema {
    /// Starts a schema for the model `D`.
    pub fn builder<D: Document>() -> SchemaBuilder {
        SchemaBuilder {
            collection: D::collection_name(),
            fields: Vec::new(),
            max_rows: None,
            conform: conform_as::<D>,
        }
    }

    /// The collection this model persists to.
    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Declared fields, in declaration order. The identity field is implicit.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|field| field.name == name)
    }

    /// Returns `true` for declared fields and for the identity field.
    pub fn is_declared(&self, name: &str) -> bool {
        name == ID_FIELD || self.field(name).is_some()
    }

    /// The value kind of a declared field, [`ValueKind::Identity`] for the identity field.
    pub fn value_kind(&self, name: &str) -> Option<ValueKind> {
        if name == ID_FIELD {
            return Some(ValueKind::Identity);
        }

        self.field(name).map(FieldSpec::value_kind)
    }

    /// Returns the target model of a reference field, or `None` if `name` is not one.
    pub fn reference(&self, name: &str) -> Option<ModelRef> {
        self.field(name).and_then(FieldSpec::target)
    }

    /// Iterates over the reference fields and their targets.
    pub fn references(&self) -> impl Iterator<Item = (&'static str, ModelRef)> + '_ {
        self.fields
            .iter()
            .filter_map(|field| field.target().map(|target| (field.name, target)))
    }

    /// The declared cap on rows materialized by a single find.
    pub fn max_rows(&self) -> Option<usize> {
        self.max_rows
    }

    /// Checks a serialized document against the declared fields.
    ///
    /// Returns one message per violation; an empty vector means the document passed.
    pub fn check(&self, document: &BsonDocument, strict: bool) -> Vec<String> {
        let mut errors = Vec::new();

        for field in &self.fields {
            let value = document.get(field.name);

            if strict && field.required && matches!(value, None | Some(Bson::Null)) {
                errors.push(format!("{}: this field is required", field.name));
            }

            if let (FieldKind::Reference(_), Some(Bson::Array(items))) = (field.kind, value) {
                let mut seen = HashSet::new();
                if !items.iter().all(|item| seen.insert(item.to_string())) {
                    errors.push(format!("{}: references must be unique", field.name));
                }
            }
        }

        errors
    }

    /// Keys of `document` that this schema does not declare.
    pub fn undeclared_keys<'a>(&self, document: &'a BsonDocument) -> Vec<&'a str> {
        document
            .keys()
            .map(String::as_str)
            .filter(|key| !self.is_declared(key))
            .collect()
    }

    /// Removes stored fields this schema does not declare, logging each one.
    pub fn strip_undeclared(&self, mut document: BsonDocument) -> BsonDocument {
        let unknown: Vec<String> = self
            .undeclared_keys(&document)
            .into_iter()
            .map(str::to_string)
            .collect();

        for key in unknown {
            warn!(collection = self.collection, field = %key, "dropping undeclared stored field");
            document.remove(&key);
        }

        document
    }

    /// Converts a JSON body into a validated storage document of this model.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] if the body does not convert to
    /// the model or fails validation.
    pub fn conform(&self, value: Value, strict: bool) -> DocumentStoreResult<BsonDocument> {
        (self.conform)(value, strict)
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    collection: &'static str,
    fields: Vec<FieldSpec>,
    max_rows: Option<usize>,
    conform: ConformFn,
}

impl SchemaBuilder {
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            collection: self.collection,
            fields: self.fields,
            max_rows: self.max_rows,
            conform: self.conform,
        }
    }
}

/// Converts a deserialization failure of user input into a validation failure.
pub fn conversion_failed(err: DocumentStoreError) -> DocumentStoreError {
    match err {
        DocumentStoreError::Serialization(message) => DocumentStoreError::ValidationFailed(vec![message]),
        other => other,
    }
}

fn conform_as<D: Document>(value: Value, strict: bool) -> DocumentStoreResult<BsonDocument> {
    let document = D::from_json(value).map_err(conversion_failed)?;
    document.validate(strict)?;
    document.to_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::References;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Tag {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        id: Option<DocumentId>,
        label: Option<String>,
    }

    impl Document for Tag {
        fn id(&self) -> Option<&DocumentId> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.id = Some(id);
        }

        fn collection_name() -> &'static str {
            "tags"
        }

        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder::<Self>()
                    .field(FieldSpec::new("label", ValueKind::Text).required())
                    .build()
            })
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Owner {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        id: Option<DocumentId>,
        name: Option<String>,
        age: Option<i64>,
        #[serde(default)]
        tags: References,
    }

    impl Document for Owner {
        fn id(&self) -> Option<&DocumentId> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.id = Some(id);
        }

        fn collection_name() -> &'static str {
            "owners"
        }

        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder::<Self>()
                    .field(FieldSpec::new("name", ValueKind::Text).required())
                    .field(FieldSpec::new("age", ValueKind::Integer))
                    .field(FieldSpec::new("tags", ValueKind::Identity).references::<Tag>())
                    .max_rows(50)
                    .build()
            })
        }

        fn constraints(&self) -> Vec<String> {
            match self.age {
                Some(age) if age < 0 => vec!["age: must not be negative".to_string()],
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn reference_fields_are_introspectable() {
        let schema = Owner::schema();

        assert_eq!(schema.collection(), "owners");
        assert_eq!(schema.reference("tags").map(|t| t.schema().collection()), Some("tags"));
        assert!(schema.reference("name").is_none());
        assert!(schema.reference("missing").is_none());
        assert_eq!(schema.references().map(|(name, _)| name).collect::<Vec<_>>(), vec!["tags"]);
        assert_eq!(schema.max_rows(), Some(50));
    }

    #[test]
    fn identity_is_always_declared() {
        let schema = Owner::schema();

        assert!(schema.is_declared(ID_FIELD));
        assert_eq!(schema.value_kind(ID_FIELD), Some(ValueKind::Identity));
        assert_eq!(schema.value_kind("age"), Some(ValueKind::Integer));
        assert_eq!(schema.value_kind("nope"), None);
    }

    #[test]
    fn strict_validation_requires_mandatory_fields() {
        let owner = Owner { id: None, name: None, age: Some(3), tags: References::new() };

        assert!(owner.validate(false).is_ok());
        let err = owner.validate(true).unwrap_err();
        assert!(matches!(err, DocumentStoreError::ValidationFailed(errors) if errors == vec!["name: this field is required"]));
    }

    #[test]
    fn constraints_are_reported_with_schema_errors() {
        let owner = Owner { id: None, name: None, age: Some(-1), tags: References::new() };

        match owner.validate(true) {
            Err(DocumentStoreError::ValidationFailed(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn conform_reports_conversion_errors_as_validation() {
        let schema = Owner::schema();

        let err = schema.conform(json!({ "name": "a", "age": "old" }), true).unwrap_err();
        assert!(matches!(err, DocumentStoreError::ValidationFailed(_)));

        let document = schema.conform(json!({ "name": "a", "age": 4 }), true).unwrap();
        assert_eq!(document.get_str("name").unwrap(), "a");
    }

    #[test]
    fn duplicate_references_fail_the_check() {
        let id = Bson::String(DocumentId::new().to_string());
        let document = bson::doc! { "name": "a", "tags": [id.clone(), id] };

        assert_eq!(Owner::schema().check(&document, false), vec!["tags: references must be unique"]);
    }

    #[test]
    fn coercion_follows_value_kind() {
        assert_eq!(ValueKind::Integer.coerce("10"), Some(Bson::Int64(10)));
        assert_eq!(ValueKind::Integer.coerce("ten"), None);
        assert_eq!(ValueKind::Float.coerce("2.5"), Some(Bson::Double(2.5)));
        assert_eq!(ValueKind::Boolean.coerce("true"), Some(Bson::Boolean(true)));
        assert_eq!(ValueKind::Any.coerce(" 10 "), Some(Bson::String("10".into())));
        assert_eq!(ValueKind::Identity.coerce("bad"), None);
    }

    #[test]
    fn undeclared_keys_exclude_identity() {
        let document = bson::doc! { "_id": "x", "name": "a", "legacy": 1 };

        assert_eq!(Owner::schema().undeclared_keys(&document), vec!["legacy"]);
        assert_eq!(
            Owner::schema().strip_undeclared(document),
            bson::doc! { "_id": "x", "name": "a" }
        );
    }
}
