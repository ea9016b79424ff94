//! Typed partial updates.
//!
//! A [`Patch`] holds exactly the fields a client supplied, already checked against the
//! model's [`Schema`]. Applying it to a document overwrites those top-level fields and
//! leaves every other field as it was.

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson};
use serde_json::Value;

use crate::{
    document::{Document, DocumentExt, ID_FIELD, json_to_document},
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{Schema, conversion_failed},
};

/// A mapping of present field name to its new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: BsonDocument,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a patch from a JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `value` is not a JSON object, and
    /// [`DocumentStoreError::ValidationFailed`] listing every field `schema` does not declare.
    pub fn from_json(value: &Value, schema: &Schema) -> DocumentStoreResult<Self> {
        if !value.is_object() {
            return Err(DocumentStoreError::InvalidDocument("expected a JSON object".into()));
        }

        let fields = json_to_document(value)?;
        let errors: Vec<String> = schema
            .undeclared_keys(&fields)
            .into_iter()
            .map(|key| format!("{key}: unknown field"))
            .collect();

        if !errors.is_empty() {
            return Err(DocumentStoreError::ValidationFailed(errors));
        }

        Ok(Self { fields })
    }

    /// Sets one field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BsonDocument {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a copy of `document` with this patch's fields overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] if the patch changes the document's
    /// identity or a value does not fit the field's type.
    pub fn apply<D: Document>(&self, document: &D) -> DocumentStoreResult<D> {
        let mut merged = document.to_document()?;

        for (field, value) in &self.fields {
            if field == ID_FIELD {
                let unchanged = match (document.id(), value) {
                    (Some(id), Bson::String(raw)) => raw.parse().ok() == Some(*id),
                    _ => false,
                };

                if !unchanged {
                    return Err(DocumentStoreError::ValidationFailed(vec![format!(
                        "{ID_FIELD}: identity cannot be changed"
                    )]));
                }
                continue;
            }

            merged.insert(field.clone(), value.clone());
        }

        deserialize_from_bson(Bson::Document(merged))
            .map_err(DocumentStoreError::from)
            .map_err(conversion_failed)
    }

    pub fn into_document(self) -> BsonDocument {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document::DocumentId,
        schema::{FieldSpec, ValueKind},
    };
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        id: Option<DocumentId>,
        name: Option<String>,
        size: Option<i64>,
    }

    impl Document for Widget {
        fn id(&self) -> Option<&DocumentId> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.id = Some(id);
        }

        fn collection_name() -> &'static str {
            "widgets"
        }

        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder::<Self>()
                    .field(FieldSpec::new("name", ValueKind::Text).required())
                    .field(FieldSpec::new("size", ValueKind::Integer))
                    .build()
            })
        }
    }

    fn widget() -> Widget {
        Widget { id: Some(DocumentId::new()), name: Some("a".into()), size: Some(3) }
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let original = widget();
        let patch = Patch::from_json(&json!({ "name": "b" }), Widget::schema()).unwrap();

        let patched = patch.apply(&original).unwrap();

        assert_eq!(patched.name.as_deref(), Some("b"));
        assert_eq!(patched.size, Some(3));
        assert_eq!(patched.id, original.id);
    }

    #[test]
    fn undeclared_fields_are_rejected() {
        let err = Patch::from_json(&json!({ "name": "b", "colour": "red" }), Widget::schema()).unwrap_err();

        assert!(matches!(err, DocumentStoreError::ValidationFailed(errors) if errors == vec!["colour: unknown field"]));
    }

    #[test]
    fn non_object_body_is_invalid() {
        let err = Patch::from_json(&json!(["name"]), Widget::schema()).unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[test]
    fn identity_may_be_repeated_but_not_changed() {
        let original = widget();
        let id = original.id.unwrap().to_string();

        let same = Patch::from_json(&json!({ "_id": id, "size": 4 }), Widget::schema()).unwrap();
        assert_eq!(same.apply(&original).unwrap().size, Some(4));

        let other = Patch::new().set(ID_FIELD, DocumentId::new());
        assert!(matches!(other.apply(&original), Err(DocumentStoreError::ValidationFailed(_))));
    }

    #[test]
    fn mistyped_values_fail_validation() {
        let patch = Patch::from_json(&json!({ "size": "big" }), Widget::schema()).unwrap();

        assert!(matches!(patch.apply(&widget()), Err(DocumentStoreError::ValidationFailed(_))));
    }
}
