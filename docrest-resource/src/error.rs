//! Request-level failures and the JSON error envelope.
//!
//! Every [`RestError`] except [`RestError::StoreUnavailable`] is recovered by the handler
//! and rendered as an [`ErrorEnvelope`] with the matching status code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use docrest_core::{document::ID_FIELD, error::DocumentStoreError};

use crate::request::{Method, Response};

#[derive(Error, Debug)]
pub enum RestError {
    #[error("Object does not exist")]
    NotFound,
    #[error("Unknown nested resource: {0}")]
    UnknownNestedResource(String),
    #[error("Invalid id: {0}")]
    InvalidIdentity(String),
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    #[error("Bad request: {0}")]
    MalformedRequest(String),
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),
    /// The store stayed unreachable after every retry. Never rendered as an envelope.
    #[error(transparent)]
    StoreUnavailable(DocumentStoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RestError {
    pub fn status_code(&self) -> u16 {
        match self {
            RestError::NotFound
            | RestError::UnknownNestedResource(_)
            | RestError::InvalidIdentity(_) => 404,
            RestError::ValidationFailed(_) => 422,
            RestError::MalformedRequest(_) => 400,
            RestError::MethodNotAllowed(_) => 405,
            RestError::StoreUnavailable(_) => 503,
            RestError::Internal(_) => 500,
        }
    }

    /// The short message carried by the envelope.
    pub fn message(&self) -> &'static str {
        match self {
            RestError::NotFound => "Object does not exist",
            RestError::UnknownNestedResource(_) => "Unknown nested resource",
            RestError::InvalidIdentity(_) => "Invalid id",
            RestError::ValidationFailed(_) => "Validation Failed",
            RestError::MalformedRequest(_) => "Bad Request",
            RestError::MethodNotAllowed(_) => "Method not allowed",
            RestError::StoreUnavailable(_) => "Service Unavailable",
            RestError::Internal(_) => "Internal Server Error",
        }
    }

    /// Detail lines carried by the envelope.
    pub fn errors(&self) -> Vec<String> {
        match self {
            RestError::ValidationFailed(errors) => errors.clone(),
            RestError::MalformedRequest(detail) => vec![detail.clone()],
            _ => Vec::new(),
        }
    }

    /// Returns `true` if the error must escape the handler instead of becoming a response.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RestError::StoreUnavailable(_))
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.status_code(),
            message: self.message().to_string(),
            errors: self.errors(),
        }
    }

    pub fn into_response(self) -> Response {
        let envelope = self.envelope();

        // three plain fields; serialization cannot fail
        let body = serde_json::to_value(&envelope).unwrap_or_default();
        Response::new(envelope.code).with_body(body)
    }
}

/// The failure body: `{"code": .., "message": .., "errors": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub message: String,
    pub errors: Vec<String>,
}

impl From<DocumentStoreError> for RestError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::DocumentNotFound(..) => RestError::NotFound,
            DocumentStoreError::InvalidIdentity(value) => RestError::InvalidIdentity(value),
            DocumentStoreError::ValidationFailed(errors) => RestError::ValidationFailed(errors),
            DocumentStoreError::DuplicateIdentity(id, _) => {
                RestError::ValidationFailed(vec![format!("{ID_FIELD}: {id} already exists")])
            }
            DocumentStoreError::InvalidDocument(detail) => RestError::MalformedRequest(detail),
            err @ (DocumentStoreError::StoreUnavailable { .. } | DocumentStoreError::Transient(_)) => {
                RestError::StoreUnavailable(err)
            }
            err => RestError::Internal(err.to_string()),
        }
    }
}

/// Result type of handler operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_errors_carry_field_messages() {
        let err = RestError::ValidationFailed(vec!["name: this field is required".into()]);

        assert_eq!(
            err.envelope(),
            ErrorEnvelope {
                code: 422,
                message: "Validation Failed".into(),
                errors: vec!["name: this field is required".into()],
            }
        );
    }

    #[test]
    fn method_not_allowed_has_no_detail() {
        let response = RestError::MethodNotAllowed(Method::Delete).into_response();

        assert_eq!(response.status, 405);
        assert_eq!(
            response.body,
            Some(json!({ "code": 405, "message": "Method not allowed", "errors": [] }))
        );
    }

    #[test]
    fn response_body_is_the_envelope() {
        let err = RestError::MalformedRequest("$page: expected a non-negative integer".into());
        let envelope = err.envelope();
        let response = err.into_response();

        assert_eq!(response.status, envelope.code);
        let body: ErrorEnvelope = serde_json::from_value(response.body.unwrap()).unwrap();
        assert_eq!(body, envelope);
    }

    #[test]
    fn store_errors_map_onto_statuses() {
        let duplicate: RestError = DocumentStoreError::DuplicateIdentity("x".into(), "widgets".into()).into();
        assert_eq!(duplicate.status_code(), 422);

        let invalid: RestError = DocumentStoreError::InvalidIdentity("nope".into()).into();
        assert_eq!(invalid.status_code(), 404);

        let backend: RestError = DocumentStoreError::Backend("boom".into()).into();
        assert_eq!(backend.status_code(), 500);
        assert!(!backend.is_fatal());

        let unavailable: RestError = DocumentStoreError::StoreUnavailable {
            operation: "find".into(),
            attempts: 4,
            reason: "connection reset".into(),
        }
        .into();
        assert!(unavailable.is_fatal());
    }
}
