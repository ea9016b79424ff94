#![allow(dead_code)]

use docrest::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
pub struct Tag {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[document(required)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
pub struct Widget {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[document(required)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
pub struct Owner {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[document(required)]
    pub name: Option<String>,
    #[serde(default)]
    #[document(reference = Tag)]
    pub tags: References,
}

/// Serializes a missing identity as `"_id": null`.
#[derive(Debug, Clone, Serialize, Deserialize, Document)]
pub struct Label {
    #[serde(rename = "_id", default)]
    pub id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[document(required)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
pub struct Board {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    #[document(reference = Label)]
    pub labels: References,
}

pub type Store = Arc<DocumentStore<InMemoryStore>>;

pub fn store() -> Store {
    Arc::new(DocumentStore::new(InMemoryStore::new()))
}

pub fn get(path: ResourcePath) -> Request {
    Request::new(Method::Get, path)
}

pub fn send(method: Method, path: ResourcePath, body: Value) -> Request {
    Request::new(method, path).with_body(body)
}

/// The `_id` of a response body holding one document.
pub fn body_id(response: &Response) -> String {
    response
        .body
        .as_ref()
        .and_then(|body| body["_id"].as_str())
        .map(str::to_string)
        .expect("response body carries an _id")
}

pub fn body(response: &Response) -> &Value {
    response.body.as_ref().expect("response has a body")
}

/// Creates a document through the collection handler and returns its id.
pub async fn create<D: docrest::document::Document>(store: &Store, body: Value) -> String {
    let response = ResourceHandler::<_, D>::collection(store.clone())
        .handle(send(Method::Post, ResourcePath::root(), body))
        .await
        .unwrap();

    assert_eq!(response.status, 201, "unexpected create response: {response:?}");
    body_id(&response)
}
