//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that stores documents as BSON
//! documents in HashMaps guarded by async-aware read-write locks.

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};

use docrest_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter, Projection, Query, Sort},
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

type CollectionMap = HashMap<String, BsonDocument>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait entirely in memory. Documents are
/// indexed by the string form of their identity.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). For larger datasets,
/// use a persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest_core::{backend::StoreBackend, query::Filter};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
///
/// let id = store.insert("users", None, doc! { "name": "Alice", "age": 30 }).await?;
/// let found = store.find_one("users", Filter::id(id), None).await?;
/// assert!(found.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    async fn select(&self, collection: &str, filter: Option<&Expr>) -> DocumentStoreResult<Vec<BsonDocument>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        for document in collection_map.values() {
            if DocumentEvaluator::matches(document, filter)? {
                rows.push(document.clone());
            }
        }

        Ok(rows)
    }

    async fn write(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        mut document: BsonDocument,
        overwrite: bool,
    ) -> DocumentStoreResult<DocumentId> {
        let id = id.unwrap_or_default();
        let key = id.to_string();

        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if !overwrite && collection_map.contains_key(&key) {
            return Err(DocumentStoreError::DuplicateIdentity(key, collection.to_string()));
        }

        document.insert(ID_FIELD, Bson::from(id));
        collection_map.insert(key, document);

        Ok(id)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: Expr,
        projection: Option<Projection>,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        let mut rows = self.select(collection, Some(&filter)).await?;
        rows.sort_by(|a, b| compare_documents(a, b, &[Sort::asc(ID_FIELD)]));

        Ok(rows
            .into_iter()
            .next()
            .map(|row| match &projection {
                Some(projection) => projection.apply(row),
                None => row,
            }))
    }

    async fn find(
        &self,
        collection: &str,
        query: Query,
        max_rows: usize,
    ) -> DocumentStoreResult<Vec<BsonDocument>> {
        let mut rows = self.select(collection, query.filter.as_ref()).await?;
        rows.sort_by(|a, b| compare_documents(a, b, &query.sort));

        let limit = query.limit.map_or(max_rows, |limit| limit.min(max_rows));

        Ok(rows
            .into_iter()
            .skip(query.skip)
            .take(limit)
            .map(|row| match &query.projection {
                Some(projection) => projection.apply(row),
                None => row,
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        Ok(self.select(collection, filter.as_ref()).await?.len() as u64)
    }

    async fn insert(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        document: BsonDocument,
    ) -> DocumentStoreResult<DocumentId> {
        self.write(collection, id, document, false).await
    }

    async fn update(
        &self,
        collection: &str,
        filter: Expr,
        fields: BsonDocument,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut keys: Vec<&String> = collection_map.keys().collect();
        keys.sort();

        let mut target = None;
        for key in keys {
            if let Some(document) = collection_map.get(key) {
                if DocumentEvaluator::matches(document, Some(&filter))? {
                    target = Some(key.clone());
                    break;
                }
            }
        }

        let Some(document) = target.and_then(|key| collection_map.get_mut(&key)) else {
            return Ok(0);
        };

        for (field, value) in fields {
            if field != ID_FIELD {
                document.insert(field, value);
            }
        }

        Ok(1)
    }

    async fn save(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        document: BsonDocument,
    ) -> DocumentStoreResult<DocumentId> {
        self.write(collection, id, document, true).await
    }

    async fn remove(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut doomed = Vec::new();
        for (key, document) in collection_map.iter() {
            if DocumentEvaluator::matches(document, Some(&filter))? {
                doomed.push(key.clone());
            }
        }

        for key in &doomed {
            collection_map.remove(key);
        }

        Ok(doomed.len() as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<BsonDocument>,
    ) -> DocumentStoreResult<Vec<BsonDocument>> {
        let mut rows = self.select(collection, None).await?;
        rows.sort_by(|a, b| compare_documents(a, b, &[Sort::asc(ID_FIELD)]));

        for stage in pipeline {
            rows = apply_stage(rows, &stage)?;
        }

        Ok(rows)
    }
}

fn apply_stage(rows: Vec<BsonDocument>, stage: &BsonDocument) -> DocumentStoreResult<Vec<BsonDocument>> {
    let mut entries = stage.iter();
    let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
        return Err(DocumentStoreError::Backend(
            "aggregation stage must have exactly one key".into(),
        ));
    };

    match (name.as_str(), spec) {
        ("$match", Bson::Document(conditions)) => {
            let filter = Filter::and(
                conditions
                    .iter()
                    .map(|(field, value)| Filter::eq(field.clone(), value.clone())),
            );

            let mut matched = Vec::new();
            for row in rows {
                if DocumentEvaluator::matches(&row, Some(&filter))? {
                    matched.push(row);
                }
            }
            Ok(matched)
        }
        ("$sort", Bson::Document(keys)) => {
            let sort = keys
                .iter()
                .map(|(field, direction)| match direction.as_i64().or_else(|| direction.as_i32().map(i64::from)) {
                    Some(-1) => Ok(Sort::desc(field.clone())),
                    Some(1) => Ok(Sort::asc(field.clone())),
                    _ => Err(DocumentStoreError::Backend(format!(
                        "invalid sort direction for {field}: {direction}"
                    ))),
                })
                .collect::<DocumentStoreResult<Vec<_>>>()?;

            let mut sorted = rows;
            sorted.sort_by(|a, b| compare_documents(a, b, &sort));
            Ok(sorted)
        }
        ("$skip", value) => Ok(rows
            .into_iter()
            .skip(stage_count(name, value)?)
            .collect()),
        ("$limit", value) => Ok(rows
            .into_iter()
            .take(stage_count(name, value)?)
            .collect()),
        ("$count", Bson::String(field)) => {
            let mut result = BsonDocument::new();
            result.insert(field.clone(), rows.len() as i64);
            Ok(vec![result])
        }
        (other, _) => Err(DocumentStoreError::Backend(format!(
            "unsupported aggregation stage {other}"
        ))),
    }
}

fn stage_count(name: &str, value: &Bson) -> DocumentStoreResult<usize> {
    value
        .as_i64()
        .or_else(|| value.as_i32().map(i64::from))
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| DocumentStoreError::Backend(format!("{name} expects a non-negative integer")))
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();

        for (name, age) in [("a", 30), ("b", 10), ("c", 20)] {
            store
                .insert("people", None, doc! { "name": name, "age": age })
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn insert_assigns_and_stores_identity() {
        let store = InMemoryStore::new();

        let id = store.insert("people", None, doc! { "name": "a" }).await.unwrap();
        let row = store.find_one("people", Filter::id(id), None).await.unwrap().unwrap();

        assert_eq!(row.get_str(ID_FIELD).unwrap(), id.to_string());
    }

    #[tokio::test]
    async fn explicit_identity_collision_is_rejected() {
        let store = InMemoryStore::new();
        let id = DocumentId::new();

        store.insert("people", Some(id), doc! {}).await.unwrap();
        let err = store.insert("people", Some(id), doc! {}).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DuplicateIdentity(..)));
    }

    #[tokio::test]
    async fn find_sorts_windows_and_caps() {
        let store = seeded().await;
        let query = Query::builder()
            .sort(Sort::desc("age"))
            .skip(1)
            .limit(5)
            .build();

        let rows = store.find("people", query.clone(), 100).await.unwrap();
        let names: Vec<_> = rows.iter().map(|row| row.get_str("name").unwrap()).collect();
        assert_eq!(names, vec!["c", "b"]);

        let capped = store.find("people", query, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn count_ignores_window() {
        let store = seeded().await;

        assert_eq!(store.count("people", None).await.unwrap(), 3);
        assert_eq!(store.count("people", Some(Filter::gte("age", 20))).await.unwrap(), 2);
        assert_eq!(store.count("missing", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_merges_and_save_overwrites() {
        let store = InMemoryStore::new();
        let id = store.insert("people", None, doc! { "name": "a", "age": 1 }).await.unwrap();

        let matched = store.update("people", Filter::id(id), doc! { "age": 2 }).await.unwrap();
        assert_eq!(matched, 1);
        let row = store.find_one("people", Filter::id(id), None).await.unwrap().unwrap();
        assert_eq!(row.get_str("name").unwrap(), "a");
        assert_eq!(row.get_i32("age").unwrap(), 2);

        store.save("people", Some(id), doc! { "age": 3 }).await.unwrap();
        let row = store.find_one("people", Filter::id(id), None).await.unwrap().unwrap();
        assert!(row.get("name").is_none());
    }

    #[tokio::test]
    async fn remove_then_find_one_is_empty() {
        let store = seeded().await;
        let row = store.find_one("people", Filter::eq("name", "a"), None).await.unwrap().unwrap();
        let id: DocumentId = row.get_str(ID_FIELD).unwrap().parse().unwrap();

        assert_eq!(store.remove("people", Filter::id(id)).await.unwrap(), 1);
        assert!(store.find_one("people", Filter::id(id), None).await.unwrap().is_none());
        assert_eq!(store.remove("people", Filter::id(id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn projection_applies_to_reads() {
        let store = seeded().await;
        let query = Query::builder()
            .projection(Projection::Include(vec!["name".into()]))
            .build();

        let rows = store.find("people", query, 100).await.unwrap();

        assert!(rows.iter().all(|row| row.get("age").is_none() && row.contains_key(ID_FIELD)));
    }

    #[tokio::test]
    async fn aggregate_runs_supported_stages() {
        let store = seeded().await;

        let rows = store
            .aggregate(
                "people",
                vec![doc! { "$sort": { "age": 1 } }, doc! { "$skip": 1 }, doc! { "$limit": 1 }],
            )
            .await
            .unwrap();
        assert_eq!(rows[0].get_str("name").unwrap(), "c");

        let counted = store
            .aggregate("people", vec![doc! { "$match": { "name": "b" } }, doc! { "$count": "total" }])
            .await
            .unwrap();
        assert_eq!(counted, vec![doc! { "total": 1_i64 }]);

        let err = store
            .aggregate("people", vec![doc! { "$group": { "_id": "$name" } }])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Backend(_)));
    }
}
