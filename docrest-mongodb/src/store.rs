use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, RETRYABLE_WRITE_ERROR, WriteFailure},
    options::ClientOptions,
};
use tracing::debug;

use docrest_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Projection, Query},
};

use crate::query::MongoQueryTranslator;

const DUPLICATE_KEY: i32 = 11000;

/// Maps a driver error onto the store error taxonomy.
fn classify(err: MongoError, collection: &str, id: Option<&DocumentId>) -> DocumentStoreError {
    let transient = err.contains_label(RETRYABLE_WRITE_ERROR)
        || matches!(
            *err.kind,
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
        );

    if transient {
        debug!(collection, error = %err, "transient mongodb failure");
        return DocumentStoreError::Transient(err.to_string());
    }

    match (&*err.kind, id) {
        (ErrorKind::Write(WriteFailure::WriteError(write_error)), Some(id)) if write_error.code == DUPLICATE_KEY => {
            DocumentStoreError::DuplicateIdentity(id.to_string(), collection.to_string())
        }
        _ => DocumentStoreError::Backend(err.to_string()),
    }
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    fn prepare_document(id: &DocumentId, mut document: Document) -> Document {
        document.insert(ID_FIELD, Bson::from(*id));
        document
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: Expr,
        projection: Option<Projection>,
    ) -> DocumentStoreResult<Option<Document>> {
        let coll = self.get_collection(collection);
        let mut action = coll
            .find_one(MongoQueryTranslator::filter(Some(&filter))?);

        if let Some(projection) = &projection {
            action = action.projection(MongoQueryTranslator::projection(projection));
        }

        action
            .await
            .map_err(|e| classify(e, collection, None))
    }

    async fn find(
        &self,
        collection: &str,
        query: Query,
        max_rows: usize,
    ) -> DocumentStoreResult<Vec<Document>> {
        let limit = query.limit.map_or(max_rows, |limit| limit.min(max_rows));
        if limit == 0 {
            return Ok(Vec::new());
        }

        let coll = self.get_collection(collection);
        let mut action = coll
            .find(MongoQueryTranslator::filter(query.filter.as_ref())?)
            .sort(MongoQueryTranslator::sort(&query.sort))
            .skip(query.skip as u64)
            .limit(limit as i64);

        if let Some(projection) = &query.projection {
            action = action.projection(MongoQueryTranslator::projection(projection));
        }

        action
            .await
            .map_err(|e| classify(e, collection, None))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| classify(e, collection, None))
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(filter.as_ref())?)
            .await
            .map_err(|e| classify(e, collection, None))
    }

    async fn insert(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        document: Document,
    ) -> DocumentStoreResult<DocumentId> {
        let id = id.unwrap_or_default();

        self.get_collection(collection)
            .insert_one(Self::prepare_document(&id, document))
            .await
            .map_err(|e| classify(e, collection, Some(&id)))?;

        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        filter: Expr,
        mut fields: Document,
    ) -> DocumentStoreResult<u64> {
        fields.remove(ID_FIELD);
        if fields.is_empty() {
            return self.count(collection, Some(filter)).await.map(|count| count.min(1));
        }

        Ok(self
            .get_collection(collection)
            .update_one(MongoQueryTranslator::filter(Some(&filter))?, doc! { "$set": fields })
            .await
            .map_err(|e| classify(e, collection, None))?
            .matched_count)
    }

    async fn save(
        &self,
        collection: &str,
        id: Option<DocumentId>,
        document: Document,
    ) -> DocumentStoreResult<DocumentId> {
        let id = id.unwrap_or_default();

        self.get_collection(collection)
            .replace_one(doc! { ID_FIELD: Bson::from(id) }, Self::prepare_document(&id, document))
            .upsert(true)
            .await
            .map_err(|e| classify(e, collection, Some(&id)))?;

        Ok(id)
    }

    async fn remove(&self, collection: &str, filter: Expr) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::filter(Some(&filter))?)
            .await
            .map_err(|e| classify(e, collection, None))?
            .deleted_count)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| classify(e, collection, None))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| classify(e, collection, None))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
