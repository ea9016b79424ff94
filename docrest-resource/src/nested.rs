//! Reference fields as REST sub-resources.
//!
//! A [`Relationship`] binds an owning model `D` to one of its reference fields. The field
//! holds a duplicate-free set of target identifiers, stored on the owner only. Targets are
//! reached through an untyped collection, since only their schema is known.
//!
//! Updates to the set are read-modify-write on the owner. Two concurrent mutations of the
//! same owner can lose one of the updates.

use bson::{Bson, Document as BsonDocument};
use serde_json::Value;
use tracing::{debug, warn};

use docrest_core::{
    backend::StoreBackend,
    collection::{Collection, Model},
    document::{Document, DocumentExt, DocumentId, ID_FIELD, MAX_FIND_ROWS, References},
    patch::Patch,
    query::{Expr, Filter, Projection, Query, and_filter},
    schema::Schema,
    store::DocumentStore,
};

use crate::error::{RestError, RestResult};

pub struct Relationship<'a, B: StoreBackend, D: Document> {
    owners: Model<'a, B, D>,
    targets: Collection<'a, B>,
    field: &'static str,
    target: &'static Schema,
    max_rows: usize,
}

impl<'a, B: StoreBackend, D: Document> Relationship<'a, B, D> {
    /// Looks up `field` on `D`'s schema.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::UnknownNestedResource`] if `field` is not a reference field of `D`.
    pub fn resolve(store: &'a DocumentStore<B>, field: &str) -> RestResult<Self> {
        let (name, target) = D::schema()
            .field(field)
            .and_then(|spec| spec.target().map(|target| (spec.name(), target.schema())))
            .ok_or_else(|| RestError::UnknownNestedResource(field.to_string()))?;

        Ok(Self {
            owners: store.model::<D>(),
            targets: store.collection(target.collection()),
            field: name,
            target,
            max_rows: MAX_FIND_ROWS,
        })
    }

    /// Overrides the read cap used when the target model declares none.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn target_schema(&self) -> &'static Schema {
        self.target
    }

    fn max_rows(&self) -> usize {
        self.target.max_rows().unwrap_or(self.max_rows)
    }

    pub async fn owner(&self, owner_id: &DocumentId) -> RestResult<D> {
        self.owners.get(owner_id).await?.ok_or(RestError::NotFound)
    }

    pub async fn target(&self, target_id: &DocumentId, projection: Option<Projection>) -> RestResult<BsonDocument> {
        self.targets
            .find_one(Filter::id(*target_id), projection)
            .await?
            .map(|row| self.target.strip_undeclared(row))
            .ok_or(RestError::NotFound)
    }

    /// The owner's current reference set.
    pub fn references(&self, owner: &D) -> RestResult<References> {
        Ok(References::from_field(&owner.to_document()?, self.field)?)
    }

    /// Writes `references` as the owner's reference field, leaving its other fields alone.
    async fn persist(&self, owner: &D, references: &References) -> RestResult<()> {
        let owner_id = owner.id().copied().ok_or(RestError::NotFound)?;
        let patch = Patch::new().set(self.field, references);

        patch.apply(owner)?.validate(false)?;
        self.owners
            .untyped()
            .update(Filter::id(owner_id), patch.into_document())
            .await?;

        debug!(
            collection = self.owners.name(),
            owner = %owner_id,
            field = self.field,
            references = references.len(),
            "reference set written"
        );
        Ok(())
    }

    /// Adds `target_id` to the owner's set. Linking an already linked target is a no-op
    /// on the set.
    pub async fn link(&self, owner_id: DocumentId, target_id: DocumentId) -> RestResult<BsonDocument> {
        let target = self.target(&target_id, None).await?;
        let owner = self.owner(&owner_id).await?;

        let mut references = self.references(&owner)?;
        references.insert(target_id);
        self.persist(&owner, &references).await?;

        Ok(target)
    }

    /// Replaces `old_id` with `new_id` in the owner's set, returning the new target.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] if the new target or the owner does not exist, or if
    /// `old_id` is not currently linked.
    pub async fn relink(
        &self,
        owner_id: DocumentId,
        old_id: DocumentId,
        new_id: DocumentId,
    ) -> RestResult<BsonDocument> {
        let target = self.target(&new_id, None).await?;
        let owner = self.owner(&owner_id).await?;

        let mut references = self.references(&owner)?;
        if !references.replace(&old_id, new_id) {
            return Err(RestError::NotFound);
        }
        self.persist(&owner, &references).await?;

        Ok(target)
    }

    /// Removes `target_id` from the owner's set, returning the unlinked target.
    ///
    /// The target must exist; whether it was linked does not matter.
    pub async fn unlink(&self, owner_id: DocumentId, target_id: DocumentId) -> RestResult<BsonDocument> {
        let target = self.target(&target_id, None).await?;
        let owner = self.owner(&owner_id).await?;

        let mut references = self.references(&owner)?;
        references.remove(&target_id);
        self.persist(&owner, &references).await?;

        Ok(target)
    }

    /// Inserts a new target built from `body`, then links it to the owner.
    ///
    /// The target is inserted before the owner is read. If the owner turns out to be
    /// missing, or linking fails, the target stays in its collection unlinked.
    pub async fn create_and_link(&self, owner_id: DocumentId, body: &Value) -> RestResult<BsonDocument> {
        let document = self.target.conform(body.clone(), true)?;
        let requested = document
            .get(ID_FIELD)
            .filter(|id| !matches!(id, Bson::Null))
            .map(DocumentId::try_from)
            .transpose()?;

        let target_id = self.targets.insert(requested, document.clone()).await?;
        let mut created = document;
        created.insert(ID_FIELD, Bson::from(target_id));

        let linked = match self.owner(&owner_id).await {
            Ok(owner) => {
                let mut references = self.references(&owner)?;
                references.insert(target_id);
                self.persist(&owner, &references).await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = linked {
            warn!(
                collection = self.targets.name(),
                target = %target_id,
                owner = %owner_id,
                error = %err,
                "created target left unlinked"
            );
            return Err(err);
        }

        Ok(created)
    }

    /// Fetches the linked targets selected by `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] if the owner does not exist or no linked target
    /// matches.
    pub async fn targets(&self, owner_id: DocumentId, query: Query) -> RestResult<Vec<BsonDocument>> {
        let owner = self.owner(&owner_id).await?;
        let references = self.references(&owner)?;
        if references.is_empty() {
            return Err(RestError::NotFound);
        }

        let query = query.and_filter(Filter::is_in(ID_FIELD, references.iter().copied()));
        let rows = self.targets.find(query, self.max_rows()).await?;
        if rows.is_empty() {
            return Err(RestError::NotFound);
        }

        Ok(rows
            .into_iter()
            .map(|row| self.target.strip_undeclared(row))
            .collect())
    }

    /// Counts the linked targets matching `filter`.
    pub async fn count_targets(&self, owner_id: DocumentId, filter: Option<Expr>) -> RestResult<u64> {
        let owner = self.owner(&owner_id).await?;
        let references = self.references(&owner)?;
        if references.is_empty() {
            return Ok(0);
        }

        let filter = and_filter(filter, Filter::is_in(ID_FIELD, references.iter().copied()));
        Ok(self.targets.count(Some(filter)).await?)
    }
}
