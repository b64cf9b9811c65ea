//! Serde-typed views over collections.

use std::{fmt, marker::PhantomData};

use serde::Serialize;

use docsync_core::{
    document::{Document, DocumentExt, to_patch},
    error::DocumentStoreResult,
    page::{Page, PaginationParams},
    query::{QueryOptions, Sort, Where},
    record::Record,
    write::RemoveResult,
};
use docsync_memory::Collection;

/// A collection viewed through a [`Document`] type.
///
/// Writes serialize the document to BSON, dropping the engine-owned `id`,
/// `created_at` and `updated_at` fields; reads deserialize the full record, so a
/// document type that declares those fields receives them.
///
/// # Example
///
/// ```ignore
/// let users = registry.typed_collection::<User>().await?;
///
/// let id = users.create(&User { id: String::new(), name: "Alice".into(), age: 30 }).await?;
/// let alice = users.read(&id)?.unwrap();
/// assert_eq!(alice.id, id);
/// ```
pub struct TypedCollection<D: Document> {
    collection: Collection,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document> TypedCollection<D> {
    /// Wraps an untyped collection.
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    /// Returns the underlying untyped collection.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Views the same collection through another document type.
    pub fn with_type<T: Document>(&self) -> TypedCollection<T> {
        TypedCollection::new(self.collection.clone())
    }

    /// Stores a new document and returns its identifier.
    pub async fn create(&self, document: &D) -> DocumentStoreResult<String> {
        self.collection.create(document.to_payload()?).await
    }

    pub fn read(&self, id: &str) -> DocumentStoreResult<Option<D>> {
        self.collection.read(id).as_ref().map(D::from_record).transpose()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.collection.exists(id)
    }

    /// Runs a query and deserializes every match.
    pub fn query(&self, clause: &Where, options: &QueryOptions) -> DocumentStoreResult<Vec<D>> {
        decode_all(self.collection.query(clause, options))
    }

    pub fn find_one(&self, clause: &Where) -> DocumentStoreResult<Option<D>> {
        self.collection.find_one(clause).as_ref().map(D::from_record).transpose()
    }

    pub fn paginate(&self, clause: &Where, order_by: &[Sort], params: PaginationParams) -> DocumentStoreResult<Page<D>> {
        self.collection
            .paginate(clause, order_by, params)
            .try_map(|record| D::from_record(&record))
    }

    pub fn count(&self, clause: Option<&Where>) -> usize {
        self.collection.count(clause)
    }

    /// Merges the serialized `patch` over a document and returns the result.
    ///
    /// Any serializable map works as a patch; only the fields it serializes are
    /// changed.
    pub async fn update<P: Serialize>(&self, id: &str, patch: &P) -> DocumentStoreResult<D> {
        let record = self.collection.update(id, to_patch(patch)?).await?;
        D::from_record(&record)
    }

    /// Replaces every caller-owned field of a document with those of `document`.
    ///
    /// Fields the new value omits, e.g. `None` options skipped by serde, are removed.
    pub async fn replace(&self, id: &str, document: &D) -> DocumentStoreResult<D> {
        let record = self.collection.replace(id, document.to_payload()?).await?;
        D::from_record(&record)
    }

    pub async fn remove(&self, id: &str) -> DocumentStoreResult<RemoveResult> {
        self.collection.remove(id).await
    }
}

fn decode_all<D: Document>(records: Vec<Record>) -> DocumentStoreResult<Vec<D>> {
    records.iter().map(D::from_record).collect()
}

impl<D: Document> Clone for TypedCollection<D> {
    fn clone(&self) -> Self {
        Self::new(self.collection.clone())
    }
}

impl<D: Document> fmt::Debug for TypedCollection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCollection")
            .field("collection", &self.collection)
            .field("document", &std::any::type_name::<D>())
            .finish()
    }
}
