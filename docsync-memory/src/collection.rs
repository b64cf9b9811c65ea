//! The collection handle.
//!
//! A [`Collection`] owns a document store, its indexes and its listeners behind a
//! cheaply cloneable handle. Reads are synchronous. Writes are async because each one
//! may wait on a [`Synchronizer`]: the write is applied immediately, the synchronizer
//! is consulted with no lock held, and the write is then either committed (events
//! fire) or reverted (a `syncError` event fires and the caller gets a
//! [`SyncError`]).
//!
//! While a synchronizer is pending, other operations see the optimistic state and may
//! act on the same document. Such writes interleave; whichever commit or revert runs
//! last decides the final state.

use std::{collections::HashMap, fmt, sync::Arc};

use bson::Document as BsonDocument;
use chrono::Utc;
use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use docsync_core::{
    error::{DocumentStoreError, DocumentStoreResult, SyncCause, SyncError, SyncRejected},
    event::{CollectionEvent, EventKind},
    page::{Page, PaginationParams},
    query::{QueryOptions, Sort, Where},
    record::{Record, check_reserved},
    sync::{SyncTarget, Synchronizer, WriteOp},
    write::{BulkWriteResult, RemoveResult},
};

use crate::{
    index::IndexManager,
    listeners::{Handler, ListenerKey, ListenerRegistry, Subscription, dispatch},
    planner::QueryPlanner,
    sort::sort_records,
    sync::{CollectionState, Undo},
};

/// Produces identifiers for new documents.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;
/// Produces the current time in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

struct Inner {
    name: String,
    state: RwLock<CollectionState>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    synchronizers: HashMap<WriteOp, Arc<dyn Synchronizer>>,
    id_generator: IdGenerator,
    clock: Clock,
}

/// An in-memory document collection.
///
/// Clones share the same underlying collection.
///
/// # Example
///
/// ```ignore
/// use docsync_memory::Collection;
/// use docsync_core::query::{Filter, QueryOptions};
/// use bson::doc;
///
/// let users = Collection::builder("users").index("city").build()?;
///
/// let id = users.create(doc! { "name": "Alice", "city": "Oslo" }).await?;
/// let found = users.query(&Filter::eq("city", "Oslo"), &QueryOptions::new());
/// assert_eq!(found[0].id(), id);
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<Inner>,
}

impl Collection {
    /// Creates a builder for a collection named `name`.
    pub fn builder(name: impl Into<String>) -> CollectionBuilder {
        CollectionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the indexed field names, sorted.
    pub fn indexed_fields(&self) -> Vec<String> {
        self.inner.state.read().indexes.fields()
    }

    /// Returns a copy of the document with the given identifier.
    pub fn read(&self, id: &str) -> Option<Record> {
        self.inner.state.read().documents.read(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.inner.state.read().documents.exists(id)
    }

    /// Counts the documents matching `clause`, or all documents.
    pub fn count(&self, clause: Option<&Where>) -> usize {
        let state = self.inner.state.read();
        QueryPlanner::new(&state.documents, &state.indexes).count(clause)
    }

    /// Runs a query: filter, then sort, then skip, then limit.
    pub fn query(&self, clause: &Where, options: &QueryOptions) -> Vec<Record> {
        let state = self.inner.state.read();
        let matches = QueryPlanner::new(&state.documents, &state.indexes).evaluate(clause);

        sort_records(matches, &options.order_by)
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Returns the first document in store order matching `clause`.
    pub fn find_one(&self, clause: &Where) -> Option<Record> {
        let state = self.inner.state.read();
        QueryPlanner::new(&state.documents, &state.indexes)
            .find_one(clause)
            .cloned()
    }

    /// Returns one page of the documents matching `clause`, sorted by `order_by`.
    pub fn paginate(&self, clause: &Where, order_by: &[Sort], params: PaginationParams) -> Page<Record> {
        let sorted = {
            let state = self.inner.state.read();
            let matches = QueryPlanner::new(&state.documents, &state.indexes).evaluate(clause);
            sort_records(matches, order_by)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };

        params.paginate(sorted)
    }

    /// Subscribes to the create, update and remove events of one document.
    pub fn listen<F>(&self, id: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&CollectionEvent) + Send + Sync + 'static,
    {
        self.subscribe(ListenerKey::Document(id.into()), Arc::new(handler))
    }

    /// Subscribes to every event of one kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&CollectionEvent) + Send + Sync + 'static,
    {
        self.subscribe(ListenerKey::Event(kind), Arc::new(handler))
    }

    /// Bulk-loads documents that already carry their identifiers.
    ///
    /// No synchronizer is involved. Every entry must have a non-empty string `id`;
    /// if any does not, nothing is stored. Later entries overwrite earlier ones with
    /// the same identifier. Returns the number of entries loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if an entry has no usable
    /// identifier or timestamp.
    pub fn populate(&self, documents: Vec<BsonDocument>) -> DocumentStoreResult<usize> {
        let now = (self.inner.clock)();
        let records = documents
            .into_iter()
            .map(|document| Record::from_document(document, now))
            .collect::<DocumentStoreResult<Vec<_>>>()
            .inspect_err(|err| error!("populate of collection {} rejected: {err}", self.name()))?;
        let count = records.len();

        {
            let mut state = self.inner.state.write();
            state.stamp(now);
            for record in records {
                state.documents.insert(record);
            }

            let CollectionState { documents, indexes, .. } = &mut *state;
            indexes.rebuild(documents);
        }

        debug!("populated collection {} with {count} document(s)", self.name());
        self.emit(&CollectionEvent::Populated { count });
        Ok(count)
    }

    /// Drops every document, index bucket and listener. No event fires.
    pub fn clear(&self) {
        self.inner.state.write().clear();
        self.inner.listeners.lock().clear();
    }

    /// Creates a document from `payload` and returns its new identifier.
    ///
    /// # Errors
    ///
    /// Fails validation if the payload sets a reserved field or the generated
    /// identifier is empty or taken; fails with a [`SyncError`] if the create
    /// synchronizer rejects the document.
    pub async fn create(&self, payload: BsonDocument) -> DocumentStoreResult<String> {
        let (record, undo) = {
            let id = (self.inner.id_generator)();
            let mut state = self.inner.state.write();
            self.validate_create(&state, &id, &payload)?;

            let now = state.stamp((self.inner.clock)());
            let record = Record::new(id, now, now, payload);
            let undo = state.insert(record.clone());
            (record, undo)
        };

        let id = record.id().to_string();
        self.settle(
            WriteOp::Create,
            &id,
            SyncTarget::Document(record.clone()),
            undo,
            CollectionEvent::Created { document: record },
        )
        .await?;

        Ok(id)
    }

    /// Merges `patch` over a document's fields and returns the updated document.
    ///
    /// # Errors
    ///
    /// Fails validation if the identifier is empty, the document does not exist, or
    /// the patch sets a reserved field; fails with a [`SyncError`] if the update
    /// synchronizer rejects the result.
    pub async fn update(&self, id: &str, patch: BsonDocument) -> DocumentStoreResult<Record> {
        self.rewrite(id, patch, Record::patched).await
    }

    /// Replaces every caller-owned field of a document with `fields`.
    ///
    /// Fields absent from `fields` are removed. The identifier and creation time are
    /// kept. Confirmed by the update synchronizer and reported as an update event
    /// whose patch is `fields`.
    ///
    /// # Errors
    ///
    /// Fails like [`Collection::update`].
    pub async fn replace(&self, id: &str, fields: BsonDocument) -> DocumentStoreResult<Record> {
        self.rewrite(id, fields, |before, fields, now| before.replaced(fields.clone(), now))
            .await
    }

    async fn rewrite(
        &self,
        id: &str,
        patch: BsonDocument,
        apply: impl FnOnce(&Record, &BsonDocument, i64) -> Record,
    ) -> DocumentStoreResult<Record> {
        let (before, after, undo) = {
            let mut state = self.inner.state.write();
            let before = self.validate_update(&state, id, &patch)?;

            let now = state.stamp((self.inner.clock)());
            let after = apply(&before, &patch, now);
            let undo = state.replace(before.clone(), after.clone());
            (before, after, undo)
        };

        self.settle(
            WriteOp::Update,
            id,
            SyncTarget::Document(after.clone()),
            undo,
            CollectionEvent::Updated {
                before,
                after: after.clone(),
                patch,
            },
        )
        .await?;

        Ok(after)
    }

    /// Removes a document.
    ///
    /// # Errors
    ///
    /// Fails validation if the identifier is empty or the document does not exist;
    /// fails with a [`SyncError`] if the remove synchronizer rejects the removal.
    pub async fn remove(&self, id: &str) -> DocumentStoreResult<RemoveResult> {
        let (removed, undo) = {
            let mut state = self.inner.state.write();
            self.validate_id(id)?;
            state
                .remove(id)
                .ok_or_else(|| self.not_found(id))
                .inspect_err(|err| error!("remove rejected: {err}"))?
        };

        self.settle(
            WriteOp::Remove,
            id,
            SyncTarget::Id(id.to_string()),
            undo,
            CollectionEvent::Removed { document: removed },
        )
        .await?;

        Ok(RemoveResult::new(id))
    }

    /// Applies `patch` to every document matching `clause`, one document at a time.
    ///
    /// Matches are selected once, up front. Each target commits or reverts on its
    /// own; a target removed before its turn is reported as not found.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] without touching any document
    /// if the patch sets a reserved field.
    pub async fn update_many(&self, clause: &Where, patch: BsonDocument) -> DocumentStoreResult<BulkWriteResult<Record>> {
        check_reserved(&patch).inspect_err(|err| error!("update_many rejected: {err}"))?;

        let mut result = BulkWriteResult::new();
        for id in self.matching_ids(clause) {
            let outcome = self.update(&id, patch.clone()).await;
            result.push(id, outcome);
        }

        Ok(result)
    }

    /// Removes every document matching `clause`, one document at a time.
    pub async fn remove_many(&self, clause: &Where) -> BulkWriteResult<RemoveResult> {
        let mut result = BulkWriteResult::new();
        for id in self.matching_ids(clause) {
            let outcome = self.remove(&id).await;
            result.push(id, outcome);
        }

        result
    }

    fn matching_ids(&self, clause: &Where) -> Vec<String> {
        let state = self.inner.state.read();
        QueryPlanner::new(&state.documents, &state.indexes)
            .evaluate(clause)
            .into_iter()
            .map(|record| record.id().to_string())
            .collect()
    }

    /// Consults the synchronizer for `op`, then commits or reverts.
    async fn settle(
        &self,
        op: WriteOp,
        id: &str,
        target: SyncTarget,
        undo: Undo,
        event: CollectionEvent,
    ) -> DocumentStoreResult<()> {
        if let Some(synchronizer) = self.inner.synchronizers.get(&op) {
            let cause: Option<SyncCause> = match synchronizer.sync(target).await {
                Ok(true) => None,
                Ok(false) => Some(Arc::new(SyncRejected(op)) as SyncCause),
                Err(err) => Some(Arc::from(err)),
            };

            if let Some(cause) = cause {
                undo.revert(&mut self.inner.state.write());
                warn!("reverted {op} of document {id} in collection {}: {cause}", self.name());

                self.emit(&CollectionEvent::SyncFailed {
                    op,
                    id: id.to_string(),
                    error: cause.clone(),
                });
                return Err(SyncError {
                    op,
                    id: id.to_string(),
                    cause,
                }
                .into());
            }
        }

        debug!("committed {op} of document {id} in collection {}", self.name());
        self.emit(&event);
        Ok(())
    }

    fn subscribe(&self, key: ListenerKey, handler: Handler) -> Subscription {
        let id = self.inner.listeners.lock().subscribe(key, handler);
        Subscription::new(id, &self.inner.listeners)
    }

    fn emit(&self, event: &CollectionEvent) {
        dispatch(&self.inner.listeners, event);
    }

    fn validate_id(&self, id: &str) -> DocumentStoreResult<()> {
        if id.is_empty() {
            let err = DocumentStoreError::InvalidId(id.to_string());
            error!("write to collection {} rejected: {err}", self.name());
            return Err(err);
        }
        Ok(())
    }

    fn validate_create(&self, state: &CollectionState, id: &str, payload: &BsonDocument) -> DocumentStoreResult<()> {
        self.validate_id(id)?;
        check_reserved(payload).inspect_err(|err| error!("create rejected: {err}"))?;

        if state.documents.exists(id) {
            let err = DocumentStoreError::DocumentAlreadyExists(id.to_string(), self.name().to_string());
            error!("create rejected: {err}");
            return Err(err);
        }
        Ok(())
    }

    fn validate_update(&self, state: &CollectionState, id: &str, patch: &BsonDocument) -> DocumentStoreResult<Record> {
        self.validate_id(id)?;
        check_reserved(patch).inspect_err(|err| error!("update rejected: {err}"))?;

        state
            .documents
            .read(id)
            .cloned()
            .ok_or_else(|| self.not_found(id))
            .inspect_err(|err| error!("update rejected: {err}"))
    }

    fn not_found(&self, id: &str) -> DocumentStoreError {
        DocumentStoreError::DocumentNotFound(id.to_string(), self.name().to_string())
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .field("documents", &state.documents.count())
            .field("indexes", &state.indexes.fields())
            .field("synchronized", &self.inner.synchronizers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Collection`].
///
/// The set of indexed fields is fixed once the collection is built.
pub struct CollectionBuilder {
    name: String,
    indexes: Vec<String>,
    synchronizers: HashMap<WriteOp, Arc<dyn Synchronizer>>,
    id_generator: Option<IdGenerator>,
    clock: Option<Clock>,
}

impl CollectionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
            synchronizers: HashMap::new(),
            id_generator: None,
            clock: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maintains an equality index on `field`.
    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.indexes.push(field.into());
        self
    }

    pub fn indexes(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.indexes.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Confirms every write of kind `op` with `synchronizer`, replacing any earlier one.
    pub fn synchronizer(mut self, op: WriteOp, synchronizer: impl Synchronizer + 'static) -> Self {
        self.synchronizers.insert(op, Arc::new(synchronizer));
        self
    }

    /// Overrides how identifiers are generated. Defaults to random UUID strings.
    pub fn id_generator(mut self, generator: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    /// Overrides the time source. Defaults to the system clock in epoch milliseconds.
    pub fn clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Builds the collection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if the name or an indexed field
    /// name is empty.
    pub fn build(self) -> DocumentStoreResult<Collection> {
        if self.name.is_empty() {
            return Err(DocumentStoreError::Initialization(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.indexes.iter().any(String::is_empty) {
            return Err(DocumentStoreError::Initialization(format!(
                "collection {} has an index on an empty field name",
                self.name
            )));
        }

        debug!(
            "building collection {} with indexes {:?} and synchronized ops {:?}",
            self.name,
            self.indexes,
            self.synchronizers.keys().collect::<Vec<_>>()
        );

        Ok(Collection {
            inner: Arc::new(Inner {
                state: RwLock::new(CollectionState::new(IndexManager::new(self.indexes))),
                listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
                synchronizers: self.synchronizers,
                id_generator: self
                    .id_generator
                    .unwrap_or_else(|| Arc::new(|| Uuid::new_v4().to_string())),
                clock: self
                    .clock
                    .unwrap_or_else(|| Arc::new(|| Utc::now().timestamp_millis())),
                name: self.name,
            }),
        })
    }
}

impl fmt::Debug for CollectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionBuilder")
            .field("name", &self.name)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}
