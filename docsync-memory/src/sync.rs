//! Collection state and the undo half of the optimistic write protocol.
//!
//! A write is applied to [`CollectionState`] before its synchronizer is consulted.
//! Applying a write yields an [`Undo`] value holding what the write displaced. If the
//! synchronizer rejects the write, the undo is replayed against whatever the state
//! holds by then, which may include changes made by operations that ran while the
//! synchronizer was pending.

use docsync_core::record::Record;

use crate::{index::IndexManager, store::DocumentMap};

/// Store, indexes and the clock high-water mark of one collection.
#[derive(Debug, Default)]
pub(crate) struct CollectionState {
    pub documents: DocumentMap,
    pub indexes: IndexManager,
    pub last_timestamp: i64,
}

impl CollectionState {
    pub fn new(indexes: IndexManager) -> Self {
        Self {
            documents: DocumentMap::new(),
            indexes,
            last_timestamp: i64::MIN,
        }
    }

    /// Advances the clock high-water mark, never moving it backwards.
    pub fn stamp(&mut self, now: i64) -> i64 {
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_timestamp
    }

    /// Stores a new record and indexes it.
    pub fn insert(&mut self, record: Record) -> Undo {
        let id = record.id().to_string();
        self.indexes.add(&record);
        self.documents.insert(record);
        Undo::Create { id }
    }

    /// Replaces a stored record, moving it between index buckets.
    pub fn replace(&mut self, before: Record, after: Record) -> Undo {
        self.indexes.update(&before, &after);
        self.documents.insert(after);
        Undo::Update { previous: before }
    }

    /// Removes a stored record and unindexes it.
    pub fn remove(&mut self, id: &str) -> Option<(Record, Undo)> {
        let (seq, record) = self.documents.remove(id)?;
        self.indexes.remove(&record);
        Some((record.clone(), Undo::Remove { seq, previous: record }))
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.indexes.clear();
    }
}

/// What a write displaced.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    /// A record was created; reverting removes it.
    Create { id: String },
    /// A record was updated; reverting restores its previous value.
    Update { previous: Record },
    /// A record was removed; reverting puts it back in its old position.
    Remove { seq: u64, previous: Record },
}

impl Undo {
    /// Restores the displaced state.
    ///
    /// Reverting is safe to repeat. An update is only rolled back while its document
    /// still exists, and a removal only while its identifier is still free, so a revert
    /// never resurrects a document that an interleaved write removed, nor clobbers one
    /// that was stored again in the meantime.
    pub fn revert(self, state: &mut CollectionState) {
        match self {
            Undo::Create { id } => {
                if let Some((_, record)) = state.documents.remove(&id) {
                    state.indexes.remove(&record);
                }
            }
            Undo::Update { previous } => {
                if let Some(current) = state.documents.read(previous.id()).cloned() {
                    state.indexes.update(&current, &previous);
                    state.documents.insert(previous);
                }
            }
            Undo::Remove { seq, previous } => {
                if !state.documents.exists(previous.id()) {
                    state.indexes.add(&previous);
                    state.documents.insert_at(seq, previous);
                }
            }
        }
    }
}
