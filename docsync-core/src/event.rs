//! Change notifications emitted by a collection.
//!
//! Collection-level listeners subscribe to an [`EventKind`]; per-document listeners
//! subscribe to an identifier and receive the create, update and remove events of
//! that document.

use std::fmt;

use bson::Document as BsonDocument;

use crate::{error::SyncCause, record::Record, sync::WriteOp};

/// The kinds of event a collection-level listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Update,
    Remove,
    Populate,
    SyncError,
}

impl EventKind {
    /// Returns the event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Remove => "remove",
            EventKind::Populate => "populate",
            EventKind::SyncError => "syncError",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to listeners.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// A document was created.
    Created { document: Record },
    /// A document was updated. `patch` holds exactly the fields the caller supplied.
    Updated {
        before: Record,
        after: Record,
        patch: BsonDocument,
    },
    /// A document was removed; `document` is its last stored value.
    Removed { document: Record },
    /// A bulk load finished.
    Populated { count: usize },
    /// An optimistic write was reverted.
    SyncFailed {
        op: WriteOp,
        id: String,
        error: SyncCause,
    },
}

impl CollectionEvent {
    /// Returns the kind collection-level listeners subscribe to.
    pub fn kind(&self) -> EventKind {
        match self {
            CollectionEvent::Created { .. } => EventKind::Create,
            CollectionEvent::Updated { .. } => EventKind::Update,
            CollectionEvent::Removed { .. } => EventKind::Remove,
            CollectionEvent::Populated { .. } => EventKind::Populate,
            CollectionEvent::SyncFailed { .. } => EventKind::SyncError,
        }
    }

    /// Returns the document whose per-document listeners receive this event.
    ///
    /// Only create, update and remove are delivered per document.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            CollectionEvent::Created { document } | CollectionEvent::Removed { document } => {
                Some(document.id())
            }
            CollectionEvent::Updated { after, .. } => Some(after.id()),
            CollectionEvent::Populated { .. } | CollectionEvent::SyncFailed { .. } => None,
        }
    }
}
