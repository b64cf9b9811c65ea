//! Convenient re-exports of commonly used types from docsync.
//!
//! ```ignore
//! use docsync::prelude::*;
//! ```

pub use docsync_core::{
    document::{Document, DocumentExt},
    error::{BoxError, DocumentStoreError, DocumentStoreResult, SyncError, SyncRejected},
    event::{CollectionEvent, EventKind},
    page::{Page, PaginationParams},
    query::{Condition, FieldOp, Filter, QueryOptions, Sort, SortDirection, Where},
    record::Record,
    sync::{SyncTarget, Synchronizer, WriteOp},
    write::{BulkWriteResult, RemoveResult},
};
pub use docsync_memory::{Collection, CollectionBuilder, Subscription};

pub use crate::{registry::Registry, typed::TypedCollection};
