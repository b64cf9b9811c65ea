//! The synchronizer contract.
//!
//! A synchronizer is the bridge between a collection and its external system of
//! record. The collection applies a write locally first, then hands the result to the
//! synchronizer configured for that [`WriteOp`] and awaits its verdict: `Ok(true)`
//! commits the write, `Ok(false)` or `Err(_)` reverts it.
//!
//! Any closure returning a future implements [`Synchronizer`]:
//!
//! ```ignore
//! use docsync_core::{error::BoxError, sync::{SyncTarget, Synchronizer}};
//!
//! let confirm = |target: SyncTarget| async move {
//!     // push `target` to the backend here
//!     Ok::<_, BoxError>(true)
//! };
//! ```

use std::{fmt, future::Future};

use async_trait::async_trait;

use crate::{error::BoxError, record::Record};

/// The kind of write being synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOp {
    Create,
    Update,
    Remove,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Remove => "remove",
        })
    }
}

/// What a synchronizer is asked to confirm.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncTarget {
    /// The document as it looks after a create or update.
    Document(Record),
    /// The identifier of a removed document.
    Id(String),
}

impl SyncTarget {
    /// Returns the identifier of the affected document.
    pub fn id(&self) -> &str {
        match self {
            SyncTarget::Document(record) => record.id(),
            SyncTarget::Id(id) => id,
        }
    }

    /// Returns the document, if this target carries one.
    pub fn document(&self) -> Option<&Record> {
        match self {
            SyncTarget::Document(record) => Some(record),
            SyncTarget::Id(_) => None,
        }
    }
}

/// Confirms or rejects a write that has already been applied locally.
///
/// Calls always run to completion; the collection neither cancels nor times them out.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Resolves to `Ok(true)` to commit the write. Anything else reverts it.
    async fn sync(&self, target: SyncTarget) -> Result<bool, BoxError>;
}

#[async_trait]
impl<F, Fut> Synchronizer for F
where
    F: Fn(SyncTarget) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    async fn sync(&self, target: SyncTarget) -> Result<bool, BoxError> {
        (self)(target).await
    }
}
